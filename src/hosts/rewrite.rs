//! Manifest hostname rewriting.
//!
//! Manifests are edited with targeted regex substitution so comments and
//! formatting survive; they are never re-serialized.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::{NoExpand, Regex};
use tracing::{debug, info};

use super::params::write_atomic;
use super::{HostService, Hosts};

/// Pattern matching any IPv4 `nip.io` hostname of `service`
pub(crate) fn service_host_regex(service: HostService) -> Result<Regex> {
    Regex::new(&format!(
        r"\b{}\.\d+\.\d+\.\d+\.\d+\.nip\.io\b",
        regex::escape(service.prefix())
    ))
    .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))
}

/// Replace every previous hostname of each service with the current one
///
/// Missing files are skipped. Returns the files whose content changed.
pub fn update_manifest_hosts(files: &[PathBuf], hosts: &Hosts) -> Result<Vec<PathBuf>> {
    let replacements = HostService::ALL
        .into_iter()
        .map(|service| Ok((service_host_regex(service)?, hosts.get(service))))
        .collect::<Result<Vec<_>>>()?;

    let mut changed = Vec::new();
    for file in files {
        if !file.is_file() {
            debug!("Skipping missing manifest {}", file.display());
            continue;
        }
        if rewrite_file(file, &replacements)? {
            info!("Rewrote hostnames in {}", file.display());
            changed.push(file.clone());
        }
    }
    Ok(changed)
}

fn rewrite_file(path: &Path, replacements: &[(Regex, &str)]) -> Result<bool> {
    let original = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

    let mut updated = original.clone();
    for (pattern, host) in replacements {
        updated = pattern.replace_all(&updated, NoExpand(host)).into_owned();
    }

    if updated == original {
        return Ok(false);
    }
    write_atomic(path, &updated)?;
    Ok(true)
}
