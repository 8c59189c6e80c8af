//! # Stale Hostname Scan
//!
//! After a rotation, no file under the validation paths may still mention a
//! generated hostname for a different IP. Anything the rewrite step did not
//! manage is surfaced so the operator extends the managed file list instead
//! of letting the tree drift.

use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use super::HostService;

/// A hostname reference that does not match the current ingress IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleHost {
    pub path: PathBuf,
    pub reference: String,
}

impl fmt::Display for StaleHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in {})", self.reference, self.path.display())
    }
}

#[derive(Debug, Error)]
#[error(
    "Found stale nip.io hostnames that do not match the ingress IP {expected_ip}.\n{}\nUpdate the \
     manifests or extend --manifest-file/--validation-path arguments so `iamctl configure-hosts` \
     can manage them.",
    format_stale(stale)
)]
pub struct StaleHostsError {
    pub expected_ip: IpAddr,
    pub stale: Vec<StaleHost>,
}

fn format_stale(stale: &[StaleHost]) -> String {
    stale
        .iter()
        .map(|s| format!("  - {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn host_reference_regex() -> Result<Regex> {
    let prefixes = HostService::ALL.map(HostService::prefix).join("|");
    Regex::new(&format!(
        r"\b({prefixes})\.(\d{{1,3}}\.\d{{1,3}}\.\d{{1,3}}\.\d{{1,3}})\.nip\.io\b"
    ))
    .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))
}

/// Every generated hostname under `paths` whose IP differs from `expected_ip`
///
/// Directories are walked recursively in file-name order, following
/// symlinks. Missing paths are skipped.
pub fn discover_stale_hosts(paths: &[PathBuf], expected_ip: IpAddr) -> Result<Vec<StaleHost>> {
    let pattern = host_reference_regex()?;
    let expected = expected_ip.to_string();
    let mut stale = Vec::new();

    for root in paths {
        if !root.exists() {
            debug!("Skipping missing validation path {}", root.display());
            continue;
        }
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            if entry.file_type().is_file() {
                scan_file(entry.path(), &pattern, &expected, &mut stale)?;
            }
        }
    }

    Ok(stale)
}

fn scan_file(path: &Path, pattern: &Regex, expected: &str, stale: &mut Vec<StaleHost>) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let contents = String::from_utf8_lossy(&bytes);
    for caps in pattern.captures_iter(&contents) {
        if &caps[2] != expected {
            stale.push(StaleHost {
                path: path.to_path_buf(),
                reference: caps[0].to_string(),
            });
        }
    }
    Ok(())
}

/// Fail with [`StaleHostsError`] if any stale hostname remains
pub fn ensure_hosts_rotated(paths: &[PathBuf], expected_ip: IpAddr) -> Result<()> {
    let stale = discover_stale_hosts(paths, expected_ip)?;
    if stale.is_empty() {
        return Ok(());
    }
    Err(StaleHostsError { expected_ip, stale }.into())
}
