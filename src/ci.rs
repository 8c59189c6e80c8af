//! GitHub Actions integration.
//!
//! Workflow steps that run `iamctl configure-hosts` pick the discovered
//! address up through `$GITHUB_ENV` (later steps' environment) and
//! `$GITHUB_OUTPUT` (step outputs). Outside Actions neither variable is set and
//! publishing is a no-op.

use std::fs::OpenOptions;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::hosts::Hosts;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GithubActions {
    pub env_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
}

impl GithubActions {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            env_file: path("GITHUB_ENV"),
            output_file: path("GITHUB_OUTPUT"),
        }
    }

    pub fn is_active(&self) -> bool {
        self.env_file.is_some() || self.output_file.is_some()
    }

    /// Append the address and hosts to whichever files are configured
    pub fn publish(&self, ip: IpAddr, hosts: &Hosts) -> Result<()> {
        if let Some(path) = &self.env_file {
            append_lines(
                path,
                &[
                    ("EXTERNAL_IP", ip.to_string()),
                    ("KC_HOST", hosts.keycloak.clone()),
                    ("MP_HOST", hosts.midpoint.clone()),
                    ("ARGOCD_HOST", hosts.argocd.clone()),
                ],
            )?;
        }
        if let Some(path) = &self.output_file {
            append_lines(
                path,
                &[
                    ("keycloak_url", hosts.keycloak_url()),
                    ("midpoint_url", hosts.midpoint_url()),
                    ("argocd_url", hosts.argocd_url()),
                ],
            )?;
        }
        Ok(())
    }
}

fn append_lines(path: &Path, pairs: &[(&str, String)]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for (key, value) in pairs {
        writeln!(file, "{key}={value}").with_context(|| format!("Failed to write {}", path.display()))?;
    }
    debug!("Appended {} entries to {}", pairs.len(), path.display());
    Ok(())
}
