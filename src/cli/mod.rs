//! # IAMCTL CLI
//!
//! Command-line interface for bootstrapping the IAM demo stack on AKS.
//!
//! ## Usage
//!
//! ```bash
//! # Discover the ingress address and rotate every nip.io hostname
//! iamctl configure-hosts
//!
//! # Use a known address and only print the derived hosts
//! iamctl configure-hosts --ingress-ip 20.50.60.70 --print-only
//!
//! # Make sure ingress-nginx is exposed through the AKS load balancer
//! iamctl ensure-load-balancer --resource-group rg-iam-demo --aks-name aks-iam-demo
//!
//! # Store the backup credential as the cloudnative-pg secret
//! iamctl normalize-storage-secret --namespace iam --storage-account iambackups \
//!     --credential-file ./credential.txt
//!
//! # Render a params file for a given address
//! iamctl render-params --ip 20.50.60.70 --output gitops/apps/iam/params.env
//!
//! # Static checks
//! iamctl check-keycloak
//! iamctl check --root gitops --format json
//! ```

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::ci::GithubActions;
use crate::config::OpsConfig;
use crate::ingress::TcpProbe;
use crate::tools::CommandRunner;

pub mod check;
pub mod configure_hosts;
pub mod load_balancer;
pub mod render_params;
pub mod storage_secret;

/// IAM demo stack GitOps operations
#[derive(Debug, Parser)]
#[command(name = "iamctl", version)]
#[command(
    about = "Operations toolkit for the IAM demo GitOps stack",
    long_about = None,
    after_help = "\
Examples:
  iamctl configure-hosts --skip-reachability-check
  iamctl ensure-load-balancer --resource-group rg-iam-demo --aks-name aks-iam-demo
  iamctl check --root gitops
"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover the ingress address and rotate nip.io hostnames in params files and manifests
    ConfigureHosts(configure_hosts::ConfigureHostsArgs),
    /// Ensure the ingress Service is an Azure load balancer and wait for its address
    EnsureLoadBalancer(load_balancer::EnsureLoadBalancerArgs),
    /// Normalize an Azure Storage credential into the cloudnative-pg backup secret
    #[command(name = "normalize-storage-secret")]
    NormalizeStorageSecret(storage_secret::NormalizeSecretArgs),
    /// Write a params file (and optionally ingress Helm values) for a given IP
    RenderParams(render_params::RenderParamsArgs),
    /// Check the Keycloak manifest uses typed database and hostname fields
    CheckKeycloak(check::CheckKeycloakArgs),
    /// Run every GitOps contract check over a directory
    Check(check::CheckArgs),
}

/// Execute a parsed command line
///
/// Operator-facing output goes to `out`; logs go through `tracing`.
pub fn run(cli: Cli, config: &OpsConfig, runner: &dyn CommandRunner, out: &mut dyn Write) -> Result<()> {
    match cli.command {
        Commands::ConfigureHosts(args) => {
            let probe = TcpProbe::new(config.tcp_probe_timeout());
            let ci = GithubActions::from_env();
            configure_hosts::configure_hosts_command(&args, config, runner, &probe, &ci, out)
        }
        Commands::EnsureLoadBalancer(args) => {
            load_balancer::ensure_load_balancer_command(&args, config, runner, out)
        }
        Commands::NormalizeStorageSecret(args) => {
            storage_secret::normalize_secret_command(&args, config, runner, out)
        }
        Commands::RenderParams(args) => render_params::render_params_command(&args, out),
        Commands::CheckKeycloak(args) => check::check_keycloak_command(&args, out),
        Commands::Check(args) => check::check_command(&args, out),
    }
}

/// Built-in defaults under `root` followed by user-supplied paths, first occurrence kept
pub(crate) fn merge_paths(root: &Path, defaults: &[&str], extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    defaults
        .iter()
        .map(|default| root.join(default))
        .chain(extra.iter().cloned())
        .filter(|path| !path.as_os_str().is_empty())
        .filter(|path| seen.insert(path.clone()))
        .collect()
}
