//! Configure hosts command
//!
//! Resolves the ingress address, rewrites every params file and manifest to
//! the matching `nip.io` hostnames, then refuses to finish while any stale
//! hostname remains in the validation paths.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info};

use super::merge_paths;
use crate::ci::GithubActions;
use crate::config::OpsConfig;
use crate::constants::{
    DEFAULT_EXTRA_PARAMS_FILES, DEFAULT_INGRESS_CLASS, DEFAULT_INGRESS_SERVICE, DEFAULT_MANIFEST_FILES,
    DEFAULT_PARAMS_FILE, DEFAULT_PROBE_PORTS, DEFAULT_VALIDATION_PATHS,
};
use crate::hosts::{build_hosts, ensure_hosts_rotated, read_ingress_class, update_manifest_hosts, write_params};
use crate::ingress::{ensure_ingress_accessible, resolve_ingress_ip, PortProbe, ReachabilityPolicy};
use crate::tools::{CommandRunner, Kubectl, ServiceRef};

#[derive(Debug, Clone, Args)]
pub struct ConfigureHostsArgs {
    /// Repository checkout the built-in default paths are relative to
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub repo_root: PathBuf,

    /// Path to the params.env file to update [default: <repo-root>/gitops/apps/iam/params.env]
    #[arg(long, value_name = "PATH")]
    pub params_file: Option<PathBuf>,

    /// Additional params.env files to keep in sync (repeatable, extends the defaults)
    #[arg(long = "extra-params-file", value_name = "PATH")]
    pub extra_params_files: Vec<PathBuf>,

    /// Manifests containing nip.io hostnames to rewrite (repeatable, extends the defaults)
    #[arg(long = "manifest-file", value_name = "PATH")]
    pub manifest_files: Vec<PathBuf>,

    /// Files or directories that must not contain stale hostnames (repeatable, extends the defaults)
    #[arg(long = "validation-path", value_name = "PATH")]
    pub validation_paths: Vec<PathBuf>,

    /// Ingress resource as <namespace>/<name> or <namespace>/<kind>/<name>
    #[arg(long, value_name = "REF", default_value = DEFAULT_INGRESS_SERVICE)]
    pub ingress_service: ServiceRef,

    /// Explicit ingress IP address (skips kubectl)
    #[arg(long, value_name = "IP")]
    pub ingress_ip: Option<String>,

    /// Explicit ingress hostname to resolve
    #[arg(long, value_name = "HOST")]
    pub ingress_hostname: Option<String>,

    /// IngressClass to record in params.env (defaults to the recorded one, then nginx)
    #[arg(long, value_name = "CLASS")]
    pub ingress_class: Option<String>,

    /// Print the discovered hosts without modifying any file
    #[arg(long)]
    pub print_only: bool,

    /// Warn instead of failing when the load balancer ports do not accept connections
    #[arg(long)]
    pub skip_reachability_check: bool,

    /// Ports to probe (repeatable, default 80 and 443)
    #[arg(long = "probe-port", value_name = "PORT")]
    pub probe_ports: Vec<u16>,
}

pub fn configure_hosts_command(
    args: &ConfigureHostsArgs,
    config: &OpsConfig,
    runner: &dyn CommandRunner,
    probe: &dyn PortProbe,
    ci: &GithubActions,
    out: &mut dyn Write,
) -> Result<()> {
    let params_file = args
        .params_file
        .clone()
        .unwrap_or_else(|| args.repo_root.join(DEFAULT_PARAMS_FILE));
    let ingress_class = match args.ingress_class.as_deref().filter(|c| !c.is_empty()) {
        Some(class) => class.to_string(),
        None => read_ingress_class(&params_file)?.unwrap_or_else(|| DEFAULT_INGRESS_CLASS.to_string()),
    };

    let kubectl = Kubectl::new(runner, &config.kubectl_bin);
    let ip = resolve_ingress_ip(
        &kubectl,
        &args.ingress_service,
        args.ingress_ip.as_deref(),
        args.ingress_hostname.as_deref(),
    )?;
    writeln!(out, "ℹ️  Discovered ingress load balancer address: {ip}")?;

    let policy = if args.skip_reachability_check {
        ReachabilityPolicy::WarnOnly
    } else {
        ReachabilityPolicy::Enforce
    };
    let ports = if args.probe_ports.is_empty() {
        DEFAULT_PROBE_PORTS.to_vec()
    } else {
        args.probe_ports.clone()
    };
    match ensure_ingress_accessible(ip, &ports, policy, probe)? {
        Some(port) => writeln!(
            out,
            "✅ Verified ingress load balancer {ip} accepts TCP connections on port {port}"
        )?,
        None => writeln!(
            out,
            "⚠️  Ingress load balancer {ip} did not accept TCP connections; continuing because reachability checks are skipped"
        )?,
    }

    let hosts = build_hosts(ip);
    if args.print_only {
        writeln!(out, "{}", hosts.keycloak)?;
        writeln!(out, "{}", hosts.midpoint)?;
        writeln!(out, "{}", hosts.argocd)?;
        return Ok(());
    }

    let root = &args.repo_root;
    write_params(&params_file, &ingress_class, &hosts)?;
    let primary = canonical(&params_file);
    for extra in merge_paths(root, DEFAULT_EXTRA_PARAMS_FILES, &args.extra_params_files) {
        if canonical(&extra) == primary {
            continue;
        }
        write_params(&extra, &ingress_class, &hosts)?;
    }

    let manifests = merge_paths(root, DEFAULT_MANIFEST_FILES, &args.manifest_files);
    let rewritten = update_manifest_hosts(&manifests, &hosts)?;
    info!("Rewrote hostnames in {} manifest(s)", rewritten.len());

    let validation_paths = merge_paths(root, DEFAULT_VALIDATION_PATHS, &args.validation_paths);
    ensure_hosts_rotated(&validation_paths, ip)?;

    if ci.is_active() {
        ci.publish(ip, &hosts)
            .context("Failed to publish GitHub Actions outputs")?;
        info!("Published ingress hosts to GitHub Actions");
    } else {
        debug!("GITHUB_ENV and GITHUB_OUTPUT not set, skipping CI outputs");
    }

    writeln!(out, "✅ Updated ingress host configuration:")?;
    writeln!(out, "   Keycloak:  {}", hosts.keycloak_url())?;
    writeln!(out, "   midPoint:  {}", hosts.midpoint_url())?;
    writeln!(out, "   Argo CD:   {}", hosts.argocd_url())?;
    Ok(())
}

/// Absolute form of `path` for identity comparison, even when it does not exist yet
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}
