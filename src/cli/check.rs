//! Check commands
//!
//! `check-keycloak` reproduces the standalone Keycloak manifest gate;
//! `check` runs every repository contract and renders a report.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::checks::{check_keycloak_manifest, check_repository, OutputFormat};
use crate::constants::{DEFAULT_CONTRACTS_ROOT, DEFAULT_KEYCLOAK_MANIFEST};

#[derive(Debug, Clone, Args)]
pub struct CheckKeycloakArgs {
    /// Keycloak custom resource manifest
    #[arg(long, value_name = "PATH", default_value = DEFAULT_KEYCLOAK_MANIFEST)]
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Directory to scan
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CONTRACTS_ROOT)]
    pub root: PathBuf,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub fn check_keycloak_command(args: &CheckKeycloakArgs, out: &mut dyn Write) -> Result<()> {
    let violations = check_keycloak_manifest(&args.manifest)?;
    if violations.is_empty() {
        writeln!(out, "✅ {} uses typed Keycloak fields", args.manifest.display())?;
        return Ok(());
    }
    for violation in &violations {
        eprintln!("ERROR: {}", violation.message);
    }
    anyhow::bail!(
        "{} Keycloak manifest violation(s) in {}",
        violations.len(),
        args.manifest.display()
    )
}

pub fn check_command(args: &CheckArgs, out: &mut dyn Write) -> Result<()> {
    let report = check_repository(&args.root)?;
    match args.format {
        OutputFormat::Text => write!(out, "{}", report.render_text())?,
        OutputFormat::Json => writeln!(out, "{}", report.render_json()?)?,
    }
    if report.is_clean() {
        Ok(())
    } else {
        anyhow::bail!("{} contract violation(s) under {}", report.violations.len(), args.root.display())
    }
}
