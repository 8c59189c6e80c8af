//! Normalize storage secret command

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use zeroize::Zeroizing;

use crate::config::OpsConfig;
use crate::constants::DEFAULT_BACKUP_SECRET_NAME;
use crate::storage::{apply_secret, parse_credential};
use crate::tools::{CommandRunner, Kubectl};

#[derive(Debug, Clone, Args)]
pub struct NormalizeSecretArgs {
    /// Namespace that receives the secret
    #[arg(long)]
    pub namespace: String,

    /// Storage account used when the credential does not name one
    #[arg(long)]
    pub storage_account: String,

    /// Raw credential (connection string, SAS URL/token, account key or JSON)
    #[arg(long, required_unless_present = "credential_file", conflicts_with = "credential_file")]
    pub credential: Option<String>,

    /// Read the raw credential from a file instead of the command line
    #[arg(long, value_name = "PATH")]
    pub credential_file: Option<PathBuf>,

    /// Name of the secret to create or update
    #[arg(long, default_value = DEFAULT_BACKUP_SECRET_NAME)]
    pub secret_name: String,
}

pub fn normalize_secret_command(
    args: &NormalizeSecretArgs,
    config: &OpsConfig,
    runner: &dyn CommandRunner,
    out: &mut dyn Write,
) -> Result<()> {
    let raw = Zeroizing::new(match (&args.credential, &args.credential_file) {
        (Some(value), _) => value.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read credential file: {}", path.display()))?,
        (None, None) => anyhow::bail!("Either --credential or --credential-file is required"),
    });

    let credential = parse_credential(&raw, &args.storage_account)
        .context("Unable to normalize the Azure Storage credential")?;

    let kubectl = Kubectl::new(runner, &config.kubectl_bin);
    apply_secret(&kubectl, &args.namespace, &args.secret_name, &credential)?;

    writeln!(
        out,
        "✅ Secret {}/{} now holds a normalized {} credential for account {}",
        args.namespace,
        args.secret_name,
        credential.kind(),
        credential.storage_account
    )?;
    Ok(())
}
