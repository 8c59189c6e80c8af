//! Materializes a normalized credential as the cloudnative-pg backup secret.
//!
//! The secret is rendered client-side with `kubectl create --dry-run=client`
//! and applied with `kubectl apply -f -`, so re-running the command updates
//! an existing secret in place.

use anyhow::{Context, Result};
use tracing::info;
use zeroize::Zeroizing;

use super::AzureCredential;
use crate::tools::Kubectl;

/// Secret keys consumed by the backup configuration
pub const ACCOUNT_KEY_NAME: &str = "AZURE_STORAGE_ACCOUNT";
pub const CONNECTION_STRING_KEY_NAME: &str = "AZURE_CONNECTION_STRING";
pub const STORAGE_KEY_KEY_NAME: &str = "AZURE_STORAGE_KEY";
pub const SAS_TOKEN_KEY_NAME: &str = "AZURE_STORAGE_SAS_TOKEN";

fn literal(key: &str, value: &str) -> String {
    format!("--from-literal={key}={value}")
}

/// `--from-literal` arguments for every populated credential field
pub fn secret_literals(credential: &AzureCredential) -> Vec<String> {
    let mut literals = vec![
        literal(ACCOUNT_KEY_NAME, &credential.storage_account),
        literal(CONNECTION_STRING_KEY_NAME, &credential.connection_string),
    ];
    if let Some(key) = credential.account_key.as_deref() {
        literals.push(literal(STORAGE_KEY_KEY_NAME, key));
    }
    if let Some(token) = credential.sas_token.as_deref() {
        literals.push(literal(SAS_TOKEN_KEY_NAME, token));
    }
    literals
}

/// Create or update `secret_name` in `namespace` from `credential`
pub fn apply_secret(
    kubectl: &Kubectl<'_>,
    namespace: &str,
    secret_name: &str,
    credential: &AzureCredential,
) -> Result<()> {
    let manifest = Zeroizing::new(
        kubectl
            .run(|inv| {
                inv.args(["-n", namespace, "create", "secret", "generic", secret_name])
                    .args(["--dry-run=client", "-o", "yaml"])
                    .args(secret_literals(credential))
                    .sensitive()
            })
            .with_context(|| format!("Failed to render {secret_name} secret"))?,
    );

    kubectl
        .apply_stdin(&manifest, true)
        .with_context(|| format!("kubectl apply failed for secret {namespace}/{secret_name}"))?;

    info!(
        "Applied secret {}/{} ({})",
        namespace,
        secret_name,
        credential.kind()
    );
    Ok(())
}
