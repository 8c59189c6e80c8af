//! # Observability
//!
//! Tracing subscriber setup shared by every `iamctl` subcommand.
//!
//! `RUST_LOG` always wins. Without it the configured level is scoped to this
//! crate and the binary so dependency noise stays out of CI logs.
//! Log lines go to stderr; stdout is reserved for command results.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, OpsConfig};

/// Build the default filter directive for the configured level
pub fn default_filter(level: &str) -> String {
    let level = level.trim().to_lowercase();
    format!("iamctl={level},iam_demo_ops={level}")
}

/// Install the global tracing subscriber
///
/// Returns an error when a subscriber is already installed, which callers
/// may log and ignore.
pub fn init_logging(config: &OpsConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&config.log_level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match config.log_format {
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize JSON logging: {e}")),
        LogFormat::Text => builder
            .with_ansi(config.log_enable_color)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_scopes_level_to_crate() {
        assert_eq!(default_filter("INFO"), "iamctl=info,iam_demo_ops=info");
        assert_eq!(default_filter(" debug "), "iamctl=debug,iam_demo_ops=debug");
    }
}
