//! # Toolkit Configuration
//!
//! Process-level settings loaded from environment variables.
//!
//! Command-specific inputs (paths, service references, credentials) come from
//! CLI flags; this struct only holds the knobs that are the same for every
//! subcommand: which tool binaries to shell out to, how to log, and how long
//! to wait on a single TCP probe.

use std::time::Duration;

use tracing::warn;

use crate::constants::DEFAULT_TCP_PROBE_TIMEOUT_SECS;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("json") {
            Some(LogFormat::Json)
        } else if value.eq_ignore_ascii_case("text") {
            Some(LogFormat::Text)
        } else {
            None
        }
    }
}

/// Toolkit-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct OpsConfig {
    /// kubectl binary name or path (`IAMCTL_KUBECTL`)
    pub kubectl_bin: String,
    /// Azure CLI binary name or path (`IAMCTL_AZ`)
    pub az_bin: String,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    /// Ignored when `RUST_LOG` is set
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: LogFormat,
    /// Enable color in text format logs
    pub log_enable_color: bool,
    /// TCP connect timeout per reachability probe (seconds, never zero)
    pub tcp_probe_timeout_secs: u64,
    /// Variables that were set but rejected, as `NAME=value` pairs
    ///
    /// Loading happens before logging is installed, so these are kept and
    /// reported by [`OpsConfig::warn_rejected`].
    pub rejected: Vec<String>,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            kubectl_bin: "kubectl".to_string(),
            az_bin: "az".to_string(),
            log_level: "INFO".to_string(),
            log_format: LogFormat::Text,
            log_enable_color: true,
            tcp_probe_timeout_secs: DEFAULT_TCP_PROBE_TIMEOUT_SECS,
            rejected: Vec::new(),
        }
    }
}

impl OpsConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map-backed closure instead of
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut rejected = Vec::new();
        let log_format = parsed_or_default(
            &lookup,
            "IAMCTL_LOG_FORMAT",
            defaults.log_format,
            LogFormat::parse,
            &mut rejected,
        );
        let log_enable_color = parsed_or_default(
            &lookup,
            "IAMCTL_LOG_COLOR",
            defaults.log_enable_color,
            parse_bool,
            &mut rejected,
        );
        let tcp_probe_timeout_secs = parsed_or_default(
            &lookup,
            "IAMCTL_TCP_PROBE_TIMEOUT_SECS",
            defaults.tcp_probe_timeout_secs,
            |v| v.trim().parse::<u64>().ok().filter(|secs| *secs > 0),
            &mut rejected,
        );

        Self {
            kubectl_bin: var_or_default_str(&lookup, "IAMCTL_KUBECTL", &defaults.kubectl_bin),
            az_bin: var_or_default_str(&lookup, "IAMCTL_AZ", &defaults.az_bin),
            log_level: var_or_default_str(&lookup, "IAMCTL_LOG_LEVEL", &defaults.log_level),
            log_format,
            log_enable_color,
            tcp_probe_timeout_secs,
            rejected,
        }
    }

    /// Log every rejected variable; call once logging is initialized
    pub fn warn_rejected(&self) {
        for setting in &self.rejected {
            warn!("Ignoring invalid {setting}; using the default");
        }
    }

    /// Get TCP probe timeout duration
    pub fn tcp_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.tcp_probe_timeout_secs)
    }
}

/// Read and parse a variable, recording values the parser rejects
fn parsed_or_default<T, F, P>(lookup: &F, key: &str, default: T, parse: P, rejected: &mut Vec<String>) -> T
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let Some(value) = lookup(key) else {
        return default;
    };
    parse(&value).unwrap_or_else(|| {
        rejected.push(format!("{key}={value}"));
        default
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read variable as string or return default
fn var_or_default_str<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
