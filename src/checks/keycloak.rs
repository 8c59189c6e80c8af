//! # Keycloak Typed Fields
//!
//! The Keycloak operator exposes first-class fields for the database and
//! hostname. Passing the same settings through `additionalOptions` or
//! `spec.db.url` bypasses validation and silently drops TLS, so both are
//! rejected here.
//!
//! Two flavors:
//!
//! - [`check_keycloak_text`] works on the raw manifest text, so it also
//!   catches files that do not parse as YAML
//! - [`check_keycloak_document`] works on a parsed `Keycloak` document and is
//!   used by the repository scan

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde_yaml::Value;

use super::{lookup, Contract, Violation};

/// `additionalOptions` names that have typed equivalents
pub const BANNED_ADDITIONAL_OPTIONS: [&str; 4] =
    ["db-url", "hostname-strict", "hostname-strict-https", "features"];

const REQUIRED_SSL_MODE: &str = "require";

/// Check a Keycloak manifest file
pub fn check_keycloak_manifest(path: &Path) -> Result<Vec<Violation>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read Keycloak manifest: {}", path.display()))?;
    Ok(check_keycloak_text(&text)?
        .into_iter()
        .map(|message| Violation::new(Contract::KeycloakTypedFields, path, message))
        .collect())
}

/// Line-based check of a Keycloak manifest; returns one message per problem
pub fn check_keycloak_text(text: &str) -> Result<Vec<String>> {
    let mut errors = Vec::new();

    for flag in BANNED_ADDITIONAL_OPTIONS {
        let pattern = format!(r"(?m)^\s*-?\s*name:\s*{}\s*$", regex::escape(flag));
        let re = Regex::new(&pattern).map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;
        if re.is_match(text) {
            errors.push(format!(
                "Keycloak manifest must not configure --{flag} via additionalOptions (pattern '{pattern}')."
            ));
        }
    }

    let db_block = Regex::new(r"(?m)^  db:\n((?:(?: {4}|\t).*(?:\n|$))*)")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;
    let Some(caps) = db_block.captures(text) else {
        errors.push(
            "Unable to locate spec.db block in Keycloak manifest; update the checker if the manifest moved."
                .to_string(),
        );
        return Ok(errors);
    };
    let body = caps.get(1).map_or("", |m| m.as_str());

    if body.lines().any(|line| line.trim().starts_with("url:")) {
        errors.push(
            "Keycloak manifest must drive the database connection through typed host/port/database \
             fields instead of spec.db.url."
                .to_string(),
        );
    }

    let ssl_mode = Regex::new(r"(?m)^\s*sslMode:\s*(\S+)")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;
    match ssl_mode.captures(body).and_then(|c| c.get(1)) {
        None => errors.push(
            "Keycloak manifest must set spec.db.sslMode to enforce TLS for database connections."
                .to_string(),
        ),
        Some(value) if value.as_str() != REQUIRED_SSL_MODE => errors.push(format!(
            "Keycloak manifest must enforce TLS via spec.db.sslMode: require (found '{}').",
            value.as_str()
        )),
        Some(_) => {}
    }

    Ok(errors)
}

/// Structural check of a parsed `Keycloak` document
pub fn check_keycloak_document(document: &Value, path: &Path) -> Vec<Violation> {
    let violation = |message: String| Violation::new(Contract::KeycloakTypedFields, path, message);
    let mut violations = Vec::new();

    let image = lookup(document, &["spec", "image"]).and_then(Value::as_str);
    if let Some(image) = image {
        if !has_explicit_tag(image) {
            violations.push(violation(format!("Keycloak image '{image}' must include an explicit tag")));
        }
    }

    if let Some(options) = lookup(document, &["spec", "additionalOptions"]).and_then(Value::as_sequence) {
        let mut banned: Vec<&str> = options
            .iter()
            .filter_map(|option| option.get("name").and_then(Value::as_str))
            .filter(|name| BANNED_ADDITIONAL_OPTIONS.contains(name))
            .collect();
        if !banned.is_empty() {
            banned.sort_unstable();
            violations.push(violation(format!(
                "Keycloak additionalOptions must avoid legacy CLI flags: {}",
                banned.join(", ")
            )));
        }
    }

    if let Some(db) = lookup(document, &["spec", "db"]) {
        if db.get("url").is_some() {
            violations.push(violation(
                "spec.db.url must not be set; use typed host/port/database fields instead".to_string(),
            ));
        }
        if let Some(mode) = db.get("sslMode").and_then(Value::as_str) {
            if mode != REQUIRED_SSL_MODE {
                violations.push(violation(format!(
                    "spec.db.sslMode must be '{REQUIRED_SSL_MODE}' (found '{mode}')"
                )));
            }
        }
    }

    violations
}

/// Tag or digest present on the last path component
fn has_explicit_tag(image: &str) -> bool {
    let last = image.rsplit('/').next().unwrap_or(image);
    last.contains(':') || last.contains('@')
}
