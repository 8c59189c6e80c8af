//! # Manifest Checks
//!
//! Static assertions over the GitOps tree.
//!
//! - [`keycloak`]: the Keycloak custom resource must configure the database
//!   and hostname through typed fields, not `additionalOptions` or `db.url`
//! - [`gitops`]: repository-wide contracts (pinned charts, templated repo
//!   URLs, Argo CD Application conventions, Opaque secrets, TLS-only database
//!   settings, CNPG dry-run skipping, complete params files)
//!
//! Checks never modify files. Every finding is a [`Violation`]; callers turn
//! a non-empty [`Report`] into a failing exit status.

pub mod gitops;
pub mod keycloak;

pub use gitops::check_repository;
pub use keycloak::{check_keycloak_manifest, check_keycloak_text};

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Which convention a violation breaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Contract {
    KeycloakTypedFields,
    ChartPinning,
    TemplatedRepository,
    ApplicationConventions,
    OpaqueSecrets,
    DatabaseTls,
    CnpgSkipDryRun,
    ParamsCompleteness,
    YamlSyntax,
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Contract::KeycloakTypedFields => "keycloak-typed-fields",
            Contract::ChartPinning => "chart-pinning",
            Contract::TemplatedRepository => "templated-repository",
            Contract::ApplicationConventions => "application-conventions",
            Contract::OpaqueSecrets => "opaque-secrets",
            Contract::DatabaseTls => "database-tls",
            Contract::CnpgSkipDryRun => "cnpg-skip-dry-run",
            Contract::ParamsCompleteness => "params-completeness",
            Contract::YamlSyntax => "yaml-syntax",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub contract: Contract,
    pub path: PathBuf,
    pub message: String,
}

impl Violation {
    pub fn new(contract: Contract, path: &Path, message: impl Into<String>) -> Self {
        Self {
            contract,
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.contract, self.path.display(), self.message)
    }
}

/// Result of a check run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub files_checked: usize,
    pub violations: Vec<Violation>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations of a single contract
    pub fn of(&self, contract: Contract) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.contract == contract)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for violation in &self.violations {
            out.push_str(&format!("❌ {violation}\n"));
        }
        if self.is_clean() {
            out.push_str(&format!("✅ {} files checked, no violations\n", self.files_checked));
        } else {
            out.push_str(&format!(
                "{} violation(s) in {} files checked\n",
                self.violations.len(),
                self.files_checked
            ));
        }
        out
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Parse every document in a (possibly templated) YAML file
///
/// Lines consisting solely of a Go template action such as
/// `{{ toYaml .values | indent 12 }}` are dropped first; empty documents are
/// skipped.
pub fn load_yaml_documents(text: &str) -> Result<Vec<Value>, serde_yaml::Error> {
    let neutralized = neutralize_templates(text);
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&neutralized) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

fn neutralize_templates(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Walk `keys` from `value`, stopping at the first missing key
pub(crate) fn lookup<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(value, |current, key| current.get(*key))
}

/// Scalar rendered as text (YAML may read `4.13` as a float)
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
