//! # Repository Contracts
//!
//! Walks a GitOps tree and checks each YAML document against the conventions
//! for its kind. Kustomization files and `params.env` files get their own
//! checks. Files are visited in file-name order so reports are stable.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_yaml::Value;
use tracing::debug;
use walkdir::WalkDir;

use super::keycloak::check_keycloak_document;
use super::{load_yaml_documents, lookup, scalar_text, Contract, Report, Violation};
use crate::hosts::params::{ParamsFile, REQUIRED_KEYS};

const CREATE_NAMESPACE: &str = "CreateNamespace=true";
const SYNC_OPTIONS_ANNOTATION: &str = "argocd.argoproj.io/sync-options";
const SKIP_DRY_RUN: &str = "SkipDryRunOnMissingResource=true";
const CNPG_GROUP: &str = "postgresql.cnpg.io/";
const REQUIRED_SSL_MODE: &str = "require";

/// Run every contract over the files under `root`
pub fn check_repository(root: &Path) -> Result<Report> {
    if !root.is_dir() {
        anyhow::bail!("Contracts root is not a directory: {}", root.display());
    }

    let mut report = Report::default();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();

        if file_name == "params.env" {
            report.files_checked += 1;
            let params = ParamsFile::load(path)?;
            report.violations.extend(check_params(&params, path));
        } else if file_name.ends_with(".yaml") || file_name.ends_with(".yml") {
            report.files_checked += 1;
            report.violations.extend(check_yaml_file(path)?);
        }
    }

    debug!(
        "Checked {} files under {}, {} violation(s)",
        report.files_checked,
        root.display(),
        report.violations.len()
    );
    Ok(report)
}

fn check_yaml_file(path: &Path) -> Result<Vec<Violation>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let documents = match load_yaml_documents(&text) {
        Ok(documents) => documents,
        Err(e) => {
            return Ok(vec![Violation::new(
                Contract::YamlSyntax,
                path,
                format!("Unable to parse YAML: {e}"),
            )])
        }
    };

    let is_kustomization = path
        .file_stem()
        .is_some_and(|stem| stem.eq_ignore_ascii_case("kustomization"));

    let mut violations = Vec::new();
    for document in &documents {
        if is_kustomization {
            violations.extend(check_kustomization(document, path));
            continue;
        }
        violations.extend(check_document(document, path));
    }
    Ok(violations)
}

/// Dispatch a single document by `kind`
pub fn check_document(document: &Value, path: &Path) -> Vec<Violation> {
    let kind = document.get("kind").and_then(Value::as_str).unwrap_or_default();
    let api_version = document
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match kind {
        "Keycloak" => check_keycloak_document(document, path),
        "ApplicationSet" => check_application_set(document, path),
        "Application" => check_application(document, path),
        "Kustomization" => check_kustomization(document, path),
        "Cluster" | "Database" if api_version.starts_with(CNPG_GROUP) => check_cnpg(document, path),
        _ => Vec::new(),
    }
}

/// `$(VAR)` kustomize var or `{{...}}` generator parameter
pub fn is_templated(value: &str) -> bool {
    let value = value.trim();
    (value.starts_with("$(") && value.ends_with(')')) || (value.contains("{{") && value.contains("}}"))
}

/// `1.2`, `v1.18.2`, `0.26.0.1`
pub fn is_pinned_version(value: &str) -> bool {
    let version = value.strip_prefix('v').unwrap_or(value);
    let parts: Vec<&str> = version.split('.').collect();
    (2..=4).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn name_of(value: &Value) -> String {
    value
        .get("name")
        .and_then(scalar_text)
        .or_else(|| lookup(value, &["metadata", "name"]).and_then(scalar_text))
        .unwrap_or_else(|| "<unknown>".to_string())
}

fn require_templated(
    value: Option<&Value>,
    field: &str,
    owner: &str,
    path: &Path,
    violations: &mut Vec<Violation>,
) {
    match value.and_then(scalar_text) {
        Some(text) if is_templated(&text) => {}
        Some(text) => violations.push(Violation::new(
            Contract::TemplatedRepository,
            path,
            format!("{owner} {field} must be templated, found '{text}'"),
        )),
        None => violations.push(Violation::new(
            Contract::TemplatedRepository,
            path,
            format!("{owner} is missing {field}"),
        )),
    }
}

fn check_application_set(document: &Value, path: &Path) -> Vec<Violation> {
    let name = name_of(document);
    let mut violations = Vec::new();

    let generators = lookup(document, &["spec", "generators"])
        .and_then(Value::as_sequence)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for generator in generators {
        if let Some(elements) = lookup(generator, &["list", "elements"]).and_then(Value::as_sequence) {
            for element in elements {
                if element.get("chart").is_none() && element.get("targetRevision").is_none() {
                    continue;
                }
                let chart = name_of(element);
                match element.get("targetRevision").and_then(scalar_text) {
                    Some(version) if is_pinned_version(&version) => {}
                    other => violations.push(Violation::new(
                        Contract::ChartPinning,
                        path,
                        format!(
                            "{chart} chart must pin a semantic version (got: {})",
                            other.unwrap_or_else(|| "none".to_string())
                        ),
                    )),
                }
                let repo = element.get("repoURL").and_then(Value::as_str).unwrap_or_default();
                if !repo.starts_with("https://") {
                    violations.push(Violation::new(
                        Contract::ChartPinning,
                        path,
                        format!("{chart} chart must use an HTTPS repository (got: '{repo}')"),
                    ));
                }
            }
        }

        if let Some(git) = generator.get("git") {
            let owner = format!("ApplicationSet {name} git generator");
            require_templated(git.get("repoURL"), "repoURL", &owner, path, &mut violations);
            require_templated(git.get("revision"), "revision", &owner, path, &mut violations);
        }
    }

    if let Some(source) = lookup(document, &["spec", "template", "spec", "source"]) {
        let owner = format!("ApplicationSet {name} template source");
        require_templated(source.get("repoURL"), "repoURL", &owner, path, &mut violations);
        require_templated(source.get("targetRevision"), "targetRevision", &owner, path, &mut violations);
    }

    violations
}

fn check_application(document: &Value, path: &Path) -> Vec<Violation> {
    let owner = format!("Application {}", name_of(document));
    let mut violations = Vec::new();

    match lookup(document, &["spec", "source"]) {
        Some(source) => {
            if source.get("chart").is_none() && source.get("path").is_none() {
                violations.push(Violation::new(
                    Contract::ApplicationConventions,
                    path,
                    format!("{owner} must reference a path within the repository"),
                ));
            }
            if source.get("chart").is_none() {
                require_templated(source.get("repoURL"), "repoURL", &owner, path, &mut violations);
                require_templated(
                    source.get("targetRevision"),
                    "targetRevision",
                    &owner,
                    path,
                    &mut violations,
                );
            }
        }
        None => violations.push(Violation::new(
            Contract::ApplicationConventions,
            path,
            format!("{owner} has no spec.source"),
        )),
    }

    let creates_namespace = lookup(document, &["spec", "syncPolicy", "syncOptions"])
        .and_then(Value::as_sequence)
        .is_some_and(|options| options.iter().any(|o| o.as_str() == Some(CREATE_NAMESPACE)));
    if !creates_namespace {
        violations.push(Violation::new(
            Contract::ApplicationConventions,
            path,
            format!("{owner} must set syncPolicy.syncOptions {CREATE_NAMESPACE}"),
        ));
    }

    violations
}

fn check_kustomization(document: &Value, path: &Path) -> Vec<Violation> {
    let mut violations = Vec::new();

    let generators = |key: &str| {
        document
            .get(key)
            .and_then(Value::as_sequence)
            .map(Vec::as_slice)
            .unwrap_or_default()
    };

    for secret in generators("secretGenerator") {
        if secret.get("type").and_then(Value::as_str) != Some("Opaque") {
            violations.push(Violation::new(
                Contract::OpaqueSecrets,
                path,
                format!("secretGenerator {} must set type: Opaque", name_of(secret)),
            ));
        }
    }

    for config_map in generators("configMapGenerator") {
        let literals = config_map
            .get("literals")
            .and_then(Value::as_sequence)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for literal in literals.iter().filter_map(Value::as_str) {
            let Some((key, value)) = literal.split_once('=') else {
                continue;
            };
            if key.trim().ends_with("_SSLMODE") && value.trim() != REQUIRED_SSL_MODE {
                violations.push(Violation::new(
                    Contract::DatabaseTls,
                    path,
                    format!(
                        "configMapGenerator {} must set {}={REQUIRED_SSL_MODE} (found '{}')",
                        name_of(config_map),
                        key.trim(),
                        value.trim()
                    ),
                ));
            }
        }
    }

    violations
}

fn check_cnpg(document: &Value, path: &Path) -> Vec<Violation> {
    let kind = document.get("kind").and_then(Value::as_str).unwrap_or_default();
    let options = lookup(document, &["metadata", "annotations", SYNC_OPTIONS_ANNOTATION])
        .and_then(Value::as_str)
        .unwrap_or_default();
    if options.split(',').any(|o| o.trim() == SKIP_DRY_RUN) {
        return Vec::new();
    }
    vec![Violation::new(
        Contract::CnpgSkipDryRun,
        path,
        format!(
            "{kind} {} must set {SYNC_OPTIONS_ANNOTATION}: {SKIP_DRY_RUN} until CNPG CRDs register",
            name_of(document)
        ),
    )]
}

fn check_params(params: &ParamsFile, path: &Path) -> Vec<Violation> {
    REQUIRED_KEYS
        .iter()
        .filter(|key| params.get(key).is_none())
        .map(|key| {
            Violation::new(
                Contract::ParamsCompleteness,
                path,
                format!("{key} missing from params file"),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_templating_detection() {
        assert!(is_templated("$(GITOPS_REPO_URL)"));
        assert!(is_templated("{{repoURL}}"));
        assert!(is_templated("'{{ .path.basename }}'"));
        assert!(!is_templated("https://github.com/example/iam-demo.git"));
        assert!(!is_templated("main"));
    }

    #[test]
    fn test_version_pinning() {
        assert!(is_pinned_version("v1.18.2"));
        assert!(is_pinned_version("0.26.0"));
        assert!(is_pinned_version("4.13"));
        assert!(!is_pinned_version("latest"));
        assert!(!is_pinned_version("4.x"));
        assert!(!is_pinned_version("1"));
        assert!(!is_pinned_version("1.2.3.4.5"));
    }

    #[test]
    fn test_application_conventions() {
        let good = doc(
            "kind: Application
metadata: {name: iam}
spec:
  source: {repoURL: $(GITOPS_REPO_URL), targetRevision: $(GITOPS_TARGET_REVISION), path: gitops/apps/iam}
  syncPolicy: {syncOptions: [CreateNamespace=true]}
",
        );
        assert!(check_document(&good, Path::new("app.yaml")).is_empty());

        let bad = doc(
            "kind: Application
metadata: {name: iam}
spec:
  source: {repoURL: 'https://github.com/x/y.git', targetRevision: main}
",
        );
        let violations = check_document(&bad, Path::new("app.yaml"));
        assert_eq!(violations.len(), 4);
        assert!(violations.iter().any(|v| v.message.contains("must reference a path")));
        assert!(violations.iter().any(|v| v.message.contains(CREATE_NAMESPACE)));
    }

    #[test]
    fn test_chart_application_needs_no_path() {
        let chart = doc(
            "kind: Application
spec:
  source: {chart: ingress-nginx, repoURL: 'https://kubernetes.github.io/ingress-nginx', targetRevision: 4.13.2}
  syncPolicy: {syncOptions: [CreateNamespace=true]}
",
        );
        assert!(check_document(&chart, Path::new("app.yaml")).is_empty());
    }

    #[test]
    fn test_application_set_chart_pinning() {
        let appset = doc(
            "kind: ApplicationSet
metadata: {name: platform-charts}
spec:
  generators:
    - list:
        elements:
          - {name: cert-manager, chart: cert-manager, repoURL: 'https://charts.jetstack.io', targetRevision: v1.18.2}
          - {name: ingress-nginx, chart: ingress-nginx, repoURL: 'http://insecure', targetRevision: latest}
  template:
    spec:
      source: {repoURL: '{{repoURL}}', targetRevision: '{{targetRevision}}', chart: '{{chart}}'}
",
        );
        let violations = check_document(&appset, Path::new("appset.yaml"));
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.contract == Contract::ChartPinning));
        assert!(violations[0].message.contains("ingress-nginx chart must pin"));
    }

    #[test]
    fn test_application_set_git_generator_must_be_templated() {
        let appset = doc(
            "kind: ApplicationSet
metadata: {name: root}
spec:
  generators:
    - git: {repoURL: 'https://github.com/x/y.git', revision: $(TARGET_REVISION)}
  template:
    spec:
      source: {repoURL: $(REPO_URL), targetRevision: $(TARGET_REVISION), path: '{{path}}'}
",
        );
        let violations = check_document(&appset, Path::new("root.yaml"));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].contract, Contract::TemplatedRepository);
        assert!(violations[0].message.contains("git generator repoURL"));
    }

    #[test]
    fn test_kustomization_generators() {
        let kustomization = doc(
            "secretGenerator:
  - {name: iam-db-app, type: Opaque}
  - {name: midpoint-db-app}
configMapGenerator:
  - name: midpoint-env
    literals: [MIDPOINT_DB_SSLMODE=disable, MIDPOINT_DB_HOST=iam-db-rw]
",
        );
        let violations = check_kustomization(&kustomization, Path::new("kustomization.yaml"));
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].contract, Contract::OpaqueSecrets);
        assert!(violations[0].message.contains("midpoint-db-app"));
        assert_eq!(violations[1].contract, Contract::DatabaseTls);
        assert!(violations[1].message.contains("found 'disable'"));
    }

    #[test]
    fn test_cnpg_documents_skip_dry_run() {
        let missing = doc("apiVersion: postgresql.cnpg.io/v1\nkind: Cluster\nmetadata: {name: iam-db}\n");
        assert_eq!(check_document(&missing, Path::new("cluster.yaml")).len(), 1);

        let present = doc(
            "apiVersion: postgresql.cnpg.io/v1
kind: Database
metadata:
  name: keycloak
  annotations: {argocd.argoproj.io/sync-options: 'Prune=false,SkipDryRunOnMissingResource=true'}
",
        );
        assert!(check_document(&present, Path::new("db.yaml")).is_empty());

        let other_cluster = doc("apiVersion: v1\nkind: Cluster\n");
        assert!(check_document(&other_cluster, Path::new("x.yaml")).is_empty());
    }

    #[test]
    fn test_params_completeness() {
        let params = ParamsFile::parse("ingressClass=nginx\nkeycloakHost=kc.1.2.3.4.nip.io\n");
        let violations = check_params(&params, Path::new("params.env"));
        let missing: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        assert_eq!(
            missing,
            vec!["midpointHost missing from params file", "argocdHost missing from params file"]
        );
    }
}
