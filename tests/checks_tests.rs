//! # Contract Check Tests
//!
//! Builds a small GitOps tree that follows every convention, then breaks one
//! convention per file and checks each is reported under its own contract.

mod common;

use std::path::Path;

use iam_demo_ops::checks::{check_keycloak_manifest, check_repository, Contract};
use tempfile::TempDir;

use common::write_file;

const KEYCLOAK: &str = "apiVersion: k8s.keycloak.org/v2alpha1
kind: Keycloak
metadata:
  name: rws-keycloak
spec:
  image: quay.io/keycloak/keycloak:26.0.7
  db:
    vendor: postgres
    host: iam-db-rw
    database: keycloak
    sslMode: require
  hostname:
    hostname: $(KEYCLOAK_HOST)
  additionalOptions:
    - name: proxy-headers
      value: xforwarded
";

const APPLICATION: &str = "apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: iam
  namespace: argocd
spec:
  project: default
  source:
    repoURL: $(GITOPS_REPO_URL)
    targetRevision: $(GITOPS_TARGET_REVISION)
    path: gitops/apps/iam
  destination:
    server: https://kubernetes.default.svc
    namespace: iam
  syncPolicy:
    automated: {prune: true, selfHeal: true}
    syncOptions:
      - CreateNamespace=true
";

const APPLICATION_SET: &str = "apiVersion: argoproj.io/v1alpha1
kind: ApplicationSet
metadata:
  name: platform-addons
spec:
  generators:
    - list:
        elements:
          - name: cert-manager
            chart: cert-manager
            repoURL: https://charts.jetstack.io
            targetRevision: v1.18.2
          - name: ingress-nginx
            chart: ingress-nginx
            repoURL: https://kubernetes.github.io/ingress-nginx
            targetRevision: 4.13.2
  template:
    metadata:
      name: '{{name}}'
    spec:
      project: default
      source:
        repoURL: '{{repoURL}}'
        chart: '{{chart}}'
        targetRevision: '{{targetRevision}}'
        helm:
          values: |
{{ toYaml .values | indent 12 }}
";

const KUSTOMIZATION: &str = "apiVersion: kustomize.config.k8s.io/v1beta1
kind: Kustomization
resources:
  - keycloak/keycloak.yaml
  - db/cluster.yaml
secretGenerator:
  - name: iam-db-app
    type: Opaque
    literals: [username=app]
configMapGenerator:
  - name: midpoint-env
    literals:
      - MIDPOINT_DB_HOST=iam-db-rw
      - MIDPOINT_DB_SSLMODE=require
";

const CNPG_CLUSTER: &str = "apiVersion: postgresql.cnpg.io/v1
kind: Cluster
metadata:
  name: iam-db
  annotations:
    argocd.argoproj.io/sync-options: SkipDryRunOnMissingResource=true
spec:
  instances: 1
";

const PARAMS: &str = "ingressClass=nginx
keycloakHost=kc.20.50.60.70.nip.io
midpointHost=mp.20.50.60.70.nip.io
argocdHost=argocd.20.50.60.70.nip.io
";

fn conforming_tree(root: &Path) {
    write_file(root, "apps/iam/keycloak/keycloak.yaml", KEYCLOAK);
    write_file(root, "apps/iam/kustomization.yaml", KUSTOMIZATION);
    write_file(root, "apps/iam/db/cluster.yaml", CNPG_CLUSTER);
    write_file(root, "apps/iam/params.env", PARAMS);
    write_file(root, "clusters/aks/apps/iam.yaml", APPLICATION);
    write_file(root, "clusters/aks/apps/platform.yaml", APPLICATION_SET);
    write_file(root, "README.md", "not yaml: [\n");
}

#[test]
fn test_conforming_tree_is_clean() {
    let dir = TempDir::new().unwrap();
    conforming_tree(dir.path());

    let report = check_repository(dir.path()).unwrap();

    assert!(report.is_clean(), "{}", report.render_text());
    assert_eq!(report.files_checked, 6);
}

#[test]
fn test_each_broken_convention_is_reported() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    conforming_tree(root);

    write_file(
        root,
        "apps/iam/keycloak/keycloak.yaml",
        &KEYCLOAK.replace("name: proxy-headers", "name: hostname-strict"),
    );
    write_file(root, "apps/iam/kustomization.yaml", &KUSTOMIZATION.replace("    type: Opaque\n", "").replace("SSLMODE=require", "SSLMODE=prefer"));
    write_file(root, "apps/iam/db/cluster.yaml", &CNPG_CLUSTER.replace("SkipDryRunOnMissingResource=true", "Prune=false"));
    write_file(root, "apps/iam/params.env", "ingressClass=nginx\n");
    write_file(
        root,
        "clusters/aks/apps/iam.yaml",
        &APPLICATION
            .replace("$(GITOPS_REPO_URL)", "https://github.com/example/iam-demo.git")
            .replace("      - CreateNamespace=true\n", "      - ServerSideApply=true\n"),
    );
    write_file(root, "clusters/aks/apps/platform.yaml", &APPLICATION_SET.replace("v1.18.2", "latest"));
    write_file(root, "clusters/aks/broken.yaml", "kind: Application\nspec: [unclosed\n");

    let report = check_repository(root).unwrap();

    for contract in [
        Contract::KeycloakTypedFields,
        Contract::ChartPinning,
        Contract::TemplatedRepository,
        Contract::ApplicationConventions,
        Contract::OpaqueSecrets,
        Contract::DatabaseTls,
        Contract::CnpgSkipDryRun,
        Contract::ParamsCompleteness,
        Contract::YamlSyntax,
    ] {
        assert!(report.of(contract).next().is_some(), "missing {contract}:\n{}", report.render_text());
    }
    assert_eq!(report.of(Contract::ParamsCompleteness).count(), 3);
    assert_eq!(report.files_checked, 7);

    let json: serde_json::Value = serde_json::from_str(&report.render_json().unwrap()).unwrap();
    assert_eq!(json["violations"].as_array().unwrap().len(), report.violations.len());
}

#[test]
fn test_keycloak_manifest_gate() {
    let dir = TempDir::new().unwrap();
    let good = write_file(dir.path(), "good.yaml", KEYCLOAK);
    assert!(check_keycloak_manifest(&good).unwrap().is_empty());

    let bad = write_file(
        dir.path(),
        "bad.yaml",
        &KEYCLOAK.replace("    sslMode: require\n", "    url: jdbc:postgresql://iam-db-rw/keycloak\n"),
    );
    let messages: Vec<String> = check_keycloak_manifest(&bad)
        .unwrap()
        .into_iter()
        .map(|v| v.message)
        .collect();
    assert_eq!(
        messages,
        vec![
            "Keycloak manifest must drive the database connection through typed host/port/database fields instead of spec.db.url.",
            "Keycloak manifest must set spec.db.sslMode to enforce TLS for database connections.",
        ]
    );

    assert!(check_keycloak_manifest(&dir.path().join("missing.yaml")).is_err());
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(check_repository(&dir.path().join("absent")).is_err());
}

#[cfg(unix)]
#[test]
fn test_symlinked_manifests_are_checked() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("gitops");
    conforming_tree(&root);
    let shared = write_file(
        dir.path(),
        "shared/cluster.yaml",
        &CNPG_CLUSTER.replace("SkipDryRunOnMissingResource=true", "Prune=false"),
    );
    std::os::unix::fs::symlink(&shared, root.join("apps/iam/db/linked.yaml")).unwrap();

    let report = check_repository(&root).unwrap();

    assert_eq!(report.files_checked, 7);
    let violations: Vec<_> = report.of(Contract::CnpgSkipDryRun).collect();
    assert_eq!(violations.len(), 1);
    assert!(violations[0].path.ends_with("linked.yaml"));
}
