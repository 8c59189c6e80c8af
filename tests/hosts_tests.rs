//! # Host Rotation Tests
//!
//! These tests verify:
//! - Deterministic host derivation
//! - Params file creation and upsert
//! - Manifest rewriting followed by a clean stale-reference scan

mod common;

use std::fs;
use std::net::IpAddr;

use iam_demo_ops::hosts::{
    build_hosts, build_params, discover_stale_hosts, ensure_hosts_rotated, read_ingress_class,
    update_ingress_values, update_manifest_hosts, write_params, ParamsFile, StaleHost,
};
use tempfile::TempDir;

use common::write_file;

fn ip(value: &str) -> IpAddr {
    value.parse().unwrap()
}

#[test]
fn test_build_hosts_is_deterministic() {
    let hosts = build_hosts(ip("20.50.60.70"));
    assert_eq!(hosts.keycloak, "kc.20.50.60.70.nip.io");
    assert_eq!(hosts.midpoint, "mp.20.50.60.70.nip.io");
    assert_eq!(hosts.argocd, "argocd.20.50.60.70.nip.io");
    assert_eq!(hosts, build_hosts(ip("20.50.60.70")));
}

#[test]
fn test_fresh_params_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("apps/iam/params.env");
    let hosts = build_hosts(ip("20.50.60.70"));

    write_params(&path, "nginx", &hosts).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, build_params(ip("20.50.60.70"), "nginx"));
    let params = ParamsFile::parse(&content);
    assert_eq!(params.get("ingressClass"), Some("nginx"));
    assert_eq!(params.get("keycloakHost"), Some("kc.20.50.60.70.nip.io"));
    assert_eq!(params.get("midpointHost"), Some("mp.20.50.60.70.nip.io"));
    assert_eq!(params.get("argocdHost"), Some("argocd.20.50.60.70.nip.io"));
    assert_eq!(read_ingress_class(&path).unwrap().as_deref(), Some("nginx"));
}

#[test]
fn test_params_upsert_preserves_unrelated_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        dir.path(),
        "params.env",
        "# managed by hand\nrealm=demo\nkeycloakHost=kc.198.51.100.7.nip.io\ningressClass=internal\n",
    );

    write_params(&path, "internal", &build_hosts(ip("20.50.60.70"))).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# managed by hand\nrealm=demo\nkeycloakHost=kc.20.50.60.70.nip.io\n"));
    assert!(content.contains("ingressClass=internal"));
    assert!(content.contains("midpointHost=mp.20.50.60.70.nip.io"));
    assert!(!content.contains("198.51.100.7"));
}

#[test]
fn test_missing_params_file_has_no_ingress_class() {
    let dir = TempDir::new().unwrap();
    assert_eq!(read_ingress_class(&dir.path().join("absent.env")).unwrap(), None);
}

#[test]
fn test_single_stale_keycloak_host_is_reported_exactly() {
    let dir = TempDir::new().unwrap();
    let manifest = write_file(dir.path(), "gitops/keycloak.yaml", "hostname: kc.192.0.2.4.nip.io\n");
    let expected = ip("203.0.113.8");
    let paths = [dir.path().join("gitops")];

    assert_eq!(
        discover_stale_hosts(&paths, expected).unwrap(),
        vec![StaleHost {
            path: manifest.clone(),
            reference: "kc.192.0.2.4.nip.io".to_string(),
        }]
    );

    update_manifest_hosts(&[manifest], &build_hosts(expected)).unwrap();
    assert_eq!(discover_stale_hosts(&paths, expected).unwrap(), vec![]);
}

#[test]
fn test_rewrite_then_scan_is_clean() {
    let dir = TempDir::new().unwrap();
    let manifest = write_file(
        dir.path(),
        "gitops/apps/iam/ingress.yaml",
        "# keycloak entrypoint\nspec:\n  rules:\n    - host: kc.192.0.2.4.nip.io\n    - host: mp.192.0.2.4.nip.io\n",
    );
    let notes = write_file(dir.path(), "gitops/NOTES.md", "Argo CD: argocd.192.0.2.4.nip.io\n");

    let expected = ip("203.0.113.8");
    let stale = discover_stale_hosts(&[dir.path().join("gitops")], expected).unwrap();
    assert_eq!(stale.len(), 3);

    let rewritten = update_manifest_hosts(
        &[manifest.clone(), dir.path().join("missing.yaml")],
        &build_hosts(expected),
    )
    .unwrap();
    assert_eq!(rewritten, vec![manifest.clone()]);
    let content = fs::read_to_string(&manifest).unwrap();
    assert!(content.starts_with("# keycloak entrypoint\n"));
    assert!(content.contains("host: kc.203.0.113.8.nip.io"));

    // notes were not in the rewrite list, so rotation still fails on them
    let err = ensure_hosts_rotated(&[dir.path().join("gitops")], expected).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("argocd.192.0.2.4.nip.io"));
    assert!(message.contains(&notes.display().to_string()));
    assert!(message.contains("--manifest-file"));

    update_manifest_hosts(&[notes], &build_hosts(expected)).unwrap();
    ensure_hosts_rotated(&[dir.path().join("gitops")], expected).unwrap();
}

#[test]
fn test_update_ingress_values_keeps_other_keys() {
    let dir = TempDir::new().unwrap();
    let values = write_file(
        dir.path(),
        "values.yaml",
        "controller:\n  replicaCount: 2\n  service:\n    externalTrafficPolicy: Local\n",
    );

    update_ingress_values(ip("20.50.60.70"), "rg-iam-demo", &values).unwrap();

    let doc: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(&values).unwrap()).unwrap();
    let service = &doc["controller"]["service"];
    assert_eq!(doc["controller"]["replicaCount"].as_u64(), Some(2));
    assert_eq!(service["externalTrafficPolicy"].as_str(), Some("Local"));
    assert_eq!(service["loadBalancerIP"].as_str(), Some("20.50.60.70"));
    assert_eq!(
        service["annotations"]["service.beta.kubernetes.io/azure-load-balancer-resource-group"].as_str(),
        Some("rg-iam-demo")
    );
}
