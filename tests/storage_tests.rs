//! # Storage Credential Tests
//!
//! These tests verify:
//! - Every accepted credential form normalizes to a re-parseable connection string
//! - Wrapped JSON credentials unwrap to the same result as the bare value
//! - Secret application renders then applies, and never leaks literal values

mod common;

use iam_demo_ops::storage::{apply_secret, parse_credential, AzureCredential, CredentialError};
use iam_demo_ops::tools::{CommandOutput, Kubectl};

use common::{failed, ScriptedRunner};

const KEY: &str = "Zm9vYmFyYmF6cXV4MTIzNDU2Nzg5MA==";

fn assert_idempotent(credential: &AzureCredential, fallback: &str) {
    let reparsed = parse_credential(&credential.connection_string, fallback).unwrap();
    assert_eq!(&reparsed, credential, "re-parsing {credential:?} changed it");
}

#[test]
fn test_all_forms_are_idempotent() {
    let inputs = [
        format!("AccountName=demo;AccountKey={KEY}"),
        format!("  \"DefaultEndpointsProtocol=https;AccountName=demo;AccountKey={KEY};EndpointSuffix=core.windows.net\"  "),
        "https://demo.blob.core.windows.net/?sv=2022-11-02&ss=b&sig=abc".to_string(),
        "?sv=2022-11-02&ss=b&srt=co&sig=abc".to_string(),
        KEY.to_string(),
        "AccountName: demo\nAccountKey: secretkeyvalue  # rotated monthly\n".to_string(),
        "UseDevelopmentStorage=true".to_string(),
    ];
    for input in inputs {
        let credential = parse_credential(&input, "fallback").unwrap();
        assert!(
            !credential.connection_string.contains('\n'),
            "multi-line connection string for {input}"
        );
        assert_idempotent(&credential, "fallback");
    }
}

#[test]
fn test_sas_url_and_bare_token_share_shape() {
    let from_url = parse_credential("https://demo.blob.core.windows.net/?sv=1&sig=2", "demo").unwrap();
    let from_token = parse_credential("sv=1&sig=2", "demo").unwrap();
    assert_eq!(from_url.sas_token, from_token.sas_token);
    assert_eq!(from_url.storage_account, from_token.storage_account);
    assert!(from_token.connection_string.contains("BlobEndpoint=https://demo.blob.core.windows.net/"));
}

#[test]
fn test_nested_json_is_unwrapped() {
    let inner = format!("AccountName=demo;AccountKey={KEY}");
    let wrapped = serde_json::json!({
        "metadata": { "source": "key-vault" },
        "secret": { "value": inner },
    })
    .to_string();

    let credential = parse_credential(&wrapped, "fallback").unwrap();

    assert_eq!(credential, parse_credential(&inner, "fallback").unwrap());
}

#[test]
fn test_json_string_scalar_is_unwrapped() {
    let wrapped = serde_json::Value::from(KEY).to_string();
    let credential = parse_credential(&wrapped, "acct").unwrap();
    assert_eq!(credential.account_key.as_deref(), Some(KEY));
}

#[test]
fn test_undetectable_input_never_echoes_the_value() {
    let err = parse_credential("not a credential at all", "acct").unwrap_err();
    let CredentialError::Undetectable(details) = &err else {
        panic!("expected undetectable, got {err:?}");
    };
    assert!(details.contains("len=23"));
    assert!(details.contains("fingerprint="));
    assert!(!err.to_string().contains("credential at"));
}

#[test]
fn test_apply_secret_renders_then_applies() {
    let runner = ScriptedRunner::new();
    runner
        .on_ok(&["create", "secret", "generic"], "apiVersion: v1\nkind: Secret\n")
        .on_ok(&["apply"], "secret/cnpg-azure-backup configured\n");
    let kubectl = Kubectl::new(&runner, "kubectl");
    let credential = parse_credential(KEY, "demo").unwrap();

    apply_secret(&kubectl, "iam", "cnpg-azure-backup", &credential).unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    let render = &calls[0];
    assert!(render.is_sensitive());
    assert!(render
        .arguments()
        .starts_with(&["-n", "iam", "create", "secret", "generic", "cnpg-azure-backup"].map(String::from)));
    assert!(render.arguments().contains(&format!("--from-literal=AZURE_STORAGE_KEY={KEY}")));
    assert!(render.arguments().contains(&"--from-literal=AZURE_STORAGE_ACCOUNT=demo".to_string()));
    assert!(!render.arguments().iter().any(|a| a.starts_with("--from-literal=AZURE_STORAGE_SAS_TOKEN")));
    assert!(!render.render().contains(KEY));
    assert!(render.render().contains("--dry-run=client"));

    let apply = &calls[1];
    assert_eq!(apply.arguments(), ["apply", "-f", "-"].map(String::from).as_slice());
    assert_eq!(apply.stdin_data(), Some("apiVersion: v1\nkind: Secret\n"));
    assert!(apply.is_sensitive());
}

#[test]
fn test_apply_secret_failure_is_redacted() {
    let runner = ScriptedRunner::new();
    runner.on(&["create", "secret"], vec![failed("error: failed to create secret")]);
    let kubectl = Kubectl::new(&runner, "kubectl");
    let credential = parse_credential(KEY, "demo").unwrap();

    let err = apply_secret(&kubectl, "iam", "cnpg-azure-backup", &credential).unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("Failed to render cnpg-azure-backup secret"));
    assert!(message.contains("AZURE_STORAGE_KEY=<redacted>"));
    assert!(message.contains("error: failed to create secret"));
    assert!(!message.contains(KEY));
    assert!(!format!("{err:?}").contains(KEY));
}

#[test]
fn test_apply_failure_hides_manifest() {
    let runner = ScriptedRunner::new();
    runner
        .on_ok(&["create", "secret"], &format!("data:\n  AZURE_STORAGE_KEY: {KEY}\n"))
        .on(
            &["apply"],
            vec![CommandOutput {
                code: Some(1),
                stdout: format!("echo {KEY}"),
                stderr: "error: forbidden".to_string(),
            }],
        );
    let kubectl = Kubectl::new(&runner, "kubectl");
    let credential = parse_credential(KEY, "demo").unwrap();

    let err = apply_secret(&kubectl, "iam", "cnpg-azure-backup", &credential).unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("kubectl apply failed for secret iam/cnpg-azure-backup"));
    assert!(message.contains("error: forbidden"));
    assert!(!message.contains(KEY));
}
