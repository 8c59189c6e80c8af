//! # Azure Storage Credential Detection
//!
//! Operators paste storage credentials in whatever shape the portal, the CLI
//! or a teammate handed them over: a connection string, a SAS token, a SAS
//! URL, a bare account key, a YAML-ish `key: value` block, or any of those
//! wrapped in JSON. [`parse_credential`] turns all of them into one
//! canonical connection string.
//!
//! Detection order matters for ambiguous input and is fixed:
//!
//! 1. `UseDevelopmentStorage=true`
//! 2. delimited `key=value` connection string
//! 3. URL with a SAS query (`sig=` and `sv=`)
//! 4. bare SAS token
//! 5. base64 account key
//! 6. multi-line `key: value` text, re-parsed as a connection string
//! 7. JSON, every nested string tried in turn
//!
//! JSON objects and arrays are recognized right after step 1, so a wrapped
//! connection string is never mistaken for a delimited one. Anything else
//! is rejected with a redacted description of the input.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::diagnostics;
use crate::constants::AZURE_ENDPOINT_SUFFIX;

/// Connection string keys carried into the canonical form
const KNOWN_KEYS: [&str; 9] = [
    "accountname",
    "accountkey",
    "sharedaccesssignature",
    "defaultendpointsprotocol",
    "blobendpoint",
    "queueendpoint",
    "tableendpoint",
    "fileendpoint",
    "endpointsuffix",
];

const DEV_STORAGE_PREFIX: &str = "usedevelopmentstorage=true";

/// Normalized Azure Storage credential
///
/// `connection_string` is always a `;`-separated `key=value` list, and parsing
/// it again yields an equal credential.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AzureCredential {
    pub storage_account: String,
    pub connection_string: String,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
}

impl fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredential")
            .field("storage_account", &self.storage_account)
            .field("connection_string", &"<redacted>")
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AzureCredential {
    /// Which form of secret the credential carries, for logs
    pub fn kind(&self) -> &'static str {
        match (&self.account_key, &self.sas_token) {
            (Some(_), Some(_)) => "account key + SAS token",
            (Some(_), None) => "account key",
            (None, Some(_)) => "SAS token",
            (None, None) => "connection string",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Credential must not be empty")]
    Empty,

    #[error(
        "Unable to detect credential type. Provide an account key, SAS token, or connection \
         string. ({0})"
    )]
    Undetectable(String),
}

/// Detect the credential format of `raw` and normalize it
///
/// `fallback_account` is used whenever the input does not name the storage
/// account itself.
pub fn parse_credential(raw: &str, fallback_account: &str) -> Result<AzureCredential, CredentialError> {
    let value = strip_matching_quotes(raw.trim());
    if value.is_empty() {
        return Err(CredentialError::Empty);
    }

    let normalized = value.replace("\r\n", "\n").replace('\r', "\n");

    if normalized.to_lowercase().starts_with(DEV_STORAGE_PREFIX) {
        debug!("Detected development storage connection string");
        return Ok(development_storage(&normalized, fallback_account));
    }

    // A JSON object or array is never itself a connection string, even when
    // the wrapped value contains `=` and `;`.
    if let Some(document) = json_container(value) {
        return from_json(&document, value, fallback_account)
            .ok_or_else(|| CredentialError::Undetectable(diagnostics::describe(&normalized)));
    }

    if normalized.contains('=')
        && (normalized.contains(';') || normalized.contains('\n') || has_known_key(&normalized))
    {
        debug!("Detected delimited connection string");
        return Ok(connection_string(&normalized, fallback_account));
    }

    if let Some(credential) = sas_url(value, fallback_account) {
        debug!("Detected SAS URL");
        return Ok(credential);
    }

    let token = value.trim_start_matches('?');
    let token_lower = token.to_lowercase();
    if token_lower.contains("sig=") && token_lower.contains("sv=") {
        debug!("Detected bare SAS token");
        let account = fallback_account;
        return Ok(AzureCredential {
            storage_account: account.to_string(),
            connection_string: format!(
                "DefaultEndpointsProtocol=https;{}BlobEndpoint={};SharedAccessSignature={token}",
                account_segment(account),
                synthesized_blob_endpoint(account)
            ),
            account_key: None,
            sas_token: Some(token.to_string()),
        });
    }

    if is_base64_key(normalized.trim()) {
        debug!("Detected bare account key");
        let account = fallback_account;
        return Ok(AzureCredential {
            storage_account: account.to_string(),
            connection_string: format!(
                "DefaultEndpointsProtocol=https;{}AccountKey={value};EndpointSuffix={AZURE_ENDPOINT_SUFFIX}",
                account_segment(account)
            ),
            account_key: Some(value.to_string()),
            sas_token: None,
        });
    }

    let stripped = normalized.trim_start();
    if normalized.contains('\n') && !stripped.starts_with('{') && !stripped.starts_with('[') {
        if let Some(joined) = colon_block_to_connection_string(&normalized) {
            match parse_credential(&joined, fallback_account) {
                Ok(credential) => {
                    debug!("Detected multi-line key: value credential");
                    return Ok(credential);
                }
                Err(e) => debug!("Multi-line credential did not parse: {}", e),
            }
        }
    }

    if let Ok(decoded) = serde_json::from_str::<Value>(value) {
        if let Some(credential) = from_json(&decoded, value, fallback_account) {
            return Ok(credential);
        }
    }

    Err(CredentialError::Undetectable(diagnostics::describe(&normalized)))
}

fn json_container(value: &str) -> Option<Value> {
    let trimmed = value.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<Value>(value).ok()
}

/// First nested string of `document` that parses as a credential
fn from_json(document: &Value, original: &str, fallback_account: &str) -> Option<AzureCredential> {
    let mut seen = HashSet::new();
    for candidate in json_string_candidates(document) {
        if candidate == original || !seen.insert(candidate) {
            continue;
        }
        if let Ok(credential) = parse_credential(candidate, fallback_account) {
            debug!("Detected JSON-wrapped credential");
            return Some(credential);
        }
    }
    None
}

fn strip_matching_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.starts_with(quote) && value.ends_with(quote) {
            if value.len() < 2 {
                return "";
            }
            return value[1..value.len() - 1].trim();
        }
    }
    value
}

fn split_segments(value: &str) -> impl Iterator<Item = &str> {
    value.split([';', '\n']).filter(|s| !s.is_empty())
}

fn development_storage(normalized: &str, fallback_account: &str) -> AzureCredential {
    let connection_string = split_segments(normalized)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(";");
    AzureCredential {
        storage_account: fallback_account.to_string(),
        connection_string,
        account_key: None,
        sas_token: None,
    }
}

/// A recognized key immediately followed by `=`, starting on a word boundary
fn has_known_key(value: &str) -> bool {
    let lower = value.to_lowercase();
    KNOWN_KEYS.iter().any(|key| {
        let needle = format!("{key}=");
        lower.match_indices(&needle).any(|(idx, _)| {
            !matches!(lower[..idx].chars().next_back(), Some(c) if c.is_alphanumeric() || c == '_')
        })
    })
}

/// `key` `:`|`=` `value`, split at the first separator
fn split_pair(segment: &str) -> Option<(&str, &str)> {
    let idx = segment.find([':', '='])?;
    let key = segment[..idx].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, segment[idx + 1..].trim()))
}

fn connection_string(normalized: &str, fallback_account: &str) -> AzureCredential {
    // lowercased key -> (original key, value); last occurrence wins
    let mut parts: HashMap<String, (&str, &str)> = HashMap::new();
    for segment in split_segments(normalized) {
        if let Some((key, value)) = split_pair(segment) {
            parts.insert(key.to_lowercase(), (key, value));
        }
    }

    let mut unknown: Vec<&str> = parts
        .iter()
        .filter(|(lower, _)| !KNOWN_KEYS.contains(&lower.as_str()))
        .map(|(_, (key, _))| *key)
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        warn!(
            "Ignoring unrecognized connection string keys: {}",
            unknown.join(", ")
        );
    }

    let non_empty = |key: &str| parts.get(key).map(|(_, v)| *v).filter(|v| !v.is_empty());
    let original = |key: &str| parts.get(key).copied();

    let account = non_empty("accountname").unwrap_or(fallback_account);
    let account_key = non_empty("accountkey");
    let sas = non_empty("sharedaccesssignature");
    let blob_endpoint = original("blobendpoint");

    let mut connection = Vec::new();
    match original("defaultendpointsprotocol") {
        Some((key, proto)) => connection.push(format!("{key}={proto}")),
        None => connection.push("DefaultEndpointsProtocol=https".to_string()),
    }
    if !account.is_empty() {
        connection.push(format!("AccountName={account}"));
    }
    if let Some((key, endpoint)) = blob_endpoint {
        connection.push(format!("{key}={endpoint}"));
    }
    if let Some(key) = account_key {
        connection.push(format!("AccountKey={key}"));
    }
    if let Some(token) = sas {
        connection.push(format!("SharedAccessSignature={token}"));
    }
    match original("endpointsuffix") {
        Some((key, suffix)) => connection.push(format!("{key}={suffix}")),
        None if blob_endpoint.is_none() => {
            connection.push(format!("EndpointSuffix={AZURE_ENDPOINT_SUFFIX}"));
        }
        None => {}
    }
    for endpoint in ["queueendpoint", "tableendpoint", "fileendpoint"] {
        if let Some((key, value)) = original(endpoint) {
            connection.push(format!("{key}={value}"));
        }
    }

    AzureCredential {
        storage_account: account.to_string(),
        connection_string: connection.join(";"),
        account_key: account_key.map(str::to_string),
        sas_token: sas.map(str::to_string),
    }
}

fn sas_url(value: &str, fallback_account: &str) -> Option<AzureCredential> {
    let url = Url::parse(value).ok()?;
    // the parsed query is re-encoded; keep the bytes the operator supplied
    let token = raw_query(value)?;
    let query_lower = token.to_lowercase();
    if !(query_lower.contains("sig=") && query_lower.contains("sv=")) {
        return None;
    }

    let host = url.host_str().filter(|h| !h.is_empty());
    let account = host
        .and_then(blob_account_from_host)
        .unwrap_or(fallback_account)
        .to_string();
    let blob_endpoint = match host {
        Some(host) => format!("{}://{host}/", url.scheme()),
        None => synthesized_blob_endpoint(&account),
    };

    Some(AzureCredential {
        connection_string: format!(
            "DefaultEndpointsProtocol=https;{}BlobEndpoint={blob_endpoint};SharedAccessSignature={token}",
            account_segment(&account)
        ),
        storage_account: account,
        account_key: None,
        sas_token: Some(token.to_string()),
    })
}

fn raw_query(value: &str) -> Option<&str> {
    let (_, rest) = value.split_once('?')?;
    let query = rest.split_once('#').map_or(rest, |(query, _)| query);
    (!query.is_empty()).then_some(query)
}

/// `<name>` from `<name>.blob.core.windows.net`
fn blob_account_from_host(host: &str) -> Option<&str> {
    host.strip_suffix(".blob.core.windows.net")
        .filter(|name| !name.is_empty() && !name.contains('.'))
}

fn synthesized_blob_endpoint(account: &str) -> String {
    format!("https://{account}.blob.{AZURE_ENDPOINT_SUFFIX}/")
}

fn account_segment(account: &str) -> String {
    if account.is_empty() {
        String::new()
    } else {
        format!("AccountName={account};")
    }
}

/// Base64 alphabet (standard or URL-safe), at least 15 characters, `=` only as padding
fn is_base64_key(value: &str) -> bool {
    value.chars().count() >= 15
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '_' | '-'))
        && !value.trim_end_matches('=').contains('=')
}

/// `key: value` lines joined as `key=value;...`, comments and quotes stripped
fn colon_block_to_connection_string(normalized: &str) -> Option<String> {
    let segments: Vec<String> = normalized
        .lines()
        .map(str::trim)
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .split('#')
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches('"')
                .trim_matches('\'');
            format!("{}={value}", key.trim())
        })
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join(";"))
    }
}

/// Non-empty strings of a JSON document, depth-first, last sibling first
fn json_string_candidates(root: &Value) -> Vec<&str> {
    let mut stack = vec![root];
    let mut strings = Vec::new();
    while let Some(current) = stack.pop() {
        match current {
            Value::String(s) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    strings.push(trimmed);
                }
            }
            Value::Object(map) => stack.extend(map.values()),
            Value::Array(items) => stack.extend(items.iter()),
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
    strings
}
