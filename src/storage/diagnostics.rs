//! Redacted descriptions of credential input.
//!
//! When no credential format matches, the operator needs enough to tell what
//! was pasted (a truncated secret, a JSON blob, a URL without a signature)
//! without the value itself ending up in CI logs.

use sha2::{Digest, Sha256};

/// First 12 hex characters of the SHA-256 of `value`
pub fn fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let hex = format!("{digest:x}");
    hex[..12].to_string()
}

/// First four and last two characters of the whitespace-compacted value
pub fn redacted_preview(value: &str) -> String {
    let compact = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = compact.chars().collect();
    match chars.len() {
        0 => "<empty>".to_string(),
        n if n <= 6 => "*".repeat(n),
        n => {
            let prefix: String = chars[..4].iter().collect();
            let suffix: String = chars[n - 2..].iter().collect();
            format!("{prefix}…{suffix}")
        }
    }
}

fn looks_like_url(value: &str) -> bool {
    let Some((scheme, _)) = value.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// `key=yes|no` flags describing the shape of the input
pub fn heuristic_summary(value: &str) -> String {
    let lower = value.to_lowercase();
    let trimmed = value.trim_start();
    let heuristics = [
        ("has_equals", value.contains('=')),
        ("has_newlines", value.contains('\n')),
        ("has_question", value.contains('?')),
        ("looks_json", trimmed.starts_with('{') || trimmed.starts_with('[')),
        ("looks_url", looks_like_url(value)),
        ("has_accountname", lower.contains("accountname")),
        ("has_sig", lower.contains("sig=")),
    ];
    heuristics
        .iter()
        .map(|(name, hit)| format!("{name}={}", if *hit { "yes" } else { "no" }))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full diagnostic line embedded in `CredentialError::Undetectable`
pub fn describe(value: &str) -> String {
    format!(
        "len={}, fingerprint={}, preview={}, {}",
        value.chars().count(),
        fingerprint(value),
        redacted_preview(value),
        heuristic_summary(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_sha256_prefix() {
        // sha256("abc") = ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad
        assert_eq!(fingerprint("abc"), "ba7816bf8f01");
    }

    #[test]
    fn test_preview_masks_short_values_entirely() {
        assert_eq!(redacted_preview(""), "<empty>");
        assert_eq!(redacted_preview("  \n "), "<empty>");
        assert_eq!(redacted_preview("abcdef"), "******");
    }

    #[test]
    fn test_preview_keeps_edges_only() {
        assert_eq!(redacted_preview("supersecretvalue"), "supe…ue");
        assert_eq!(redacted_preview("ab  cd\n\nefgh"), "ab c…gh");
    }

    #[test]
    fn test_heuristics() {
        let summary = heuristic_summary("https://x.blob.core.windows.net/?foo=bar");
        assert_eq!(
            summary,
            "has_equals=yes, has_newlines=no, has_question=yes, looks_json=no, looks_url=yes, \
             has_accountname=no, has_sig=no"
        );
        assert!(heuristic_summary(" {\"AccountName\": 1}").contains("looks_json=yes"));
        assert!(heuristic_summary("accountname").contains("has_accountname=yes"));
        assert!(heuristic_summary("9http://x").contains("looks_url=no"));
    }
}
