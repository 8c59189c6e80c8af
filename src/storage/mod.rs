//! # Storage
//!
//! Azure Storage credentials for cloudnative-pg backups: format detection,
//! redacted diagnostics and secret materialization.

pub mod credential;
pub mod diagnostics;
pub mod secret;

pub use credential::{parse_credential, AzureCredential, CredentialError};
pub use secret::apply_secret;
