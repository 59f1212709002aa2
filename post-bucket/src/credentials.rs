//! Loads the article API key from the local secrets file.
//!
//! The secrets file is a flat JSON object, e.g. `{"devto_key": "..."}`. When the file is
//! absent or has no usable key, the `DEVTO_API_KEY` environment variable (or `.env`) is
//! consulted. Having neither is fatal for the sync command.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Key looked up in the secrets file.
pub const KEY_NAME: &str = "devto_key";
/// Environment fallback.
pub const ENV_API_KEY: &str = "DEVTO_API_KEY";

/// The API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error(
        "API key missing: {} has no `{KEY_NAME}` entry and {ENV_API_KEY} is not set",
        path.display()
    )]
    Missing { path: PathBuf },

    #[error("secrets file {} is not a JSON object: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_api_key(keys_file: &Path) -> Result<ApiKey, CredentialsError> {
    load_api_key_with(keys_file, |key| std::env::var(key).ok())
}

fn load_api_key_with(
    keys_file: &Path,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Result<ApiKey, CredentialsError> {
    match fs::read_to_string(keys_file) {
        Ok(text) => {
            let keys: HashMap<String, serde_json::Value> =
                serde_json::from_str(&text).map_err(|source| CredentialsError::Malformed {
                    path: keys_file.to_path_buf(),
                    source,
                })?;
            if let Some(key) = keys.get(KEY_NAME).and_then(|v| v.as_str()).and_then(non_empty) {
                info!(keys_file = %keys_file.display(), "API key loaded from secrets file");
                return Ok(ApiKey(key));
            }
            warn!(keys_file = %keys_file.display(), key = KEY_NAME, "Secrets file has no API key entry");
        }
        Err(e) => {
            debug!(keys_file = %keys_file.display(), error = %e, "Secrets file not readable, trying environment");
        }
    }

    match lookup_env(ENV_API_KEY).as_deref().and_then(non_empty) {
        Some(key) => {
            info!(var = ENV_API_KEY, "API key loaded from environment");
            Ok(ApiKey(key))
        }
        None => Err(CredentialsError::Missing {
            path: keys_file.to_path_buf(),
        }),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn reads_key_from_secrets_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, r#"{"devto_key": " abc123 ", "other": 1}"#).unwrap();

        let key = load_api_key_with(&path, no_env).unwrap();
        assert_eq!(key.expose(), "abc123");
    }

    #[test]
    fn falls_back_to_environment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let key = load_api_key_with(&path, |name| {
            (name == ENV_API_KEY).then(|| "from-env".to_owned())
        })
        .unwrap();
        assert_eq!(key.expose(), "from-env");
    }

    #[test]
    fn empty_file_entry_falls_back_to_environment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, r#"{"devto_key": ""}"#).unwrap();

        let key = load_api_key_with(&path, |_| Some("env-key".to_owned())).unwrap();
        assert_eq!(key.expose(), "env-key");
    }

    #[test]
    fn missing_everywhere_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_api_key_with(&dir.path().join("keys.json"), no_env).unwrap_err();
        assert!(matches!(err, CredentialsError::Missing { .. }));
        assert!(err.to_string().contains("devto_key"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, "devto_key = nope").unwrap();

        let err = load_api_key_with(&path, no_env).unwrap_err();
        assert!(matches!(err, CredentialsError::Malformed { .. }));
    }

    #[test]
    fn debug_hides_secret() {
        assert_eq!(format!("{:?}", ApiKey::new("secret")), "ApiKey(***)");
    }
}
