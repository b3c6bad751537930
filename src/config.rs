//! Keychain and host configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service name used until the front end configures its own
pub const DEFAULT_SERVICE_NAME: &str = "KeychainPasswordPlugin";

const DEFAULT_DEV_STORE_FILE: &str = "credbridge-dev-credentials.json";

/// Scope every credential operation runs under.
///
/// Immutable once built; the bridge swaps whole snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeychainConfig {
    pub service_name: String,
    #[serde(default)]
    pub access_group: Option<String>,
    /// Treat rename/delete of a missing entry as success
    #[serde(default = "default_idempotent")]
    pub idempotent: bool,
}

fn default_idempotent() -> bool {
    true
}

impl KeychainConfig {
    pub fn new(service_name: impl Into<String>, access_group: Option<String>) -> Self {
        Self {
            service_name: service_name.into(),
            access_group,
            idempotent: true,
        }
    }

    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME, None)
    }
}

#[derive(Debug, Error)]
pub enum HostConfigError {
    #[error("Unknown backend '{0}' (expected 'keyring' or 'file')")]
    UnknownBackend(String),
    #[error("Empty value for {0}")]
    EmptyValue(&'static str),
}

/// Which secret store the host wires in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Keyring,
    File(PathBuf),
}

/// Process settings for the `credbridge` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub backend: BackendKind,
    pub keychain: KeychainConfig,
    pub log_dir: Option<PathBuf>,
}

impl HostConfig {
    /// Read settings from `CREDBRIDGE_*` environment variables
    pub fn from_env() -> Result<Self, HostConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, HostConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_path = lookup("CREDBRIDGE_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEV_STORE_FILE));

        let backend = match lookup("CREDBRIDGE_BACKEND").as_deref() {
            Some("keyring") => BackendKind::Keyring,
            Some("file") => BackendKind::File(store_path),
            Some(other) => return Err(HostConfigError::UnknownBackend(other.to_string())),
            // Dev builds change binary on every compile, which re-triggers OS keychain prompts
            None if cfg!(debug_assertions) => BackendKind::File(store_path),
            None => BackendKind::Keyring,
        };

        let mut keychain = KeychainConfig::default();
        if let Some(service) = lookup("CREDBRIDGE_SERVICE") {
            if service.is_empty() {
                return Err(HostConfigError::EmptyValue("CREDBRIDGE_SERVICE"));
            }
            keychain.service_name = service;
        }

        let log_dir = lookup("CREDBRIDGE_LOG_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            backend,
            keychain,
            log_dir,
        })
    }
}
