//! Application state management

use std::sync::Arc;

use crate::commands::CommandBridge;
use crate::config::{BackendKind, HostConfig, KeychainConfig};
use crate::production::{FileBackend, KeyringBackend};
use crate::store::KeychainStore;
use crate::traits::SecureBackend;

/// Application state containing all dependencies
pub struct AppState {
    pub bridge: Arc<CommandBridge>,
}

impl AppState {
    /// Create a new AppState with production implementations
    pub fn new_production(config: &HostConfig) -> Result<Self, Box<dyn std::error::Error>> {
        tracing::info!("Initializing AppState");

        let backend: Arc<dyn SecureBackend> = match &config.backend {
            BackendKind::File(path) => {
                tracing::info!(path = %path.display(), "DEV MODE: file-based secure store (no Keychain prompts)");
                Arc::new(FileBackend::open(path)?)
            }
            BackendKind::Keyring => {
                tracing::info!("Keyring secure store initialized");
                Arc::new(KeyringBackend::new())
            }
        };

        let state = Self::with_backend(backend, config.keychain.clone());
        tracing::info!(
            service = %config.keychain.service_name,
            "AppState initialization complete"
        );
        Ok(state)
    }

    pub fn with_backend(backend: Arc<dyn SecureBackend>, keychain: KeychainConfig) -> Self {
        let store = KeychainStore::new(backend);
        let bridge = Arc::new(CommandBridge::new(store, keychain));
        Self { bridge }
    }

    /// Create a new AppState with test implementations
    #[cfg(test)]
    pub fn new_test() -> (Self, crate::mocks::InMemoryBackend) {
        let backend = crate::mocks::InMemoryBackend::new();
        let state = Self::with_backend(Arc::new(backend.clone()), KeychainConfig::default());
        (state, backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_state_bridge_uses_backend() {
        let (state, backend) = AppState::new_test();

        let response = state.bridge.handle(crate::commands::CommandRequest::new(
            "savePassword",
            vec!["alice".into(), "pw".into()],
            "cb",
        ));

        assert!(response.is_success());
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_production_file_backend() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.json");
        let config = HostConfig {
            backend: BackendKind::File(path.clone()),
            keychain: KeychainConfig::new("Test Service", None),
            log_dir: None,
        };

        let state = AppState::new_production(&config).unwrap();
        let response = state.bridge.handle(crate::commands::CommandRequest::new(
            "savePassword",
            vec!["alice".into(), "pw".into()],
            "cb",
        ));

        assert!(response.is_success());
        assert!(path.exists());
        assert_eq!(state.bridge.configuration().service_name, "Test Service");
    }

    #[test]
    fn test_production_rejects_corrupt_store() {
        let dir = TempDir::new().unwrap();
        let path: PathBuf = dir.path().join("creds.json");
        std::fs::write(&path, "{").unwrap();
        let config = HostConfig {
            backend: BackendKind::File(path),
            keychain: KeychainConfig::default(),
            log_dir: None,
        };

        assert!(AppState::new_production(&config).is_err());
    }
}
