//! File-based secure store for development builds
//!
//! Avoids OS keychain prompts during development. The binary changes every
//! compile in dev mode, so macOS prompts for the login password on every
//! keychain access. This keeps entries in a plain JSON file instead.
//!
//! WARNING: Not secure. Secrets are written unencrypted.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, OsStatus};
use crate::traits::{CredentialKey, SecureBackend};

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    key: CredentialKey,
    secret: Vec<u8>,
}

pub struct FileBackend {
    path: PathBuf,
    entries: Mutex<HashMap<CredentialKey, Vec<u8>>>,
}

impl FileBackend {
    /// Load entries from `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let stored: Vec<StoredEntry> = serde_json::from_str(&content)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            stored.into_iter().map(|e| (e.key, e.secret)).collect()
        } else {
            HashMap::new()
        };
        tracing::debug!(path = %path.display(), count = entries.len(), "Loaded dev credential file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<CredentialKey, Vec<u8>>>, BackendError> {
        self.entries
            .lock()
            .map_err(|_| BackendError::Status(OsStatus::ALLOCATE))
    }

    fn flush(&self, entries: &HashMap<CredentialKey, Vec<u8>>) -> Result<(), BackendError> {
        let mut stored: Vec<StoredEntry> = entries
            .iter()
            .map(|(key, secret)| StoredEntry {
                key: key.clone(),
                secret: secret.clone(),
            })
            .collect();
        stored.sort_by(|a, b| {
            (&a.key.service, &a.key.account).cmp(&(&b.key.service, &b.key.account))
        });

        let content = serde_json::to_string_pretty(&stored).map_err(|e| {
            tracing::warn!(error = %e, "Failed to encode dev credential file");
            BackendError::Status(OsStatus::DECODE)
        })?;
        std::fs::write(&self.path, content).map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write dev credential file");
            BackendError::Status(OsStatus::NOT_AVAILABLE)
        })
    }
}

impl SecureBackend for FileBackend {
    fn query(&self, key: &CredentialKey) -> Result<Vec<u8>, BackendError> {
        self.entries()?.get(key).cloned().ok_or(BackendError::NotFound)
    }

    fn add(&self, key: &CredentialKey, data: &[u8]) -> Result<(), BackendError> {
        let mut entries = self.entries()?;
        if entries.contains_key(key) {
            return Err(BackendError::Status(OsStatus::DUPLICATE_ITEM));
        }
        entries.insert(key.clone(), data.to_vec());
        self.flush(&entries)
    }

    fn update_data(&self, key: &CredentialKey, data: &[u8]) -> Result<(), BackendError> {
        let mut entries = self.entries()?;
        let existing = entries.get_mut(key).ok_or(BackendError::NotFound)?;
        *existing = data.to_vec();
        self.flush(&entries)
    }

    fn update_account(&self, key: &CredentialKey, new_account: &str) -> Result<(), BackendError> {
        let mut entries = self.entries()?;
        let target = key.with_account(new_account);
        if target != *key && entries.contains_key(&target) {
            return Err(BackendError::Status(OsStatus::DUPLICATE_ITEM));
        }
        let secret = entries.remove(key).ok_or(BackendError::NotFound)?;
        entries.insert(target, secret);
        self.flush(&entries)
    }

    fn delete(&self, key: &CredentialKey) -> Result<(), BackendError> {
        let mut entries = self.entries()?;
        entries.remove(key).ok_or(BackendError::NotFound)?;
        self.flush(&entries)
    }
}
