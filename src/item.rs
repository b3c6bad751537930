//! Handle addressing one stored password
//!
//! Every call is a fresh round trip to the backend. Nothing is cached.

use serde::Serialize;

use crate::error::{BackendError, KeychainError};
use crate::traits::{CredentialKey, SecureBackend};

/// Account/secret pair as it exists in the backend after a save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    pub account: String,
    pub secret: String,
    pub key: CredentialKey,
}

pub struct PasswordItem<'a> {
    backend: &'a dyn SecureBackend,
    key: CredentialKey,
    idempotent: bool,
}

impl<'a> PasswordItem<'a> {
    pub fn new(backend: &'a dyn SecureBackend, key: CredentialKey, idempotent: bool) -> Self {
        Self {
            backend,
            key,
            idempotent,
        }
    }

    pub fn key(&self) -> &CredentialKey {
        &self.key
    }

    pub fn account(&self) -> &str {
        &self.key.account
    }

    pub fn read_password(&self) -> Result<String, KeychainError> {
        let data = self
            .backend
            .query(&self.key)
            .map_err(|e| KeychainError::from_backend(e, self.account()))?;

        String::from_utf8(data).map_err(|_| KeychainError::UnexpectedData {
            account: self.account().to_string(),
        })
    }

    /// Update the secret if the entry exists, add it otherwise
    pub fn save_password(&self, password: &str) -> Result<Credential, KeychainError> {
        let encoded = password.as_bytes();

        match self.read_password() {
            Ok(_) => {
                tracing::debug!(key = %self.key, "Updating existing password");
                self.backend
                    .update_data(&self.key, encoded)
                    .map_err(|e| self.unhandled(e))?;
            }
            Err(KeychainError::NotFound { .. }) => {
                tracing::debug!(key = %self.key, "Adding new password");
                self.backend
                    .add(&self.key, encoded)
                    .map_err(|e| self.unhandled(e))?;
            }
            Err(e) => return Err(e),
        }

        Ok(Credential {
            account: self.account().to_string(),
            secret: password.to_string(),
            key: self.key.clone(),
        })
    }

    /// Move the entry to `new_account`; the handle follows it
    pub fn rename_account(&mut self, new_account: &str) -> Result<(), KeychainError> {
        match self.backend.update_account(&self.key, new_account) {
            Ok(()) => {}
            Err(BackendError::NotFound) if self.idempotent => {
                tracing::debug!(key = %self.key, "Rename of missing entry treated as success");
            }
            Err(e) => return Err(KeychainError::from_backend(e, self.account())),
        }

        self.key.account = new_account.to_string();
        Ok(())
    }

    pub fn delete_item(&self) -> Result<(), KeychainError> {
        match self.backend.delete(&self.key) {
            Ok(()) => Ok(()),
            Err(BackendError::NotFound) if self.idempotent => {
                tracing::debug!(key = %self.key, "Delete of missing entry treated as success");
                Ok(())
            }
            Err(e) => Err(KeychainError::from_backend(e, self.account())),
        }
    }

    // add/update right after a successful read: NotFound here is a race, not a miss
    fn unhandled(&self, err: BackendError) -> KeychainError {
        match err {
            BackendError::NotFound => KeychainError::Unhandled(crate::error::OsStatus::ITEM_NOT_FOUND),
            BackendError::Status(status) => KeychainError::Unhandled(status),
        }
    }
}
