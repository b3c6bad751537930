//! Credential store over a secure backend
//!
//! Each call takes the configuration snapshot it should run under, so a
//! concurrent configuration change cannot alter an operation midway.

use std::sync::Arc;

use crate::config::KeychainConfig;
use crate::error::KeychainError;
use crate::item::{Credential, PasswordItem};
use crate::traits::{CredentialKey, SecureBackend};

pub struct KeychainStore {
    backend: Arc<dyn SecureBackend>,
}

impl KeychainStore {
    pub fn new(backend: Arc<dyn SecureBackend>) -> Self {
        Self { backend }
    }

    pub fn save(&self, config: &KeychainConfig, account: &str, secret: &str) -> Result<Credential, KeychainError> {
        let item = self.item(config, account)?;
        let credential = item.save_password(secret)?;
        tracing::info!(key = %credential.key, "Saved password");
        Ok(credential)
    }

    pub fn read(&self, config: &KeychainConfig, account: &str) -> Result<String, KeychainError> {
        self.item(config, account)?.read_password()
    }

    /// Returns the key the entry lives under afterwards
    pub fn rename_account(
        &self,
        config: &KeychainConfig,
        old_account: &str,
        new_account: &str,
    ) -> Result<CredentialKey, KeychainError> {
        require_non_empty("new account name", new_account)?;
        let mut item = self.item(config, old_account)?;
        item.rename_account(new_account)?;
        tracing::info!(from = %old_account, key = %item.key(), "Renamed account");
        Ok(item.key().clone())
    }

    pub fn delete(&self, config: &KeychainConfig, account: &str) -> Result<(), KeychainError> {
        let item = self.item(config, account)?;
        item.delete_item()?;
        tracing::info!(key = %item.key(), "Deleted password");
        Ok(())
    }

    fn item(&self, config: &KeychainConfig, account: &str) -> Result<PasswordItem<'_>, KeychainError> {
        require_non_empty("account name", account)?;
        let key = CredentialKey::new(
            config.service_name.clone(),
            account,
            config.access_group.clone(),
        );
        Ok(PasswordItem::new(self.backend.as_ref(), key, config.idempotent))
    }
}

fn require_non_empty(what: &str, value: &str) -> Result<(), KeychainError> {
    if value.is_empty() {
        return Err(KeychainError::invalid_input(format!("{} must not be empty", what)));
    }
    Ok(())
}
