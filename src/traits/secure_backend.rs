//! Secure storage backend trait

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Identity of one stored secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialKey {
    pub service: String,
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_group: Option<String>,
}

impl CredentialKey {
    pub fn new(service: impl Into<String>, account: impl Into<String>, access_group: Option<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
            access_group,
        }
    }

    /// Same service and access group, different account
    pub fn with_account(&self, account: impl Into<String>) -> Self {
        Self {
            service: self.service.clone(),
            account: account.into(),
            access_group: self.access_group.clone(),
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.access_group {
            Some(group) => write!(f, "{}/{}:{}", group, self.service, self.account),
            None => write!(f, "{}:{}", self.service, self.account),
        }
    }
}

/// Primitive operations of a platform secret store.
///
/// Calls block until the platform answers. Implementations serialize access
/// to the same key themselves.
///
/// Production: OS secret store via `keyring`, or a JSON file in dev builds
/// Testing: In-memory HashMap
#[cfg_attr(test, mockall::automock)]
pub trait SecureBackend: Send + Sync {
    /// Fetch the secret stored under exactly this key
    fn query(&self, key: &CredentialKey) -> Result<Vec<u8>, BackendError>;

    /// Create a new entry. Fails with `DUPLICATE_ITEM` if the key exists.
    fn add(&self, key: &CredentialKey, data: &[u8]) -> Result<(), BackendError>;

    /// Replace the secret of an existing entry
    fn update_data(&self, key: &CredentialKey, data: &[u8]) -> Result<(), BackendError>;

    /// Change the account attribute of an existing entry
    fn update_account(&self, key: &CredentialKey, new_account: &str) -> Result<(), BackendError>;

    /// Remove an entry
    fn delete(&self, key: &CredentialKey) -> Result<(), BackendError>;
}
