//! OS secret store backend via the `keyring` crate.
//!
//! One keyring entry per credential key. The portable keyring API has no
//! add/update split and no access-group attribute, so both are emulated:
//! existence checks guard add and update, and an access group prefixes the
//! service name.
//!
//! On Linux the `linux-native` store is the kernel keyutils session keyring.
//! Entries last for the login session only and do not survive a reboot.

use std::sync::Mutex;

use keyring::Entry;

use crate::error::{BackendError, OsStatus};
use crate::traits::{CredentialKey, SecureBackend};

pub struct KeyringBackend {
    // check-then-write sequences must not interleave within this process
    write_lock: Mutex<()>,
}

impl KeyringBackend {
    pub fn new() -> Self {
        Self {
            write_lock: Mutex::new(()),
        }
    }

    fn entry(key: &CredentialKey) -> Result<Entry, BackendError> {
        let service = match &key.access_group {
            Some(group) => format!("{}/{}", group, key.service),
            None => key.service.clone(),
        };
        Entry::new(&service, &key.account).map_err(map_keyring_error)
    }

    fn exists(entry: &Entry) -> Result<bool, BackendError> {
        match entry.get_secret() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(map_keyring_error(e)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, BackendError> {
        self.write_lock
            .lock()
            .map_err(|_| BackendError::Status(OsStatus::ALLOCATE))
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn map_keyring_error(err: keyring::Error) -> BackendError {
    let status = match &err {
        keyring::Error::NoEntry => return BackendError::NotFound,
        keyring::Error::NoStorageAccess(_) => OsStatus::NOT_AVAILABLE,
        keyring::Error::Ambiguous(_) => OsStatus::DUPLICATE_ITEM,
        keyring::Error::TooLong(_, _) | keyring::Error::Invalid(_, _) => OsStatus::PARAM,
        keyring::Error::BadEncoding(_) => OsStatus::DECODE,
        _ => OsStatus::UNIMPLEMENTED,
    };
    tracing::warn!(error = %err, status = status.code(), "Keyring operation failed");
    BackendError::Status(status)
}

impl SecureBackend for KeyringBackend {
    fn query(&self, key: &CredentialKey) -> Result<Vec<u8>, BackendError> {
        let entry = Self::entry(key)?;
        entry.get_secret().map_err(map_keyring_error)
    }

    fn add(&self, key: &CredentialKey, data: &[u8]) -> Result<(), BackendError> {
        let _guard = self.lock()?;
        let entry = Self::entry(key)?;
        if Self::exists(&entry)? {
            return Err(BackendError::Status(OsStatus::DUPLICATE_ITEM));
        }
        entry.set_secret(data).map_err(map_keyring_error)?;
        tracing::debug!(key = %key, "Added keyring entry");
        Ok(())
    }

    fn update_data(&self, key: &CredentialKey, data: &[u8]) -> Result<(), BackendError> {
        let _guard = self.lock()?;
        let entry = Self::entry(key)?;
        if !Self::exists(&entry)? {
            return Err(BackendError::NotFound);
        }
        entry.set_secret(data).map_err(map_keyring_error)?;
        tracing::debug!(key = %key, "Updated keyring entry");
        Ok(())
    }

    fn update_account(&self, key: &CredentialKey, new_account: &str) -> Result<(), BackendError> {
        if key.account == new_account {
            return self.query(key).map(|_| ());
        }

        let _guard = self.lock()?;
        let old_entry = Self::entry(key)?;
        let secret = old_entry.get_secret().map_err(map_keyring_error)?;

        let new_key = key.with_account(new_account);
        let new_entry = Self::entry(&new_key)?;
        if Self::exists(&new_entry)? {
            return Err(BackendError::Status(OsStatus::DUPLICATE_ITEM));
        }
        new_entry.set_secret(&secret).map_err(map_keyring_error)?;

        if let Err(e) = old_entry.delete_credential() {
            // Leave the store as it was rather than holding the secret twice
            if let Err(rollback) = new_entry.delete_credential() {
                tracing::error!(key = %new_key, error = %rollback, "Failed to roll back renamed entry");
            }
            return Err(map_keyring_error(e));
        }

        tracing::debug!(from = %key, to = %new_key, "Moved keyring entry");
        Ok(())
    }

    fn delete(&self, key: &CredentialKey) -> Result<(), BackendError> {
        let _guard = self.lock()?;
        let entry = Self::entry(key)?;
        entry.delete_credential().map_err(map_keyring_error)?;
        tracing::debug!(key = %key, "Deleted keyring entry");
        Ok(())
    }
}
