//! Test doubles for dependency injection
//!
//! Provides in-memory implementations of all external collaborators for isolated testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::commands::CommandResponse;
use crate::error::{BackendError, OsStatus};
use crate::traits::{CredentialKey, ResponseSink, SecureBackend};

// ============================================================================
// InMemoryBackend
// ============================================================================

/// Backend primitive, for call recording and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    Query,
    Add,
    UpdateData,
    UpdateAccount,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    pub op: BackendOp,
    pub key: CredentialKey,
}

/// In-memory secure store for testing
///
/// Thread-safe storage backed by HashMap. Records every primitive call in
/// order and can fail the next call of a primitive with a raw status.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    entries: Arc<Mutex<HashMap<CredentialKey, Vec<u8>>>>,
    calls: Arc<Mutex<Vec<BackendCall>>>,
    failures: Arc<Mutex<HashMap<BackendOp, OsStatus>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create backend with pre-populated entries
    pub fn with_entries(entries: Vec<(CredentialKey, &[u8])>) -> Self {
        let backend = Self::new();
        {
            let mut map = backend.entries.lock().unwrap();
            for (key, data) in entries {
                map.insert(key, data.to_vec());
            }
        }
        backend
    }

    /// Make the next call of `op` fail with `status`
    pub fn fail_next(&self, op: BackendOp, status: OsStatus) {
        self.failures.lock().unwrap().insert(op, status);
    }

    /// All primitive calls so far (for assertions)
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that changed or tried to change stored data
    pub fn writes(&self) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.op != BackendOp::Query)
            .collect()
    }

    pub fn keys(&self) -> Vec<CredentialKey> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw stored bytes, bypassing call recording
    pub fn raw(&self, key: &CredentialKey) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn record(&self, op: BackendOp, key: &CredentialKey) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(BackendCall {
            op,
            key: key.clone(),
        });
        match self.failures.lock().unwrap().remove(&op) {
            Some(status) => Err(BackendError::Status(status)),
            None => Ok(()),
        }
    }
}

impl SecureBackend for InMemoryBackend {
    fn query(&self, key: &CredentialKey) -> Result<Vec<u8>, BackendError> {
        self.record(BackendOp::Query, key)?;
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    fn add(&self, key: &CredentialKey, data: &[u8]) -> Result<(), BackendError> {
        self.record(BackendOp::Add, key)?;
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            return Err(BackendError::Status(OsStatus::DUPLICATE_ITEM));
        }
        entries.insert(key.clone(), data.to_vec());
        Ok(())
    }

    fn update_data(&self, key: &CredentialKey, data: &[u8]) -> Result<(), BackendError> {
        self.record(BackendOp::UpdateData, key)?;
        match self.entries.lock().unwrap().get_mut(key) {
            Some(existing) => {
                *existing = data.to_vec();
                Ok(())
            }
            None => Err(BackendError::NotFound),
        }
    }

    fn update_account(&self, key: &CredentialKey, new_account: &str) -> Result<(), BackendError> {
        self.record(BackendOp::UpdateAccount, key)?;
        let mut entries = self.entries.lock().unwrap();
        let target = key.with_account(new_account);
        if target != *key && entries.contains_key(&target) {
            return Err(BackendError::Status(OsStatus::DUPLICATE_ITEM));
        }
        let data = entries.remove(key).ok_or(BackendError::NotFound)?;
        entries.insert(target, data);
        Ok(())
    }

    fn delete(&self, key: &CredentialKey) -> Result<(), BackendError> {
        self.record(BackendOp::Delete, key)?;
        self.entries
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or(BackendError::NotFound)
    }
}

// ============================================================================
// RecordingSink
// ============================================================================

/// Response sink that keeps everything it is handed
#[derive(Clone, Default)]
pub struct RecordingSink {
    responses: Arc<Mutex<Vec<CommandResponse>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responses(&self) -> Vec<CommandResponse> {
        self.responses.lock().unwrap().clone()
    }

    /// Responses delivered for one callback id
    pub fn for_callback(&self, callback_id: &str) -> Vec<CommandResponse> {
        self.responses()
            .into_iter()
            .filter(|r| r.callback_id == callback_id)
            .collect()
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn deliver(&self, response: CommandResponse) {
        self.responses.lock().unwrap().push(response);
    }
}
