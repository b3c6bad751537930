//! Error taxonomy for credential operations
//!
//! Two layers: [`BackendError`] is what a secure store primitive reports,
//! [`KeychainError`] is what the store and bridge surface to callers.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw status code returned by a secure storage primitive.
///
/// Numbering follows the platform keychain's `OSStatus` values so codes
/// coming from a native backend pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OsStatus(pub i32);

impl OsStatus {
    pub const SUCCESS: OsStatus = OsStatus(0);
    pub const UNIMPLEMENTED: OsStatus = OsStatus(-4);
    pub const PARAM: OsStatus = OsStatus(-50);
    pub const ALLOCATE: OsStatus = OsStatus(-108);
    pub const NOT_AVAILABLE: OsStatus = OsStatus(-25291);
    pub const AUTH_FAILED: OsStatus = OsStatus(-25293);
    pub const DUPLICATE_ITEM: OsStatus = OsStatus(-25299);
    pub const ITEM_NOT_FOUND: OsStatus = OsStatus(-25300);
    pub const INTERACTION_NOT_ALLOWED: OsStatus = OsStatus(-25308);
    pub const DECODE: OsStatus = OsStatus(-26275);

    pub fn code(self) -> i32 {
        self.0
    }

    fn known_message(self) -> Option<&'static str> {
        let message = match self {
            Self::SUCCESS => "No error.",
            Self::UNIMPLEMENTED => "Function or operation not implemented.",
            Self::PARAM => "One or more parameters passed to a function were not valid.",
            Self::ALLOCATE => "Failed to allocate memory.",
            Self::NOT_AVAILABLE => "No keychain is available.",
            Self::AUTH_FAILED => "The user name or passphrase you entered is not correct.",
            Self::DUPLICATE_ITEM => "The specified item already exists in the keychain.",
            Self::ITEM_NOT_FOUND => "The specified item could not be found in the keychain.",
            Self::INTERACTION_NOT_ALLOWED => "User interaction is not allowed.",
            Self::DECODE => "Unable to decode the provided data.",
            _ => return None,
        };
        Some(message)
    }

    /// Human readable description of the status
    pub fn message(self) -> String {
        match self.known_message() {
            Some(message) => message.to_string(),
            None => format!("unhandled error, no error message for OSStatus {}", self.0),
        }
    }
}

impl fmt::Display for OsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_message() {
            Some(message) => write!(f, "{} (OSStatus {})", message, self.0),
            None => f.write_str(&self.message()),
        }
    }
}

/// Failure reported by a [`SecureBackend`](crate::traits::SecureBackend) primitive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("item not found")]
    NotFound,
    #[error("{0}")]
    Status(OsStatus),
}

/// Errors surfaced by the credential store and the command bridge.
///
/// `Display` renders `"<Kind>: <detail>"`, which is what the bridge puts in
/// the `error` field of a failure payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeychainError {
    #[error("InvalidInput: {0}")]
    InvalidInput(String),
    #[error("NotFound: no password stored for account '{account}'")]
    NotFound { account: String },
    #[error("UnexpectedData: stored password for account '{account}' is not valid UTF-8")]
    UnexpectedData { account: String },
    #[error("Unhandled: {0}")]
    Unhandled(OsStatus),
    #[error("Unknown: {0}")]
    Unknown(String),
}

impl KeychainError {
    /// Name of the error kind, as used in the `"<Kind>: <detail>"` message
    pub fn kind(&self) -> &'static str {
        match self {
            KeychainError::InvalidInput(_) => "InvalidInput",
            KeychainError::NotFound { .. } => "NotFound",
            KeychainError::UnexpectedData { .. } => "UnexpectedData",
            KeychainError::Unhandled(_) => "Unhandled",
            KeychainError::Unknown(_) => "Unknown",
        }
    }

    pub fn invalid_input(detail: impl Into<String>) -> Self {
        KeychainError::InvalidInput(detail.into())
    }

    /// Classify a backend failure for the given account
    pub fn from_backend(err: BackendError, account: &str) -> Self {
        match err {
            BackendError::NotFound => KeychainError::NotFound {
                account: account.to_string(),
            },
            BackendError::Status(status) => KeychainError::Unhandled(status),
        }
    }
}
