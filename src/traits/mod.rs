//! Trait definitions for dependency injection
//!
//! All external collaborators are abstracted behind traits to enable testing.

mod response_sink;
mod secure_backend;

pub use response_sink::ResponseSink;
pub use secure_backend::{CredentialKey, SecureBackend};

#[cfg(test)]
pub use response_sink::MockResponseSink;
#[cfg(test)]
pub use secure_backend::MockSecureBackend;
