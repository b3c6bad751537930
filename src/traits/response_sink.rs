//! Delivery channel back to the front end

use crate::commands::CommandResponse;

/// Receives bridge responses on the host's main context.
///
/// Production: newline-delimited JSON on stdout
/// Testing: Recorded in memory
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ResponseSink: Send + Sync {
    /// Hand one response to the client waiting on its callback id
    async fn deliver(&self, response: CommandResponse);
}
