//! Credbridge - account passwords in the OS secret store, behind an async command bridge
//!
//! This library provides the core functionality for Credbridge, organized around
//! trait-based dependency injection for testability.

pub mod commands;
pub mod config;
pub mod error;
pub mod item;
pub mod mocks;
pub mod production;
pub mod store;
pub mod traits;

mod state;

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use commands::{CommandBridge, CommandRequest, CommandResponse};
pub use error::KeychainError;
pub use state::AppState;
pub use store::KeychainStore;

/// Initialize logging to stderr and, if `log_dir` is given, a daily log file.
///
/// stdout is reserved for responses. Keep the returned guard alive for the
/// lifetime of the process or buffered file output is lost.
pub fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "credbridge=info,credbridge_lib=info".into()),
    );
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = rolling::daily(dir, "credbridge.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()?;
            Ok(None)
        }
    }
}
