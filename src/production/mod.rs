//! Production implementations of traits

mod file_backend;
mod keyring_backend;
mod stdout_sink;

pub use file_backend::FileBackend;
pub use keyring_backend::KeyringBackend;
pub use stdout_sink::{JsonLineSink, StdoutSink};
