//! Runtime-level errors raised while assembling the core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is out of range or inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host capability was not injected.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// The tracing subscriber could not be installed (usually: already installed).
    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
