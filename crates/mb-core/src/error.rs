//! Error types for mb-core

use thiserror::Error;

/// Main error type for mb-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for mb-core
pub type Result<T> = std::result::Result<T, Error>;
