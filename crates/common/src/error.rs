//! Error types for the LwM2M console

use thiserror::Error;

/// Result type alias using the console Error
pub type Result<T> = std::result::Result<T, Error>;

/// Console error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Object specification unavailable for {endpoint}: {reason}")]
    ObjectSpecUnavailable { endpoint: String, reason: String },
}

impl From<::hex::FromHexError> for Error {
    fn from(e: ::hex::FromHexError) -> Self {
        Error::InvalidHex(e.to_string())
    }
}
