use thiserror::Error;

use crate::codec::CodecError;

#[derive(Error, Debug)]
pub enum SkyfuelError {
    #[error("Not in a skyfuel home. Run 'skyfuel init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove {0} to reinitialize.")]
    AlreadyInitialized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Battery not found: {0}")]
    NotFound(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SkyfuelError>;
