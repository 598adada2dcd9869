use thiserror::Error;

use crate::api::ApiError;
use crate::store::StoreError;

/// Errors surfaced by the content repository and sync queue.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Storage fault: {0}")]
    Storage(#[from] StoreError),

    #[error("Payload codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Unknown form type: {0}")]
    UnknownFormType(String),

    #[error("Remote API error: {0}")]
    Api(#[from] ApiError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// True when the underlying store rejected or failed the operation.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, CacheError::Storage(_))
    }
}

#[derive(Error, Debug)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Returned when a string does not name a known enum value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
