use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Internal,
}

/// Error body returned by the fixture server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed response envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Raised while converting one raw item into its typed form. Surfaces to
/// callers wrapped in [`EnvelopeError::Malformed`].
#[derive(Debug, Error)]
#[error("invalid `{item_type}` item: {reason}")]
pub struct InvalidItem {
    pub item_type: String,
    pub reason: String,
}

impl InvalidItem {
    pub fn new(item_type: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            item_type: item_type.into(),
            reason: reason.to_string(),
        }
    }
}
