//! Provider error types

use thiserror::Error;

/// Errors that can occur while fetching tile imagery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Response body could not be used
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a later request for the same tile could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::HttpError(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::InvalidResponse(_) => false,
        }
    }
}
