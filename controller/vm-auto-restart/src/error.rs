//! Error taxonomy for a single handler invocation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Credential acquisition failed: {message}")]
    Credential { message: String },

    #[error("Compute API {operation} returned error status {status}: {body}")]
    RemoteCall {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Compute API {operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("Invalid compute API response for {operation}: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl HandlerError {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Credential { .. } => "credential",
            HandlerError::RemoteCall { .. } => "remote_call",
            HandlerError::Transport { .. } => "transport",
            HandlerError::InvalidResponse { .. } => "invalid_response",
            HandlerError::Config { .. } => "config",
        }
    }
}
