//! Client Error Types
//!
//! [`ClientError`] separates transport failures (the request never produced a
//! usable answer) from protocol answers the issuer gave on purpose. Callers
//! use [`ClientError::is_transport`] to decide whether a retry by the user
//! makes sense or whether the issuer rejected the request outright.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, DNS failure, timeout, or a body that could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The issuer answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A 2xx envelope whose `success` flag was not `true`.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The body was not the JSON envelope we expected.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid API URL: {0}")]
    Url(String),

    #[error("Credential storage error: {0}")]
    Credentials(#[from] std::io::Error),
}

impl ClientError {
    /// True when the failure is connectivity rather than an answer from the issuer.
    pub fn is_transport(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Human-readable message carried by the issuer, if it sent one.
    pub fn issuer_message(&self) -> Option<&str> {
        match self {
            ClientError::Status { message, .. } | ClientError::Rejected(message) => {
                Some(message.as_str())
            }
            _ => None,
        }
    }
}
