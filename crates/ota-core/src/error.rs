//! Error types for the OTA core

use thiserror::Error;

/// Errors that can occur in the OTA core
#[derive(Debug, Error)]
pub enum OtaError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to contact release endpoint: {0}")]
    Transport(String),

    #[error("Download of {filename} failed: {reason}")]
    Download { filename: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OtaError {
    /// Whether the error means the requested artifact does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            OtaError::NotFound(_) => true,
            OtaError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
