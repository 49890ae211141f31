//! Error types for the drive_mirror crate.

use thiserror::Error;

/// Errors that can occur when mirroring a directory tree into Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Could not find credentials file at '{0}'. Please set GDRIVE_CREDENTIALS_PATH to the correct path.")]
    CredentialsNotFound(String),

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Authorization flow failed: {0}")]
    AuthFlowError(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
