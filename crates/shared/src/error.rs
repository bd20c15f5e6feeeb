//! Application-wide error types.

use thiserror::Error;

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Uploaded file exceeds the configured maximum.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Inline button requested without text or a valid URL.
    #[error("Invalid button configuration: {0}")]
    InvalidButtonConfig(String),

    /// No destination chat in the request or configuration.
    #[error("Missing destination: {0}")]
    MissingDestination(String),

    /// No bot credential in the request or configuration.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Malformed request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The messaging platform rejected the credential.
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    /// The messaging platform failed to accept the transfer.
    #[error("Remote transfer failed: {0}")]
    RemoteTransferFailure(String),

    /// Local disk write or delete failed.
    #[error("Local storage error: {0}")]
    LocalStorage(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::PayloadTooLarge(_) => 413,
            Self::InvalidButtonConfig(_)
            | Self::MissingDestination(_)
            | Self::MissingCredential(_)
            | Self::Validation(_) => 400,
            Self::AuthenticationFailure(_) | Self::RemoteTransferFailure(_) => 502,
            Self::LocalStorage(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::InvalidButtonConfig(_) => "INVALID_BUTTON_CONFIG",
            Self::MissingDestination(_) => "MISSING_DESTINATION",
            Self::MissingCredential(_) => "MISSING_CREDENTIAL",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AuthenticationFailure(_) => "AUTHENTICATION_FAILURE",
            Self::RemoteTransferFailure(_) => "REMOTE_TRANSFER_FAILURE",
            Self::LocalStorage(_) => "LOCAL_STORAGE_FAILURE",
        }
    }

    /// Whether the caller can fix the request and try again.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
