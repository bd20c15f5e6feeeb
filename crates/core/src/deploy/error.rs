//! Deploy error types.

use thiserror::Error;
use tgrelay_shared::AppError;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Deploy operation errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// File exceeds the configured maximum.
    #[error("file size {size} bytes exceeds maximum {max} bytes")]
    PayloadTooLarge {
        /// Bytes seen or declared.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Button requested without valid text and URL.
    #[error("invalid button configuration: {0}")]
    InvalidButtonConfig(String),

    /// No destination in the request or configuration.
    #[error("no destination chat in request or configuration")]
    MissingDestination,

    /// No credential in the request or configuration.
    #[error("no bot token in request or configuration")]
    MissingCredential,

    /// Malformed request field.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The platform rejected the credential.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    /// The platform failed to accept the document.
    #[error("remote transfer failed: {0}")]
    RemoteTransferFailure(String),

    /// Local spool or retained copy could not be written or deleted.
    #[error("local storage failed: {0}")]
    LocalStorage(String),
}

impl From<StorageError> for DeployError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileTooLarge { size, max } => Self::PayloadTooLarge { size, max },
            other => Self::LocalStorage(other.to_string()),
        }
    }
}

impl From<RemoteError> for DeployError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unauthorized(detail) => Self::AuthenticationFailure(detail),
            other => Self::RemoteTransferFailure(other.to_string()),
        }
    }
}

impl From<DeployError> for AppError {
    fn from(err: DeployError) -> Self {
        let detail = err.to_string();
        match err {
            DeployError::PayloadTooLarge { .. } => Self::PayloadTooLarge(detail),
            DeployError::InvalidButtonConfig(_) => Self::InvalidButtonConfig(detail),
            DeployError::MissingDestination => Self::MissingDestination(detail),
            DeployError::MissingCredential => Self::MissingCredential(detail),
            DeployError::InvalidRequest(_) => Self::Validation(detail),
            DeployError::AuthenticationFailure(_) => Self::AuthenticationFailure(detail),
            DeployError::RemoteTransferFailure(_) => Self::RemoteTransferFailure(detail),
            DeployError::LocalStorage(_) => Self::LocalStorage(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_deploy_errors() {
        let err: DeployError = StorageError::file_too_large(10, 5).into();
        assert!(matches!(err, DeployError::PayloadTooLarge { size: 10, max: 5 }));

        let err: DeployError = StorageError::operation("disk full").into();
        assert!(matches!(err, DeployError::LocalStorage(msg) if msg.contains("disk full")));
    }

    #[test]
    fn test_remote_errors_map_to_deploy_errors() {
        let err: DeployError = RemoteError::Unauthorized("Unauthorized".into()).into();
        assert!(matches!(err, DeployError::AuthenticationFailure(_)));

        let err: DeployError = RemoteError::RateLimited {
            retry_after: Some(7),
            detail: "Too Many Requests: retry after 7".into(),
        }
        .into();
        assert!(
            matches!(err, DeployError::RemoteTransferFailure(msg) if msg.contains("rate limited"))
        );
    }

    #[test]
    fn test_deploy_errors_map_to_app_errors() {
        let app: AppError = DeployError::PayloadTooLarge { size: 3, max: 2 }.into();
        assert_eq!(app.status_code(), 413);
        assert_eq!(app.error_code(), "PAYLOAD_TOO_LARGE");

        let app: AppError = DeployError::InvalidButtonConfig("x".into()).into();
        assert_eq!(app.error_code(), "INVALID_BUTTON_CONFIG");

        let app: AppError = DeployError::MissingDestination.into();
        assert_eq!(app.status_code(), 400);

        let app: AppError = DeployError::RemoteTransferFailure("x".into()).into();
        assert_eq!(app.status_code(), 502);

        let app: AppError = DeployError::LocalStorage("x".into()).into();
        assert_eq!(app.error_code(), "LOCAL_STORAGE_FAILURE");
    }
}
