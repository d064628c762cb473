//! Gate Error Types
//!
//! Gate-specific error variants that convert into the unified
//! `kernel::error::AppError` when they reach the console user.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::storage::StorageError;
use thiserror::Error;

/// Gate-specific result type alias
pub type GateResult<T> = Result<T, GateError>;

/// Gate-specific error variants
#[derive(Debug, Error)]
pub enum GateError {
    /// Email failed basic validation before reaching the auth service
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password was empty
    #[error("Password is required")]
    MissingPassword,

    /// Auth service rejected the credentials
    #[error("{0}")]
    InvalidCredentials(String),

    /// Credentials were valid but the account email is not confirmed
    #[error("Please verify your email before login")]
    EmailNotVerified,

    /// Credentials were valid but there is no admin directory record
    #[error("Not authorized as admin")]
    NotAuthorized,

    /// Admin flag is still optimistic and cannot back an irreversible action
    #[error("Administrator status has not been confirmed yet")]
    AdminConfirmationPending,

    /// Admin directory lookup itself failed
    #[error("Admin directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Auth service could not be reached or answered unexpectedly
    #[error("Auth service unavailable: {0}")]
    AuthServiceUnavailable(String),

    /// Auth service refused a sign-up
    #[error("Sign-up rejected: {0}")]
    SignUpRejected(String),

    /// Persisted session could not be used
    #[error("Malformed local session: {0}")]
    MalformedLocalSession(String),

    /// Local storage failed
    #[error("Local storage error: {0}")]
    Storage(#[from] StorageError),

    /// The gate was disposed before or during the operation
    #[error("Session gate has been disposed")]
    Disposed,

    /// Backend settings missing or unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::InvalidEmail(_)
            | GateError::MissingPassword
            | GateError::MalformedLocalSession(_) => ErrorKind::BadRequest,
            GateError::InvalidCredentials(_) => ErrorKind::Unauthorized,
            GateError::EmailNotVerified
            | GateError::NotAuthorized
            | GateError::AdminConfirmationPending => ErrorKind::Forbidden,
            GateError::SignUpRejected(_) => ErrorKind::UnprocessableEntity,
            GateError::DirectoryUnavailable(_) | GateError::AuthServiceUnavailable(_) => {
                ErrorKind::ServiceUnavailable
            }
            GateError::Storage(_)
            | GateError::Disposed
            | GateError::Configuration(_)
            | GateError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Whether this error came out of the admin directory lookup
    pub fn is_directory_failure(&self) -> bool {
        matches!(self, GateError::DirectoryUnavailable(_))
    }

    /// Convert to AppError, attaching what the user can do about it
    pub fn to_app_error(&self) -> AppError {
        let err = AppError::new(self.kind(), self.to_string());
        match self {
            GateError::EmailNotVerified => {
                err.with_action("Open the confirmation link sent to your inbox")
            }
            GateError::NotAuthorized => err.with_action("Please contact your administrator"),
            GateError::DirectoryUnavailable(_) => {
                err.with_action("Please ensure the admin table exists, then try again")
            }
            GateError::AuthServiceUnavailable(_) => err.with_action("Try again in a moment"),
            GateError::AdminConfirmationPending => {
                err.with_action("Wait for the session check to finish")
            }
            _ => err,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            GateError::DirectoryUnavailable(msg) => {
                tracing::error!(message = %msg, "Admin directory lookup failed");
            }
            GateError::AuthServiceUnavailable(msg) => {
                tracing::error!(message = %msg, "Auth service request failed");
            }
            GateError::Storage(e) => {
                tracing::error!(error = %e, "Local storage error");
            }
            GateError::Configuration(msg) => {
                tracing::error!(message = %msg, "Invalid backend configuration");
            }
            GateError::Internal(msg) => {
                tracing::error!(message = %msg, "Gate internal error");
            }
            GateError::InvalidCredentials(_) => {
                tracing::warn!("Invalid login attempt");
            }
            GateError::Disposed => {
                tracing::warn!("Operation on a disposed session gate");
            }
            GateError::NotAuthorized => {
                tracing::warn!("Sign-in by account without admin record");
            }
            GateError::MalformedLocalSession(reason) => {
                tracing::warn!(reason = %reason, "Ignoring malformed local session");
            }
            _ => {
                tracing::debug!(error = %self, "Gate error");
            }
        }
    }
}

impl From<AppError> for GateError {
    fn from(err: AppError) -> Self {
        GateError::Internal(err.to_string())
    }
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        err.to_app_error().with_source(err)
    }
}
