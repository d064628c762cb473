//! Error Kind
//!
//! Classification shared by every console error. The variants follow the
//! HTTP status families because both collaborators of the session gate are
//! reached over HTTP and report failures that way.

use serde::Serialize;

/// Error classification.
///
/// A kind decides two things for the console: which user-facing title an
/// error banner shows, and whether the failure is worth retrying.
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::from_status(503);
/// assert_eq!(kind, ErrorKind::ServiceUnavailable);
/// assert!(kind.is_retryable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// 400 - input rejected before reaching a backend
    BadRequest,
    /// 401 - credentials missing, wrong or expired
    Unauthorized,
    /// 403 - authenticated but not allowed
    Forbidden,
    /// 404 - the backend has no such resource
    NotFound,
    /// 408 - the backend did not answer in time
    RequestTimeout,
    /// 409 - conflicts with current backend state
    Conflict,
    /// 422 - well-formed but semantically unacceptable
    UnprocessableEntity,
    /// 429 - the backend is rate limiting us
    TooManyRequests,
    /// 500 - a bug or an unexpected response
    InternalServerError,
    /// 503 - a collaborator is unreachable
    ServiceUnavailable,
}

impl ErrorKind {
    /// HTTP status code of this kind.
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RequestTimeout => 408,
            ErrorKind::Conflict => 409,
            ErrorKind::UnprocessableEntity => 422,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::InternalServerError => 500,
            ErrorKind::ServiceUnavailable => 503,
        }
    }

    /// Classify a status code returned by a backend.
    ///
    /// Unlisted 4xx codes collapse to `BadRequest`, everything else that is
    /// not a success collapses to `ServiceUnavailable` for 5xx and
    /// `InternalServerError` otherwise.
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::RequestTimeout,
            409 => ErrorKind::Conflict,
            422 => ErrorKind::UnprocessableEntity,
            429 => ErrorKind::TooManyRequests,
            402..=499 => ErrorKind::BadRequest,
            500..=599 => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::InternalServerError,
        }
    }

    /// Title shown above an error message.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::RequestTimeout => "Request Timeout",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::UnprocessableEntity => "Unprocessable Entity",
            ErrorKind::TooManyRequests => "Too Many Requests",
            ErrorKind::InternalServerError => "Internal Error",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// Whether the same request may succeed if sent again later.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RequestTimeout | ErrorKind::TooManyRequests | ErrorKind::ServiceUnavailable
        )
    }

    /// Whether the failure originates on our side or a collaborator's.
    ///
    /// These are logged at error level.
    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
