//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Wrong password or unknown user
    ///
    /// The message is shared between the two cases so a caller cannot
    /// tell which precondition failed.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account was deactivated by an administrator
    #[error("Your account has been deactivated. Please contact support.")]
    AccountDeactivated,

    /// Email address not yet verified
    ///
    /// Carries the email so the client can offer a resend affordance.
    #[error("Please verify your email address before logging in")]
    EmailUnverified { email: String },

    /// 2FA operation on an account without 2FA
    #[error("Two-factor authentication is not enabled for this account")]
    TwoFactorNotEnabled,

    /// Invalid TOTP or backup code
    #[error("Invalid two-factor authentication code")]
    InvalidTwoFactorCode,

    /// Access token past its expiry
    #[error("Token expired")]
    TokenExpired,

    /// Access token failed verification
    #[error("Invalid access token")]
    InvalidAccessToken,

    /// Refresh token failed verification
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Password-reset token unknown, consumed, or expired
    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    /// Email-verification token unknown, consumed, or expired
    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    /// Duplicate identifier
    #[error("{0}")]
    Conflict(String),

    /// Too many attempts for this route and client
    #[error("Too many attempts. Please try again later.")]
    RateLimited,

    /// Authenticated but not allowed
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::TwoFactorNotEnabled
            | AuthError::InvalidResetToken
            | AuthError::InvalidVerificationToken => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::InvalidTwoFactorCode
            | AuthError::TokenExpired
            | AuthError::InvalidAccessToken
            | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            AuthError::AccountDeactivated
            | AuthError::EmailUnverified { .. }
            | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_)
            | AuthError::TwoFactorNotEnabled
            | AuthError::InvalidResetToken
            | AuthError::InvalidVerificationToken => ErrorKind::BadRequest,
            AuthError::InvalidCredentials
            | AuthError::InvalidTwoFactorCode
            | AuthError::TokenExpired
            | AuthError::InvalidAccessToken
            | AuthError::InvalidRefreshToken => ErrorKind::Unauthorized,
            AuthError::AccountDeactivated
            | AuthError::EmailUnverified { .. }
            | AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::Conflict(_) => ErrorKind::Conflict,
            AuthError::RateLimited => ErrorKind::TooManyRequests,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        AppError::new(self.kind(), self.to_string())
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::InvalidTwoFactorCode => {
                tracing::warn!("Invalid two-factor code submitted");
            }
            AuthError::AccountDeactivated => {
                tracing::warn!("Operation attempted on deactivated account");
            }
            AuthError::RateLimited => {
                tracing::warn!("Rate limit exceeded");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();

        // The unverified-email response carries the address as an RFC 7807
        // extension member so the client can offer a resend link.
        if let AuthError::EmailUnverified { email } = &self {
            let status = self.status_code();
            let body = serde_json::json!({
                "type": format!("https://httpstatuses.io/{}", status.as_u16()),
                "title": status.canonical_reason().unwrap_or("Forbidden"),
                "status": status.as_u16(),
                "detail": self.to_string(),
                "action": "Verify your email address or request a new verification link",
                "email": email,
            });
            return (status, axum::Json(body)).into_response();
        }

        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        match err.kind() {
            ErrorKind::BadRequest | ErrorKind::UnprocessableEntity => {
                AuthError::Validation(err.message().to_string())
            }
            ErrorKind::Conflict => AuthError::Conflict(err.message().to_string()),
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<platform::password::PasswordHashError> for AuthError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthError::Internal(format!("Password hashing failed: {}", err))
    }
}
