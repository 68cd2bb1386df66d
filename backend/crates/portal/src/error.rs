//! Portal Error Types
//!
//! Portal-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

use crate::domain::value_objects::InvoiceStatus;

/// Portal-specific result type alias
pub type PortalResult<T> = Result<T, PortalError>;

/// Portal-specific error variants
///
/// Not-found covers both a missing row and a row outside the caller's
/// scope, so resource ids cannot be probed by non-owners.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Authenticated but not allowed
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Document missing or outside the caller's scope
    #[error("Document not found")]
    DocumentNotFound,

    /// Message missing or outside the caller's scope
    #[error("Message not found")]
    MessageNotFound,

    /// Invoice missing or outside the caller's scope
    #[error("Invoice not found")]
    InvoiceNotFound,

    /// Referenced portal user does not exist
    #[error("User not found")]
    UserNotFound,

    /// Requested invoice state change is not legal
    #[error("Invoice cannot move from {from} to {to}")]
    IllegalTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    /// Generated invoice number collided with an existing one
    #[error("Invoice number collision")]
    DuplicateInvoiceNumber,

    /// Webhook signature missing or failed verification
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Webhook amount does not match the invoice
    #[error("Payment amount does not match the invoice")]
    AmountMismatch,

    /// Outbound notification could not be handed to the mail provider
    #[error("Failed to dispatch notification email: {0}")]
    MailDispatch(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortalError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::Validation(_) | PortalError::AmountMismatch => StatusCode::BAD_REQUEST,
            PortalError::InvalidSignature => StatusCode::UNAUTHORIZED,
            PortalError::Forbidden => StatusCode::FORBIDDEN,
            PortalError::DocumentNotFound
            | PortalError::MessageNotFound
            | PortalError::InvoiceNotFound
            | PortalError::UserNotFound => StatusCode::NOT_FOUND,
            PortalError::IllegalTransition { .. } | PortalError::DuplicateInvoiceNumber => {
                StatusCode::CONFLICT
            }
            PortalError::MailDispatch(_) => StatusCode::BAD_GATEWAY,
            PortalError::Database(_) | PortalError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::Validation(_) | PortalError::AmountMismatch => ErrorKind::BadRequest,
            PortalError::InvalidSignature => ErrorKind::Unauthorized,
            PortalError::Forbidden => ErrorKind::Forbidden,
            PortalError::DocumentNotFound
            | PortalError::MessageNotFound
            | PortalError::InvoiceNotFound
            | PortalError::UserNotFound => ErrorKind::NotFound,
            PortalError::IllegalTransition { .. } | PortalError::DuplicateInvoiceNumber => {
                ErrorKind::Conflict
            }
            PortalError::MailDispatch(_) => ErrorKind::BadGateway,
            PortalError::Database(_) | PortalError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        AppError::new(self.kind(), self.to_string())
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            PortalError::Database(e) => {
                tracing::error!(error = %e, "Portal database error");
            }
            PortalError::Internal(msg) => {
                tracing::error!(message = %msg, "Portal internal error");
            }
            PortalError::MailDispatch(msg) => {
                tracing::error!(message = %msg, "Invoice notification dispatch failed");
            }
            PortalError::InvalidSignature => {
                tracing::warn!("Webhook rejected: bad signature");
            }
            PortalError::AmountMismatch => {
                tracing::warn!("Webhook rejected: amount mismatch");
            }
            _ => {
                tracing::debug!(error = %self, "Portal error");
            }
        }
    }
}

impl From<PortalError> for AppError {
    fn from(err: PortalError) -> Self {
        AppError::new(err.kind(), err.to_string())
    }
}

impl From<platform::mail::MailError> for PortalError {
    fn from(err: platform::mail::MailError) -> Self {
        PortalError::MailDispatch(err.to_string())
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}
