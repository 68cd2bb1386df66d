//! Conversions from library error types into [`AppError`]
//!
//! The domain crates carry their own error enums and map themselves to
//! [`AppError`] explicitly; the impls here are the kernel-level fallbacks
//! for errors that surface outside those enums, plus the HTTP rendering
//! every crate shares.

use super::app_error::AppError;
use super::kind::ErrorKind;

// ============================================================================
// Standard library
// ============================================================================

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::Forbidden,
            std::io::ErrorKind::TimedOut => ErrorKind::RequestTimeout,
            _ => ErrorKind::InternalServerError,
        };
        AppError::new(kind, "I/O failure").with_source(err)
    }
}

impl From<std::fmt::Error> for AppError {
    fn from(err: std::fmt::Error) -> Self {
        AppError::internal("Formatting failure").with_source(err)
    }
}

impl From<std::string::FromUtf8Error> for AppError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        AppError::bad_request("Input is not valid UTF-8").with_source(err)
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(err: std::num::ParseIntError) -> Self {
        AppError::bad_request("Expected an integer").with_source(err)
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(err: std::num::ParseFloatError) -> Self {
        AppError::bad_request("Expected a number").with_source(err)
    }
}

// ============================================================================
// serde_json
// ============================================================================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        // Syntax and shape problems come from the caller; everything else
        // happened while serializing our own data
        if err.is_syntax() || err.is_data() {
            AppError::bad_request(format!("Malformed JSON: {}", err)).with_source(err)
        } else {
            AppError::internal("JSON serialization failure").with_source(err)
        }
    }
}

// ============================================================================
// sqlx (feature-gated)
// ============================================================================

/// Map a PostgreSQL SQLSTATE to the closest HTTP-shaped error
///
/// Constraint violations (class 23) carry caller-visible meaning; the
/// resource and shutdown classes (53, 57) read as temporary outages.
/// <https://www.postgresql.org/docs/current/errcodes-appendix.html>
#[cfg(feature = "sqlx")]
fn from_sqlstate(code: &str) -> AppError {
    match code {
        "23502" => AppError::bad_request("A required field was missing"),
        "23514" => AppError::bad_request("A field failed validation"),
        "23503" => AppError::conflict("A referenced record does not exist"),
        "23505" => AppError::conflict("A record with this value already exists"),
        code if code.starts_with("23") => AppError::conflict("Integrity constraint violation"),
        "42501" => AppError::forbidden("Insufficient database privilege"),
        code if code.starts_with("53") => {
            AppError::service_unavailable("Database resources exhausted")
        }
        code if code.starts_with("57") => AppError::service_unavailable("Database unavailable"),
        _ => AppError::internal("Database error"),
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::not_found("Record not found").with_source(err),
            sqlx::Error::PoolTimedOut => {
                AppError::service_unavailable("Database connection pool exhausted").with_source(err)
            }
            sqlx::Error::Database(db_err) => {
                let app_err = match db_err.code() {
                    Some(code) => from_sqlstate(code.as_ref()),
                    None => AppError::internal("Database error"),
                };
                app_err.with_source(err)
            }
            sqlx::Error::Io(_) => {
                AppError::service_unavailable("Database connection failed").with_source(err)
            }
            _ => AppError::internal("Database error").with_source(err),
        }
    }
}

// ============================================================================
// HTTP rendering (feature-gated)
// ============================================================================

/// Detail string for the wire body
///
/// Client-class errors echo their message; server-class errors reveal
/// nothing beyond the kind, the message stays in the logs.
#[cfg(feature = "axum")]
fn wire_detail(err: &AppError) -> &str {
    if err.is_server_error() {
        err.kind().as_str()
    } else {
        err.message()
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // RFC 7807 problem details
        let body = serde_json::json!({
            "type": format!("https://httpstatuses.io/{}", self.status_code()),
            "title": self.kind().as_str(),
            "status": self.status_code(),
            "detail": wire_detail(&self),
            "action": self.action(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        assert_eq!(AppError::from(err).kind(), ErrorKind::NotFound);

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        assert_eq!(AppError::from(err).kind(), ErrorKind::Forbidden);

        let err = std::io::Error::other("broken pipe");
        assert_eq!(AppError::from(err).kind(), ErrorKind::InternalServerError);
    }

    #[test]
    fn test_parse_errors_are_bad_requests() {
        let err = "abc".parse::<i64>().unwrap_err();
        assert_eq!(AppError::from(err).kind(), ErrorKind::BadRequest);

        let err = "abc".parse::<f64>().unwrap_err();
        assert_eq!(AppError::from(err).kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_json_syntax_error_blames_the_caller() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(AppError::from(err).kind(), ErrorKind::BadRequest);
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_sqlstate_mapping() {
        assert_eq!(from_sqlstate("23505").kind(), ErrorKind::Conflict);
        assert_eq!(from_sqlstate("23502").kind(), ErrorKind::BadRequest);
        assert_eq!(from_sqlstate("53300").kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(from_sqlstate("57P01").kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(from_sqlstate("XX000").kind(), ErrorKind::InternalServerError);
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_wire_detail_scrubs_server_errors() {
        let err = AppError::internal("connection string was invalid");
        assert_eq!(wire_detail(&err), ErrorKind::InternalServerError.as_str());

        let err = AppError::bad_request("Email is required");
        assert_eq!(wire_detail(&err), "Email is required");
    }
}
