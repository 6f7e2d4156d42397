//! The server-side error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use sotto_types::wire::ErrorReply;
use sotto_types::ErrorCode;

/// An error produced while handling a PKG request.
///
/// Carries the wire error code plus a short operator-facing message. The
/// message for `Internal` faults is logged, never returned to the caller.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct PkgError {
    pub code: ErrorCode,
    pub message: String,
}

impl PkgError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn bad_request(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::BadRequestJSON, err.to_string())
    }

    pub fn bad_commitment(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadCommitment, message)
    }

    /// Wrap an unexpected fault. The detail is logged here; the caller only
    /// ever sees the code.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "internal fault");
        Self::new(ErrorCode::Internal, "internal error")
    }

    fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::BadRequestJSON => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidUsername => StatusCode::BAD_REQUEST,
            ErrorCode::AlreadyRegistered => StatusCode::CONFLICT,
            ErrorCode::NotPreregistered => StatusCode::NOT_FOUND,
            ErrorCode::InvalidToken => StatusCode::FORBIDDEN,
            ErrorCode::RoundNotFound => StatusCode::NOT_FOUND,
            ErrorCode::BadCommitment => StatusCode::BAD_REQUEST,
            ErrorCode::VerificationFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PkgError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorReply {
            code: self.code,
            message: self.message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ErrorCode> for PkgError {
    fn from(code: ErrorCode) -> Self {
        let message = code.to_string();
        Self { code, message }
    }
}

impl From<sled::Error> for PkgError {
    fn from(err: sled::Error) -> Self {
        Self::internal(err)
    }
}

impl From<sled::transaction::TransactionError<PkgError>> for PkgError {
    fn from(err: sled::transaction::TransactionError<PkgError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => Self::internal(e),
        }
    }
}
