//! The wire error taxonomy shared by servers and clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes carried in PKG error replies.
///
/// Clients treat any non-2xx response as one of these; servers never leak
/// detail beyond the code and a short message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ErrorCode {
    /// Missing or mismatched peer certificate.
    #[error("unauthorized")]
    Unauthorized,

    /// Malformed or oversized request body.
    #[error("bad request JSON")]
    BadRequestJSON,

    /// Username failed validation.
    #[error("invalid username")]
    InvalidUsername,

    /// Reregistration with a different login key.
    #[error("already registered")]
    AlreadyRegistered,

    /// Register/extract/status against an unknown user.
    #[error("not preregistered")]
    NotPreregistered,

    /// Registration token rejected by the verifier.
    #[error("invalid token")]
    InvalidToken,

    /// Round state was never committed or has been evicted.
    #[error("round not found")]
    RoundNotFound,

    /// Reveal commitments failed structural or content checks.
    #[error("bad commitment")]
    BadCommitment,

    /// Coordinator-side signature check failed.
    #[error("verification failed")]
    VerificationFailed,

    /// Unexpected server fault; details are logged, not returned.
    #[error("internal error")]
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_as_name() {
        let json = serde_json::to_string(&ErrorCode::RoundNotFound).unwrap();
        assert_eq!(json, "\"RoundNotFound\"");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::RoundNotFound);
    }
}
