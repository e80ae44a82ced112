//! Error types for macaroon services.
//!
//! Every service error converts into a [`ServiceError`], which transport
//! code can turn into a response. Error codes map to HTTP status codes.

use dialog_macaroon::{CodecError, MacaroonError, VerifyError};
use serde::Serialize;

use crate::{AuthenticationError, DischargeError, IssueError, SettingsError, TicketError};

/// Error codes returned by macaroon services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 400 Bad Request
    /// Base64 decoding failed
    InvalidBase64,
    /// DAG-CBOR parsing failed
    InvalidCbor,
    /// Invalid argument (generic)
    InvalidArgument,
    /// Caveat id was not issued for this discharger
    UnknownCaveat,

    // 401 Unauthorized
    /// Credentials were rejected
    AuthenticationFailed,
    /// Signature verification failed
    SignatureInvalid,
    /// A third-party caveat has no discharge
    DischargeMissing,

    // 403 Forbidden
    /// A caveat is not satisfied
    CaveatNotSatisfied,

    // 500 Internal Server Error
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidBase64
            | ErrorCode::InvalidCbor
            | ErrorCode::InvalidArgument
            | ErrorCode::UnknownCaveat => 400,

            ErrorCode::AuthenticationFailed
            | ErrorCode::SignatureInvalid
            | ErrorCode::DischargeMissing => 401,

            ErrorCode::CaveatNotSatisfied => 403,

            ErrorCode::InternalError => 500,
        }
    }
}

/// Service error with code and message.
#[derive(Debug)]
pub struct ServiceError {
    /// The error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl ServiceError {
    /// Create a new service error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }

    /// Invalid argument.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    /// Signature verification failed.
    pub fn signature_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SignatureInvalid, message)
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

impl From<CodecError> for ServiceError {
    fn from(err: CodecError) -> Self {
        let message = err.to_string();
        match err {
            CodecError::Base64(_) => ServiceError::new(ErrorCode::InvalidBase64, message),
            CodecError::Encode(_) => ServiceError::internal(message),
            CodecError::Decode(_)
            | CodecError::UnsupportedVersion(_)
            | CodecError::InvalidSignatureLength(_)
            | CodecError::InvalidCaveat { .. } => ServiceError::new(ErrorCode::InvalidCbor, message),
            CodecError::InvalidInput(_) => ServiceError::invalid_argument(message),
        }
    }
}

impl From<VerifyError> for ServiceError {
    fn from(err: VerifyError) -> Self {
        let message = err.to_string();
        match err {
            VerifyError::InvalidInput(_) => ServiceError::invalid_argument(message),
            VerifyError::SignatureMismatch
            | VerifyError::DischargeSignatureMismatch { .. }
            | VerifyError::Crypto(_) => ServiceError::signature_invalid(message),
            VerifyError::DischargeNotFound { .. }
            | VerifyError::DischargeReused { .. }
            | VerifyError::UnusedDischarge { .. } => {
                ServiceError::new(ErrorCode::DischargeMissing, message)
            }
            VerifyError::CaveatNotSatisfied { .. } => {
                ServiceError::new(ErrorCode::CaveatNotSatisfied, message)
            }
        }
    }
}

impl From<MacaroonError> for ServiceError {
    fn from(err: MacaroonError) -> Self {
        match err {
            MacaroonError::InvalidInput(_) => ServiceError::invalid_argument(err.to_string()),
            MacaroonError::Predicate(_) | MacaroonError::Crypto(_) => {
                ServiceError::internal(err.to_string())
            }
        }
    }
}

impl From<TicketError> for ServiceError {
    fn from(err: TicketError) -> Self {
        ServiceError::internal(err.to_string())
    }
}

impl From<AuthenticationError> for ServiceError {
    fn from(err: AuthenticationError) -> Self {
        match err {
            AuthenticationError::InvalidCredentials => {
                ServiceError::new(ErrorCode::AuthenticationFailed, err.to_string())
            }
            AuthenticationError::Unavailable(_) => ServiceError::internal(err.to_string()),
        }
    }
}

impl From<IssueError> for ServiceError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::InvalidInput(_) => ServiceError::invalid_argument(err.to_string()),
            IssueError::Ticket(err) => err.into(),
            IssueError::Macaroon(err) => err.into(),
            IssueError::Codec(err) => err.into(),
        }
    }
}

impl From<DischargeError> for ServiceError {
    fn from(err: DischargeError) -> Self {
        match err {
            DischargeError::UnknownCaveat => {
                ServiceError::new(ErrorCode::UnknownCaveat, err.to_string())
            }
            DischargeError::Authentication(err) => err.into(),
            DischargeError::Macaroon(err) => err.into(),
            DischargeError::Codec(err) => err.into(),
        }
    }
}

impl From<SettingsError> for ServiceError {
    fn from(err: SettingsError) -> Self {
        ServiceError::internal(err.to_string())
    }
}
