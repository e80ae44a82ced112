//! Error types for macaroon construction, encoding and verification.

use thiserror::Error;

/// Failure of a cryptographic primitive.
///
/// Under correct key sizes none of these should occur; they point at a
/// broken RNG, a tampered payload or a misconfigured secret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The operating system RNG failed.
    #[error("RNG error: {0}")]
    Rng(getrandom::Error),

    /// Encryption failed.
    #[error("failed to seal payload")]
    Seal,

    /// Decryption or authentication failed.
    #[error("failed to open sealed payload")]
    Open,

    /// The sealed payload is too short to hold a nonce and a tag.
    #[error("sealed payload of {0} bytes is too short")]
    Malformed(usize),
}

/// Errors raised while building or attenuating a macaroon.
#[derive(Debug, Clone, Error)]
pub enum MacaroonError {
    /// A construction argument was empty or otherwise unusable.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// A predicate could not be encoded into a caveat.
    #[error(transparent)]
    Predicate(#[from] PredicateError),

    /// Sealing the discharge key failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Errors raised when encoding a predicate or decoding a caveat condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// The condition bytes are not valid UTF-8.
    #[error("caveat condition is not valid UTF-8")]
    NotUtf8,

    /// The predicate could not be serialized.
    #[error("failed to encode predicate: {0}")]
    Encode(String),
}

/// Errors raised by the token codec.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The text form is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The binary form could not be encoded.
    #[error("failed to encode macaroon: {0}")]
    Encode(String),

    /// The binary form is not a valid DAG-CBOR macaroon.
    #[error("failed to decode macaroon: {0}")]
    Decode(String),

    /// The encoding version is not one this crate understands.
    #[error("unsupported macaroon version {0}")]
    UnsupportedVersion(u64),

    /// The signature field has the wrong length.
    #[error("expected 32 signature bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// A caveat is neither a valid first-party nor third-party caveat.
    #[error("caveat {index} is malformed: {reason}")]
    InvalidCaveat {
        /// Position of the caveat in the macaroon.
        index: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The decoded value violates a macaroon invariant.
    #[error("invalid macaroon: {0}")]
    InvalidInput(&'static str),
}

/// Reasons a macaroon fails verification.
///
/// Every variant is final for the transaction; none of them is worth
/// retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// A verification argument was empty or otherwise unusable.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The root macaroon's signature does not match its caveat chain.
    #[error("macaroon signature mismatch")]
    SignatureMismatch,

    /// A first-party caveat was rejected by the caveat check.
    #[error("caveat {condition:?} not satisfied: {reason}")]
    CaveatNotSatisfied {
        /// The condition as presented in the caveat.
        condition: String,
        /// Why the check rejected it.
        reason: String,
    },

    /// No discharge macaroon was presented for a third-party caveat.
    #[error("no discharge macaroon for caveat {caveat_id:?}")]
    DischargeNotFound {
        /// The third-party caveat id.
        caveat_id: String,
    },

    /// The only discharge for a caveat had already been used.
    #[error("discharge macaroon for caveat {caveat_id:?} used more than once")]
    DischargeReused {
        /// The third-party caveat id.
        caveat_id: String,
    },

    /// A discharge macaroon's signature does not match its chain bound to
    /// the root signature.
    #[error("discharge macaroon for caveat {caveat_id:?} has an invalid signature")]
    DischargeSignatureMismatch {
        /// The third-party caveat id.
        caveat_id: String,
    },

    /// A presented discharge macaroon does not satisfy any caveat.
    #[error("discharge macaroon {identifier:?} was not used")]
    UnusedDischarge {
        /// Identifier of the unused discharge.
        identifier: String,
    },

    /// A verification id could not be opened.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl VerifyError {
    /// True for failures that indicate tampering or a wrong secret rather
    /// than a missing or unmet condition.
    pub fn is_tamper_evident(&self) -> bool {
        matches!(
            self,
            VerifyError::SignatureMismatch
                | VerifyError::DischargeSignatureMismatch { .. }
                | VerifyError::Crypto(_)
        )
    }
}
