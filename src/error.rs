use crate::ByteString;
use std::{num, str, string};
use thiserror::Error;

/// Everything that can go wrong while minting, serializing or verifying a
/// macaroon. All fallible operations in this crate return
/// [`Result`](crate::Result) with this error type; nothing is retried and a
/// signer never mutates its macaroon on failure.
#[derive(Debug, Error)]
pub enum MacaroonError {
    /// Malformed input at an API boundary (wrong version, non-UTF-8 id in a
    /// V1 macaroon, key of the wrong size).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A signer was driven outside its legal protocol: signing a different
    /// macaroon than the one it was derived from, continuing a chain whose
    /// signature was erased or replaced, or signing data before any tag
    /// exists.
    #[error("signer state error: {0}")]
    SignerState(&'static str),

    /// The recomputed signature differs from the one the macaroon carries.
    #[error("signature verification failed")]
    SignatureMismatch,

    /// A verification id could not be unsealed with the supplied key.
    #[error("cannot decrypt verification id")]
    DecryptFailure,

    /// A verification id is too short to even hold a nonce and a tag.
    #[error("ciphertext too short")]
    ShortCiphertext,

    /// The injected random source failed to produce nonce bytes.
    #[error("random source failure: {0}")]
    RandomFailure(String),

    /// Truncated frame, unknown mandatory tag, bad base64/hex, wrong
    /// version byte, or any other wire-format violation.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// The verifier found no caveat matching a required operation.
    #[error("operation not authorized by any caveat: {0:?}")]
    OperationNotInCaveats(ByteString),

    /// The caller's callback rejected a caveat no required operation
    /// matched.
    #[error("caveat not satisfied: {0:?}")]
    CaveatNotSatisfied(ByteString),

    /// The caller's discharge resolver returned an error for a third-party
    /// caveat.
    #[error("cannot fetch discharge macaroon: {0}")]
    DischargeLookupFailed(String),
}

impl From<serde_json::Error> for MacaroonError {
    fn from(error: serde_json::Error) -> MacaroonError {
        MacaroonError::DeserializationError(format!("{}", error))
    }
}

impl From<string::FromUtf8Error> for MacaroonError {
    fn from(error: string::FromUtf8Error) -> MacaroonError {
        MacaroonError::DeserializationError(format!("{}", error))
    }
}

impl From<str::Utf8Error> for MacaroonError {
    fn from(error: str::Utf8Error) -> MacaroonError {
        MacaroonError::DeserializationError(format!("{}", error))
    }
}

impl From<num::ParseIntError> for MacaroonError {
    fn from(error: num::ParseIntError) -> MacaroonError {
        MacaroonError::DeserializationError(format!("{}", error))
    }
}

impl From<base64::DecodeError> for MacaroonError {
    fn from(error: base64::DecodeError) -> MacaroonError {
        MacaroonError::DeserializationError(format!("{}", error))
    }
}

impl From<hex::FromHexError> for MacaroonError {
    fn from(error: hex::FromHexError) -> MacaroonError {
        MacaroonError::DeserializationError(format!("{}", error))
    }
}

impl From<rand::Error> for MacaroonError {
    fn from(error: rand::Error) -> MacaroonError {
        MacaroonError::RandomFailure(format!("{}", error))
    }
}
