//! use caforge::error::CaError;

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CaError>;

/// Represents errors that can occur while creating, loading or using the CA.
///
/// Every variant carries enough context to tell the operator which operation
/// failed and why.
#[derive(Debug, Error, Clone)]
pub enum CaError {
    /// The RSA key pair could not be generated.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// A required reference was missing while assembling certificate extensions.
    #[error("Failed to build extensions: {0}")]
    ExtensionBuildError(String),

    /// The certificate could not be signed, or the signing key does not belong
    /// to the declared issuer.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// A persisted CA artifact is missing, unreadable or malformed.
    #[error("Failed to load CA from {path}: {message}")]
    CaLoadError { path: PathBuf, message: String },

    /// An artifact could not be written to durable storage.
    #[error("Failed to write {path}: {message}")]
    StorageWriteError { path: PathBuf, message: String },

    /// Operator-supplied input was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The CA certificate has expired and issuance is not allowed.
    #[error("CA certificate has expired ({days_remaining} days remaining)")]
    CaExpired { days_remaining: i64 },

    /// No unused serial number could be drawn.
    #[error("No unused serial number found after {attempts} draws")]
    SerialExhausted { attempts: usize },

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),
}

impl CaError {
    pub(crate) fn load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        CaError::CaLoadError {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        CaError::StorageWriteError {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<der::Error> for CaError {
    /// Converts a `der::Error` into a `CaError`.
    fn from(err: der::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CaError {
    fn from(err: rsa::Error) -> Self {
        CaError::KeyGenerationError(err.to_string())
    }
}

impl From<pkcs8::Error> for CaError {
    fn from(err: pkcs8::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<x509_cert::spki::Error> for CaError {
    fn from(err: x509_cert::spki::Error) -> Self {
        CaError::EncodingError(err.to_string())
    }
}
