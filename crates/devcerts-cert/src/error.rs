//! Certificate authority errors

use thiserror::Error;

/// Errors produced while loading, issuing or exporting a signing identity
#[derive(Debug, Error)]
pub enum CertError {
    /// Malformed or mislabeled PEM input, or an identity field that cannot
    /// be encoded into a certificate (bad IP literal, non-ASCII DNS name).
    #[error("Format error: {0}")]
    Format(String),

    /// Key generation, signing or re-parsing of a freshly signed certificate failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CertError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        CertError::Format(msg.into())
    }

    pub(crate) fn crypto(err: impl std::fmt::Display) -> Self {
        CertError::Crypto(err.to_string())
    }

    /// Whether the error was caused by the caller's input rather than by the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, CertError::Format(_))
    }
}

pub type Result<T> = std::result::Result<T, CertError>;
