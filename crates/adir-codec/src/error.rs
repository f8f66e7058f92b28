use thiserror::Error;

use adir_core::error::DirError;

/// Failures local to canonicalization, digesting, and reference parsing.
/// Every crate downstream maps these onto [`DirError`] at its own
/// boundary rather than threading `CodecError` through the rest of the
/// workspace.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("non-canonical input: {0}")]
    NonCanonicalInput(String),

    #[error("invalid CID: {0}")]
    InvalidCid(String),

    #[error("invalid reference {reference:?}: {reason}")]
    BadReference { reference: String, reason: String },
}

impl CodecError {
    pub fn bad_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::BadReference { reference: reference.into(), reason: reason.into() }
    }
}

impl From<CodecError> for DirError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::NonCanonicalInput(msg) => DirError::NonCanonicalInput(msg),
            CodecError::InvalidCid(msg) => DirError::InvalidReference(msg),
            CodecError::BadReference { reference, reason } => {
                DirError::InvalidReference(format!("{reference}: {reason}"))
            }
        }
    }
}
