use adir_core::{Cid, DirError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown CID: {0}")]
    UnknownCid(String),

    #[error("unknown tag: {0}")]
    UnknownTag(String),

    #[error("tag already exists: {0}")]
    DuplicateTag(String),

    #[error("digest-mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: Cid, actual: Cid },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Codec(#[from] adir_codec::CodecError),

    #[error("{0}")]
    Other(String),
}

impl From<StoreError> for DirError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownCid(c) => DirError::UnknownCid(c),
            StoreError::UnknownTag(t) => DirError::UnknownTag(t),
            StoreError::DuplicateTag(t) => DirError::DuplicateTag(t),
            StoreError::DigestMismatch { expected, actual } => {
                DirError::DigestMismatch { expected, actual }
            }
            StoreError::Unavailable(msg) => DirError::Unavailable(msg),
            StoreError::Codec(e) => e.into(),
            StoreError::Other(msg) => DirError::Storage(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
