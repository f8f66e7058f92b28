use adir_core::{Cid, DirError};

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("reference has neither a name nor a CID")]
    EmptyReference,
    #[error("unknown name: {0}")]
    UnknownName(String),
    #[error("digest-mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: Cid, actual: Cid },
    #[error(transparent)]
    Store(#[from] adir_store::StoreError),
    #[error(transparent)]
    Codec(#[from] adir_codec::CodecError),
}

impl From<ResolverError> for DirError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::EmptyReference => DirError::InvalidReference("empty reference".into()),
            ResolverError::UnknownName(n) => DirError::UnknownTag(n),
            ResolverError::DigestMismatch { expected, actual } => {
                DirError::DigestMismatch { expected, actual }
            }
            ResolverError::Store(inner) => inner.into(),
            ResolverError::Codec(inner) => inner.into(),
        }
    }
}

pub type ResolverResult<T> = Result<T, ResolverError>;
