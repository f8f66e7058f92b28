use adir_core::DirError;

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("no provider found for {0}")]
    NoProvider(String),
    #[error("pull request to peer timed out")]
    Timeout,
    #[error("peer returned an error: {0}")]
    Remote(String),
    #[error("malformed peer message: {0}")]
    Malformed(String),
    #[error(transparent)]
    Store(#[from] adir_store::StoreError),
    #[error(transparent)]
    Codec(#[from] adir_codec::CodecError),
    #[error("network layer unavailable: {0}")]
    NetworkDown(String),
}

impl From<PeerError> for DirError {
    fn from(e: PeerError) -> Self {
        match e {
            PeerError::NoProvider(what) => DirError::UnknownTag(what),
            PeerError::Timeout => DirError::Transient("peer request timed out".into()),
            PeerError::Remote(msg) => DirError::Transient(msg),
            PeerError::Malformed(msg) => DirError::InvalidRecord(msg),
            PeerError::Store(inner) => inner.into(),
            PeerError::Codec(inner) => inner.into(),
            PeerError::NetworkDown(msg) => DirError::Unavailable(msg),
        }
    }
}

pub type PeerResult<T> = Result<T, PeerError>;
