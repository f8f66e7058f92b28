use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] adir_store::StoreError),

    #[error(transparent)]
    Db(#[from] adir_db::DbError),

    #[error(transparent)]
    Codec(#[from] adir_codec::CodecError),

    #[error("task timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("task cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
