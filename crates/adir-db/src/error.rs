use adir_core::DirError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("sync job not found: {0}")]
    SyncJobNotFound(String),

    #[error("record already indexed: {0}")]
    DuplicateRecord(String),

    #[error("sync job claim lost to a concurrent reconciler")]
    ClaimLost,

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Other(String),
}

impl From<DbError> for DirError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::RecordNotFound(c) => DirError::UnknownCid(c),
            DbError::SyncJobNotFound(id) => DirError::SyncJobNotFound(id),
            DbError::DuplicateRecord(c) => DirError::DuplicateTag(c),
            DbError::ClaimLost => DirError::SyncClaimLost,
            DbError::Sqlx(e) => DirError::Storage(e.to_string()),
            DbError::Migrate(e) => DirError::Storage(e.to_string()),
            DbError::Other(msg) => DirError::Storage(msg),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
