use thiserror::Error;

use crate::cid::Cid;

/// The eight error kinds named in the reconciliation-plane design: every
/// subsystem (codec, store, database, peer layer, reconciler tasks) maps
/// its failures onto one of these instead of inventing its own taxonomy.
#[derive(Debug, Error)]
pub enum DirError {
    // ── NotFound ─────────────────────────────────────────────────────────────
    #[error("unknown CID: {0}")]
    UnknownCid(String),

    #[error("unknown tag: {0}")]
    UnknownTag(String),

    #[error("sync job not found: {0}")]
    SyncJobNotFound(String),

    // ── Conflict ─────────────────────────────────────────────────────────────
    #[error("tag already exists: {0}")]
    DuplicateTag(String),

    #[error("sync job claim lost to a concurrent reconciler")]
    SyncClaimLost,

    // ── Invalid ──────────────────────────────────────────────────────────────
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("non-canonical input: {0}")]
    NonCanonicalInput(String),

    // ── Unauthorized ─────────────────────────────────────────────────────────
    #[error("missing or expired credentials: {0}")]
    Unauthorized(String),

    // ── Unavailable ──────────────────────────────────────────────────────────
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    // ── Transient ────────────────────────────────────────────────────────────
    #[error("transient failure (retryable): {0}")]
    Transient(String),

    // ── Fatal ────────────────────────────────────────────────────────────────
    /// Reported verbatim to callers per the user-visible-failure contract.
    #[error("digest-mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: Cid, actual: Cid },

    #[error("invariant violation: {0}")]
    Invariant(String),

    // ── Storage / serialization plumbing ─────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used by transport layers (gRPC status mapping,
/// CLI exit codes) that need the kind without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Invalid,
    Unauthorized,
    Unavailable,
    Transient,
    Fatal,
}

impl DirError {
    pub fn kind(&self) -> ErrorKind {
        use DirError::*;
        match self {
            UnknownCid(_) | UnknownTag(_) | SyncJobNotFound(_) => ErrorKind::NotFound,
            DuplicateTag(_) | SyncClaimLost => ErrorKind::Conflict,
            InvalidReference(_) | InvalidRecord(_) | NonCanonicalInput(_) => ErrorKind::Invalid,
            Unauthorized(_) => ErrorKind::Unauthorized,
            Unavailable(_) => ErrorKind::Unavailable,
            Transient(_) => ErrorKind::Transient,
            DigestMismatch { .. } | Invariant(_) => ErrorKind::Fatal,
            Storage(_) | Serialization(_) | Other(_) => ErrorKind::Unavailable,
        }
    }
}

pub type DirResult<T> = Result<T, DirError>;
