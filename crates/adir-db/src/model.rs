use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record row as indexed for search — the subset of [`adir_core::Record`]
/// the database needs for lookups, plus the labels joined in separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub cid: String,
    pub name: String,
    pub version: String,
    pub schema_version: String,
    pub created_at: DateTime<Utc>,
    pub authors: Vec<String>,
    pub description: String,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: String,
    pub remote_url: String,
    pub cid_filter: String,
    pub status: adir_core::SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub id: String,
    pub record_cid: String,
    pub published_at: DateTime<Utc>,
    pub unpublished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameVerificationRow {
    pub cid: String,
    pub name: String,
    pub status: adir_core::VerificationStatus,
    pub checked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
