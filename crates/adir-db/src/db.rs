//! The search database: a thin `sqlx`-backed layer over the schema in
//! `migrations/`. `SqliteSearchDb` is the tested, file-backed default —
//! the schema is written in Postgres-portable SQL precisely so a
//! `PgSearchDb` constructed over `sqlx::PgPool` against the same
//! migrations is a drop-in alternative, per the "no mandated engine"
//! design goal.

use std::path::Path;

use adir_core::{Record, SyncStatus, VerificationStatus};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::model::{IndexedRecord, NameVerificationRow, Publication, SyncJob};

#[async_trait]
pub trait SearchDb: Send + Sync {
    async fn insert_record_tx(&self, cid: &str, record: &Record) -> DbResult<()>;
    async fn delete_record_tx(&self, cid: &str) -> DbResult<()>;
    async fn get_record(&self, cid: &str) -> DbResult<Option<IndexedRecord>>;
    async fn list_all_cids(&self) -> DbResult<Vec<String>>;

    async fn list_by_skill(&self, category: &str, class: &str) -> DbResult<Vec<IndexedRecord>>;
    async fn list_by_domain(&self, category: &str, class: &str) -> DbResult<Vec<IndexedRecord>>;

    async fn is_ready(&self, deadline: std::time::Duration) -> bool;

    async fn create_sync_job(&self, remote_url: &str, cid_filter: &str) -> DbResult<SyncJob>;
    async fn get_sync_job(&self, id: &str) -> DbResult<SyncJob>;
    async fn delete_sync_job(&self, id: &str) -> DbResult<()>;
    /// Atomically move one `pending` job to `in_progress` and claim it for
    /// `claimant`. Returns `None` if no pending job is available; never
    /// returns a job another caller has already claimed.
    async fn claim_pending_sync_job(&self, claimant: &str) -> DbResult<Option<SyncJob>>;
    async fn complete_sync_job(&self, id: &str, claimant: &str) -> DbResult<()>;
    async fn fail_sync_job(&self, id: &str, claimant: &str, error: &str) -> DbResult<()>;

    async fn publish(&self, record_cid: &str) -> DbResult<Publication>;
    async fn unpublish(&self, record_cid: &str) -> DbResult<()>;
    async fn is_published(&self, record_cid: &str) -> DbResult<bool>;

    async fn upsert_name_verification(
        &self,
        cid: &str,
        name: &str,
        status: VerificationStatus,
        checked_at: chrono::DateTime<Utc>,
        expires_at: chrono::DateTime<Utc>,
    ) -> DbResult<()>;
    async fn lookup_name_verification(&self, cid: &str, name: &str) -> DbResult<Option<NameVerificationRow>>;
}

pub struct SqliteSearchDb {
    pool: SqlitePool,
}

impl SqliteSearchDb {
    pub async fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:").foreign_keys(true);
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    fn row_to_indexed_record(row: &sqlx::sqlite::SqliteRow) -> DbResult<IndexedRecord> {
        let authors_json: String = row.try_get("authors")?;
        let authors: Vec<String> =
            serde_json::from_str(&authors_json).map_err(|e| DbError::Other(format!("corrupt authors column: {e}")))?;
        Ok(IndexedRecord {
            cid: row.try_get("cid")?,
            name: row.try_get("name")?,
            version: row.try_get("version")?,
            schema_version: row.try_get("schema_version")?,
            created_at: row.try_get("created_at")?,
            authors,
            description: row.try_get("description")?,
            indexed_at: row.try_get("indexed_at")?,
        })
    }
}

#[async_trait]
impl SearchDb for SqliteSearchDb {
    async fn insert_record_tx(&self, cid: &str, record: &Record) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let authors_json = serde_json::to_string(&record.authors)
            .map_err(|e| DbError::Other(format!("encoding authors: {e}")))?;
        let now = Utc::now();

        let inserted = sqlx::query(
            "INSERT INTO records (cid, name, version, schema_version, created_at, authors, description, indexed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (cid) DO NOTHING",
        )
        .bind(cid)
        .bind(&record.name)
        .bind(&record.version)
        .bind(&record.schema_version)
        .bind(record.created_at)
        .bind(&authors_json)
        .bind(&record.description)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // Already indexed — the idempotent-reindex case. Nothing else to do.
            tx.commit().await?;
            return Ok(());
        }

        for skill in &record.skills {
            sqlx::query("INSERT INTO skills (id, record_cid, category, class) VALUES (?, ?, ?, ?)")
                .bind(Uuid::new_v4().to_string())
                .bind(cid)
                .bind(&skill.category)
                .bind(&skill.class)
                .execute(&mut *tx)
                .await?;
        }
        for domain in &record.domains {
            sqlx::query("INSERT INTO domains (id, record_cid, category, class) VALUES (?, ?, ?, ?)")
                .bind(Uuid::new_v4().to_string())
                .bind(cid)
                .bind(&domain.category)
                .bind(&domain.class)
                .execute(&mut *tx)
                .await?;
        }
        for locator in &record.locators {
            sqlx::query("INSERT INTO locators (id, record_cid, kind, url) VALUES (?, ?, ?, ?)")
                .bind(Uuid::new_v4().to_string())
                .bind(cid)
                .bind(&locator.kind)
                .bind(&locator.url)
                .execute(&mut *tx)
                .await?;
        }
        for module in &record.modules {
            sqlx::query("INSERT INTO modules (id, record_cid, name, version) VALUES (?, ?, ?, ?)")
                .bind(Uuid::new_v4().to_string())
                .bind(cid)
                .bind(&module.name)
                .bind(&module.version)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_record_tx(&self, cid: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM records WHERE cid = ?").bind(cid).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::RecordNotFound(cid.to_string()));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_record(&self, cid: &str) -> DbResult<Option<IndexedRecord>> {
        let row = sqlx::query("SELECT * FROM records WHERE cid = ?").bind(cid).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_indexed_record).transpose()
    }

    async fn list_all_cids(&self) -> DbResult<Vec<String>> {
        let rows = sqlx::query("SELECT cid FROM records").fetch_all(&self.pool).await?;
        rows.iter().map(|r| r.try_get::<String, _>("cid").map_err(DbError::from)).collect()
    }

    async fn list_by_skill(&self, category: &str, class: &str) -> DbResult<Vec<IndexedRecord>> {
        let rows = sqlx::query(
            "SELECT records.* FROM records
             JOIN skills ON skills.record_cid = records.cid
             WHERE skills.category = ? AND skills.class = ?
             ORDER BY records.cid ASC",
        )
        .bind(category)
        .bind(class)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_indexed_record).collect()
    }

    async fn list_by_domain(&self, category: &str, class: &str) -> DbResult<Vec<IndexedRecord>> {
        let rows = sqlx::query(
            "SELECT records.* FROM records
             JOIN domains ON domains.record_cid = records.cid
             WHERE domains.category = ? AND domains.class = ?
             ORDER BY records.cid ASC",
        )
        .bind(category)
        .bind(class)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_indexed_record).collect()
    }

    async fn is_ready(&self, deadline: std::time::Duration) -> bool {
        tokio::time::timeout(deadline, sqlx::query("SELECT 1").fetch_one(&self.pool))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }

    async fn create_sync_job(&self, remote_url: &str, cid_filter: &str) -> DbResult<SyncJob> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO sync_jobs (id, remote_url, cid_filter, status, created_at, updated_at)
             VALUES (?, ?, ?, 'pending', ?, ?)",
        )
        .bind(&id)
        .bind(remote_url)
        .bind(cid_filter)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        self.get_sync_job(&id).await
    }

    async fn get_sync_job(&self, id: &str) -> DbResult<SyncJob> {
        let row = sqlx::query("SELECT * FROM sync_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::SyncJobNotFound(id.to_string()))?;
        row_to_sync_job(&row)
    }

    async fn delete_sync_job(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM sync_jobs WHERE id = ?").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::SyncJobNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn claim_pending_sync_job(&self, claimant: &str) -> DbResult<Option<SyncJob>> {
        let mut tx = self.pool.begin().await?;
        let candidate = sqlx::query("SELECT id FROM sync_jobs WHERE status = 'pending' ORDER BY created_at ASC LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;
        let Some(candidate) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };
        let id: String = candidate.try_get("id")?;
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE sync_jobs SET status = 'in_progress', claimed_by = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(claimant)
        .bind(now)
        .bind(&id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            // Lost the race to another reconciler between the SELECT and
            // the UPDATE — a silent skip, not an error.
            tx.commit().await?;
            return Ok(None);
        }
        tx.commit().await?;
        self.get_sync_job(&id).await.map(Some)
    }

    async fn complete_sync_job(&self, id: &str, claimant: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE sync_jobs SET status = 'completed', updated_at = ?
             WHERE id = ? AND claimed_by = ? AND status = 'in_progress'",
        )
        .bind(now)
        .bind(id)
        .bind(claimant)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::ClaimLost);
        }
        Ok(())
    }

    async fn fail_sync_job(&self, id: &str, claimant: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE sync_jobs SET status = 'failed', updated_at = ?, last_error = ?
             WHERE id = ? AND claimed_by = ? AND status = 'in_progress'",
        )
        .bind(now)
        .bind(error)
        .bind(id)
        .bind(claimant)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::ClaimLost);
        }
        Ok(())
    }

    async fn publish(&self, record_cid: &str) -> DbResult<Publication> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query("INSERT INTO publications (id, record_cid, published_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(record_cid)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(Publication { id, record_cid: record_cid.to_string(), published_at: now, unpublished_at: None })
    }

    async fn unpublish(&self, record_cid: &str) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE publications SET unpublished_at = ?
             WHERE record_cid = ? AND unpublished_at IS NULL",
        )
        .bind(now)
        .bind(record_cid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_published(&self, record_cid: &str) -> DbResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM publications WHERE record_cid = ? AND unpublished_at IS NULL LIMIT 1",
        )
        .bind(record_cid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn upsert_name_verification(
        &self,
        cid: &str,
        name: &str,
        status: VerificationStatus,
        checked_at: chrono::DateTime<Utc>,
        expires_at: chrono::DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO name_verifications (cid, name, status, checked_at, expires_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (cid, name) DO UPDATE SET status = excluded.status,
                 checked_at = excluded.checked_at, expires_at = excluded.expires_at",
        )
        .bind(cid)
        .bind(name)
        .bind(status_str(status))
        .bind(checked_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup_name_verification(&self, cid: &str, name: &str) -> DbResult<Option<NameVerificationRow>> {
        let row = sqlx::query("SELECT * FROM name_verifications WHERE cid = ? AND name = ?")
            .bind(cid)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_name_verification).transpose()
    }
}

fn status_str(status: VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Verified => "verified",
        VerificationStatus::Failed => "failed",
    }
}

fn row_to_sync_job(row: &sqlx::sqlite::SqliteRow) -> DbResult<SyncJob> {
    let status_str: String = row.try_get("status")?;
    let status = SyncStatus::parse(&status_str)
        .ok_or_else(|| DbError::Other(format!("corrupt sync job status: {status_str}")))?;
    Ok(SyncJob {
        id: row.try_get("id")?,
        remote_url: row.try_get("remote_url")?,
        cid_filter: row.try_get("cid_filter")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        claimed_by: row.try_get("claimed_by")?,
        last_error: row.try_get("last_error")?,
    })
}

fn row_to_name_verification(row: &sqlx::sqlite::SqliteRow) -> DbResult<NameVerificationRow> {
    let status_str: String = row.try_get("status")?;
    let status = match status_str.as_str() {
        "verified" => VerificationStatus::Verified,
        "failed" => VerificationStatus::Failed,
        other => return Err(DbError::Other(format!("corrupt verification status: {other}"))),
    };
    Ok(NameVerificationRow {
        cid: row.try_get("cid")?,
        name: row.try_get("name")?,
        status,
        checked_at: row.try_get("checked_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use adir_core::{Domain, Locator, Module, Skill};
    use chrono::Duration;

    fn sample_record() -> Record {
        Record {
            schema_version: "v1".into(),
            name: "example/agent".into(),
            version: "1.0.0".into(),
            created_at: Utc::now(),
            authors: vec!["team@example.com".into()],
            description: String::new(),
            skills: vec![Skill { category: "NLP".into(), class: "Text Completion".into() }],
            domains: vec![Domain { category: "research".into(), class: "academic".into() }],
            locators: vec![],
            modules: vec![],
            signatures: vec![],
            annotations: Default::default(),
        }
    }

    #[tokio::test]
    async fn insert_then_lookup_by_skill_label() {
        let db = SqliteSearchDb::in_memory().await.unwrap();
        db.insert_record_tx("bcid1", &sample_record()).await.unwrap();
        let found = db.list_by_skill("NLP", "Text Completion").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cid, "bcid1");
    }

    #[tokio::test]
    async fn reindexing_the_same_cid_is_idempotent() {
        let db = SqliteSearchDb::in_memory().await.unwrap();
        db.insert_record_tx("bcid1", &sample_record()).await.unwrap();
        db.insert_record_tx("bcid1", &sample_record()).await.unwrap();
        let found = db.list_by_skill("NLP", "Text Completion").await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn delete_unknown_record_errors() {
        let db = SqliteSearchDb::in_memory().await.unwrap();
        assert!(db.delete_record_tx("bnope").await.is_err());
    }

    #[tokio::test]
    async fn two_claimants_racing_a_pending_job_only_one_wins() {
        let db = SqliteSearchDb::in_memory().await.unwrap();
        db.create_sync_job("https://remote.example", "").await.unwrap();
        let a = db.claim_pending_sync_job("reconciler-a").await.unwrap();
        let b = db.claim_pending_sync_job("reconciler-b").await.unwrap();
        assert!(a.is_some());
        assert!(b.is_none());
    }

    #[tokio::test]
    async fn completing_with_the_wrong_claimant_loses_the_claim() {
        let db = SqliteSearchDb::in_memory().await.unwrap();
        let job = db.create_sync_job("https://remote.example", "").await.unwrap();
        db.claim_pending_sync_job("reconciler-a").await.unwrap();
        assert!(db.complete_sync_job(&job.id, "reconciler-b").await.is_err());
    }

    #[tokio::test]
    async fn deleting_a_record_cascades_to_its_child_tables() {
        let db = SqliteSearchDb::in_memory().await.unwrap();
        let mut record = sample_record();
        record.locators.push(Locator { kind: "docker".into(), url: "oci://example/agent".into() });
        record.modules.push(Module { name: "runtime".into(), version: "1.0.0".into() });
        db.insert_record_tx("bcid1", &record).await.unwrap();

        db.delete_record_tx("bcid1").await.unwrap();

        for table in ["skills", "domains", "locators", "modules"] {
            let count: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE record_cid = ?"))
                    .bind("bcid1")
                    .fetch_one(&db.pool)
                    .await
                    .unwrap();
            assert_eq!(count, 0, "{table} rows should cascade-delete with their record");
        }
    }

    #[tokio::test]
    async fn name_verification_round_trips() {
        let db = SqliteSearchDb::in_memory().await.unwrap();
        let now = Utc::now();
        db.upsert_name_verification("bcid1", "example.com/agent", VerificationStatus::Verified, now, now + Duration::hours(1))
            .await
            .unwrap();
        let found = db.lookup_name_verification("bcid1", "example.com/agent").await.unwrap().unwrap();
        assert_eq!(found.status, VerificationStatus::Verified);
    }
}
