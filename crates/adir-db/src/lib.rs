//! adir-db
//!
//! The search database: a relational schema (records, skills, domains,
//! locators, modules, sync jobs, publications, name-verification cache)
//! behind the [`SearchDb`] trait, so the reconciler and RPC layers never
//! depend on a concrete driver.

pub mod db;
pub mod error;
pub mod model;

pub use db::{SearchDb, SqliteSearchDb};
pub use error::{DbError, DbResult};
pub use model::{IndexedRecord, NameVerificationRow, Publication, SyncJob};
