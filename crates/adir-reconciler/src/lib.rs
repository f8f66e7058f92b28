//! adir-reconciler
//!
//! The reconciler supervisor plus its three tasks — indexer, regsync,
//! name-verification — and a readiness HTTP server for the node binary.

pub mod cancel;
pub mod error;
pub mod indexer;
pub mod nameverify;
pub mod readiness;
pub mod regsync;
pub mod supervisor;

pub use cancel::CancellationToken;
pub use error::ReconcileError;
pub use indexer::IndexerTask;
pub use nameverify::{CandidateSource, NameVerifyTask, VerificationCandidate};
pub use regsync::{DefaultCredentials, RegsyncTask, RemoteClient, SyncConfig};
pub use supervisor::{Supervisor, Task, TaskCtx};
