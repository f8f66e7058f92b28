//! adir-core
//!
//! Shared types for the Agent Directory node: content identifiers, the
//! Record data model, symbolic references, event and sync-job shapes, and
//! the error taxonomy every other crate in the workspace maps its failures
//! onto.

pub mod cid;
pub mod error;
pub mod event;
pub mod nameverify;
pub mod record;
pub mod reference;
pub mod sync;

pub use cid::Cid;
pub use error::DirError;
pub use event::{Event, EventKind};
pub use nameverify::VerificationStatus;
pub use record::{Domain, Locator, Module, Record, Signature, Skill};
pub use reference::Reference;
pub use sync::SyncStatus;
