//! adir-store
//!
//! The content store: manifest composition over a pluggable [`Backend`],
//! tag resolution, and digest verification. [`fs::FsBackend`] is the
//! tested local-disk default; [`oci::OciBackend`] (behind the `oci`
//! feature) treats a generic OCI 1.1 registry as commodity blob storage.

pub mod backend;
pub mod error;
pub mod fs;
pub mod manifest;
#[cfg(feature = "oci")]
pub mod oci;
pub mod store;

pub use backend::{Backend, TagEntry};
pub use error::{StoreError, StoreResult};
pub use manifest::{Descriptor, Manifest, RecordConfig};
pub use store::{ContentStore, PulledRecord};
