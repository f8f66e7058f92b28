//! adir-resolver
//!
//! Turns a `name[:version][@cid]` reference into a CID: local tag
//! resolution first, the peer layer's name-labeled BFS search second,
//! with the digest-mismatch-is-fatal rule enforced whenever both a name
//! and a CID are pinned in the same reference.

pub mod error;
pub mod resolver;

pub use error::{ResolverError, ResolverResult};
pub use resolver::{NameResolver, ResolveOptions, ResolvedRecord};
