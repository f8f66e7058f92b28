//! adir-rpc
//!
//! The gRPC face of a directory node: thin service implementations that
//! translate protobuf messages into calls against the content store,
//! search database, event bus, peer layer, and naming resolver, and
//! translate their results (and `DirError`s) back into protobuf.

pub mod error;
pub mod events;
pub mod naming;
pub mod routing;
pub mod server;
pub mod store;
pub mod sync;

pub use error::to_status;
pub use server::{serve, RpcServerState};
