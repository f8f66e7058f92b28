//! adir-events
//!
//! An in-process publish/subscribe bus. Readers (`publish`) hold a reader
//! lock over the subscriber map; writers (`subscribe`/`unsubscribe`) hold
//! the writer lock only long enough to mutate it.

pub mod bus;
pub mod emit;
pub mod filter;

pub use bus::{BusMetrics, EventBus, SubscriptionId};
pub use filter::Filter;
