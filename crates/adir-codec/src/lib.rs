//! adir-codec
//!
//! Canonical serialization, content-addressing, and reference parsing —
//! the three pure functions every other crate in the workspace calls to
//! turn a [`adir_core::Record`] into a CID and a typed string reference
//! back into a [`adir_core::Reference`].

pub mod canonical;
pub mod digest;
pub mod error;
pub mod reference;

pub use canonical::{canonicalize, canonicalize_value};
pub use digest::digest_of;
pub use error::CodecError;
pub use reference::parse_reference;

use adir_core::{Cid, Record};

/// Canonicalize and digest a [`Record`] in one step — the operation the
/// store and the resolver actually call.
pub fn record_cid(record: &Record) -> Result<Cid, CodecError> {
    let bytes = canonicalize(record)?;
    Ok(digest_of(&bytes))
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;
    use serde_json::{json, Value};

    use crate::canonical::canonicalize_value;
    use crate::digest::digest_of;

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..8)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonicalization_is_idempotent(v in arb_value()) {
            let once = canonicalize_value(&v).unwrap();
            let reparsed: Value = serde_json::from_slice(&once).unwrap();
            let twice = canonicalize_value(&reparsed).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn digest_is_a_pure_function_of_bytes(v in arb_value()) {
            let bytes = canonicalize_value(&v).unwrap();
            prop_assert_eq!(digest_of(&bytes), digest_of(&bytes));
        }
    }
}
