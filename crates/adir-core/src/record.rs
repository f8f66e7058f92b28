//! The agent Record: an immutable, content-addressed descriptor.
//!
//! Field set is intentionally the minimum the core must index and address
//! (skills/domains/locators/modules) per the data-model's explicit
//! non-goal of not prescribing a full agent schema; richer per-agent
//! metadata can ride inside `Record::annotations` without the core caring.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hierarchical skill/domain label, e.g. `category = "NLP"`, `class =
/// "Text Completion"` renders as the query label `/skills/NLP/Text
/// Completion`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Skill {
    pub category: String,
    pub class: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Domain {
    pub category: String,
    pub class: String,
}

/// A network-reachable endpoint the agent exposes (e.g. an MCP server, a
/// REST API, a gRPC address).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Locator {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// A named sub-module of the agent (e.g. a tool, an evaluation harness).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Module {
    pub name: String,
    pub version: String,
}

/// An attached attestation over the record's canonical bytes. The
/// signature scheme itself is an external primitive (`verify(payload,
/// cert|key) -> bool`); this type only carries the evidence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Signature {
    pub algorithm: String,
    pub signature: Vec<u8>,
    /// PEM-encoded certificate, or a raw public key, depending on `algorithm`.
    pub key_or_cert: Vec<u8>,
    /// An optional Sigstore bundle, opaque to this crate — verified by an
    /// injected oracle, never parsed here.
    #[serde(default)]
    pub sigstore_bundle: Option<Vec<u8>>,
}

/// The immutable agent descriptor. Never mutated after `Push`; a new
/// push with different bytes produces a different CID, never an in-place
/// edit of this one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub schema_version: String,
    /// `host/path`-shaped symbolic name, e.g.
    /// `directory.agntcy.org/cisco/marketing-v4`.
    pub name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub locators: Vec<Locator>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    /// Free-form metadata the core never interprets.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Record {
    /// `true` if this record carries at least one signature. Says nothing
    /// about whether any of them verify — that's the name-verification
    /// task's job.
    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Parse `host/path` out of `name` for DNS/well-known name verification.
    /// Returns `None` if `name` has no `/` (not a verifiable name shape).
    pub fn authority_host(&self) -> Option<&str> {
        self.name.split('/').next().filter(|h| !h.is_empty())
    }

    /// The `/skills/<category>/<class>` and `/domains/<category>/<class>`
    /// labels a label-filtered event subscription (or a `List` label
    /// query) matches against — the same path shape the search database's
    /// label queries use.
    pub fn event_labels(&self) -> Vec<String> {
        let skills = self.skills.iter().map(|s| format!("/skills/{}/{}", s.category, s.class));
        let domains = self.domains.iter().map(|d| format!("/domains/{}/{}", d.category, d.class));
        skills.chain(domains).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            schema_version: "v1".into(),
            name: "directory.agntcy.org/cisco/marketing-v4".into(),
            version: "v4.0.0".into(),
            created_at: Utc::now(),
            authors: vec!["cisco".into()],
            description: String::new(),
            skills: vec![Skill { category: "NLP".into(), class: "Text Completion".into() }],
            domains: vec![],
            locators: vec![],
            modules: vec![],
            signatures: vec![],
            annotations: BTreeMap::new(),
        }
    }

    #[test]
    fn authority_host_splits_on_first_slash() {
        assert_eq!(sample().authority_host(), Some("directory.agntcy.org"));
    }

    #[test]
    fn unsigned_record_reports_not_signed() {
        assert!(!sample().is_signed());
    }

    #[test]
    fn event_labels_cover_skills_and_domains() {
        let mut record = sample();
        record.domains.push(Domain { category: "finance".into(), class: "risk".into() });
        let labels = record.event_labels();
        assert!(labels.contains(&"/skills/NLP/Text Completion".to_string()));
        assert!(labels.contains(&"/domains/finance/risk".to_string()));
    }
}
