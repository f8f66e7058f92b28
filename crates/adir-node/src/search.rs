//! [`LocalSearch`] backed directly by the search database: dispatches a
//! `/skills/<category>/<class>`, `/domains/<category>/<class>`, or
//! `/name/<name>` label onto the matching `SearchDb` query. Unrecognized
//! label shapes simply match nothing rather than erroring — a BFS query
//! this node doesn't understand is not this node's problem.

use std::sync::Arc;

use adir_db::{IndexedRecord, SearchDb};
use adir_peer::{LabelMatch, LocalSearch};
use async_trait::async_trait;

/// The sentinel `peer` tag on matches this node produced locally —
/// distinguishing them costs nothing since the dispatcher only ever
/// forwards network-sourced matches under the real peer id.
const LOCAL_PEER_TAG: &str = "local";

pub struct DbLocalSearch {
    db: Arc<dyn SearchDb>,
}

impl DbLocalSearch {
    pub fn new(db: Arc<dyn SearchDb>) -> Self {
        Self { db }
    }

    fn to_match(record: IndexedRecord, label: String) -> LabelMatch {
        LabelMatch {
            cid: record.cid,
            name: record.name,
            version: record.version,
            peer: LOCAL_PEER_TAG.to_string(),
            labels: vec![label],
        }
    }
}

#[async_trait]
impl LocalSearch for DbLocalSearch {
    async fn match_labels(&self, labels: &[String]) -> Vec<LabelMatch> {
        let mut matches = Vec::new();

        for label in labels {
            if let Some(rest) = label.strip_prefix("/skills/") {
                if let Some((category, class)) = rest.split_once('/') {
                    if let Ok(records) = self.db.list_by_skill(category, class).await {
                        matches.extend(records.into_iter().map(|r| Self::to_match(r, label.clone())));
                    }
                }
            } else if let Some(rest) = label.strip_prefix("/domains/") {
                if let Some((category, class)) = rest.split_once('/') {
                    if let Ok(records) = self.db.list_by_domain(category, class).await {
                        matches.extend(records.into_iter().map(|r| Self::to_match(r, label.clone())));
                    }
                }
            } else if let Some(name) = label.strip_prefix("/name/") {
                if let Ok(cids) = self.db.list_all_cids().await {
                    for cid in cids {
                        if let Ok(Some(record)) = self.db.get_record(&cid).await {
                            if record.name == name {
                                matches.push(Self::to_match(record, label.clone()));
                            }
                        }
                    }
                }
            }
        }

        matches
    }
}
