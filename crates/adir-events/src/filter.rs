use std::collections::BTreeSet;

use adir_core::EventKind;

/// A subscriber's interest: every `Some(set)` field narrows matching to
/// that set; `None` means "no restriction on this axis." An event must
/// pass every axis to be delivered.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub kinds: Option<BTreeSet<EventKind>>,
    /// Delivered if the event carries at least one label in this set
    /// (non-empty intersection), not full containment.
    pub labels: Option<BTreeSet<String>>,
    pub resource_ids: Option<BTreeSet<String>>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels = Some(labels.into_iter().collect());
        self
    }

    pub fn with_resource_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.resource_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn matches(&self, kind: EventKind, resource_id: &str, labels: &BTreeSet<String>) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&kind) {
                return false;
            }
        }
        if let Some(ids) = &self.resource_ids {
            if !ids.contains(resource_id) {
                return false;
            }
        }
        if let Some(wanted) = &self.labels {
            if wanted.is_disjoint(labels) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn unrestricted_filter_matches_anything() {
        let f = Filter::all();
        assert!(f.matches(EventKind::RecordPushed, "bcid", &BTreeSet::new()));
    }

    #[test]
    fn kind_filter_excludes_other_kinds() {
        let f = Filter::all().with_kinds([EventKind::RecordPushed]);
        assert!(!f.matches(EventKind::RecordDeleted, "bcid", &BTreeSet::new()));
    }

    #[test]
    fn label_filter_requires_nonempty_intersection() {
        let f = Filter::all().with_labels(["skills/NLP".to_string()]);
        let labels: BTreeSet<String> = ["skills/NLP".to_string(), "domains/research".to_string()].into();
        assert!(f.matches(EventKind::RecordPushed, "bcid", &labels));
        assert!(!f.matches(EventKind::RecordPushed, "bcid", &BTreeSet::new()));
    }
}
