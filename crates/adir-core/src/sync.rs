use serde::{Deserialize, Serialize};

/// Sync-job status. Transitions are monotone: `Pending -> InProgress ->
/// {Completed | Failed}`, or any state `-> Deleted`. Reversals are
/// forbidden and enforced by `SyncStatus::can_transition_to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Deleted,
}

impl SyncStatus {
    pub fn can_transition_to(self, next: SyncStatus) -> bool {
        use SyncStatus::*;
        if next == Deleted {
            return true;
        }
        matches!(
            (self, next),
            (Pending, InProgress) | (InProgress, Completed) | (InProgress, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::InProgress => "in_progress",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
            SyncStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => SyncStatus::Pending,
            "in_progress" => SyncStatus::InProgress,
            "completed" => SyncStatus::Completed,
            "failed" => SyncStatus::Failed,
            "deleted" => SyncStatus::Deleted,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbids_reversal() {
        assert!(!SyncStatus::Completed.can_transition_to(SyncStatus::Pending));
        assert!(!SyncStatus::Failed.can_transition_to(SyncStatus::InProgress));
    }

    #[test]
    fn allows_monotone_path() {
        assert!(SyncStatus::Pending.can_transition_to(SyncStatus::InProgress));
        assert!(SyncStatus::InProgress.can_transition_to(SyncStatus::Completed));
        assert!(SyncStatus::InProgress.can_transition_to(SyncStatus::Failed));
    }

    #[test]
    fn deleted_reachable_from_any_state() {
        for s in [SyncStatus::Pending, SyncStatus::InProgress, SyncStatus::Completed, SyncStatus::Failed] {
            assert!(s.can_transition_to(SyncStatus::Deleted));
        }
    }
}
