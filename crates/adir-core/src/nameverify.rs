use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Failed,
}

/// A cached name-ownership verdict: valid for `[verified_at, expires_at)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NameVerification {
    pub cid: String,
    pub name: String,
    pub status: VerificationStatus,
    pub checked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NameVerification {
    /// `true` if this cached verdict is still usable at `now` — the task
    /// must not re-fetch while this holds.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fresh_within_ttl_window() {
        let now = Utc::now();
        let nv = NameVerification {
            cid: "bxyz".into(),
            name: "example.com/a".into(),
            status: VerificationStatus::Verified,
            checked_at: now,
            expires_at: now + Duration::hours(1),
        };
        assert!(nv.is_fresh(now + Duration::minutes(30)));
        assert!(!nv.is_fresh(now + Duration::hours(2)));
    }
}
