//! Task row: the unit of work moved by the claim protocol.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{RowId, WorkerId};

/// One row of a task table, as seen by the engine.
///
/// State is derived from the columns, not stored separately:
/// - pending: `result` is null and `owner` is null
/// - claimed: `result` is null and `owner` is set
/// - done: `result` is set (terminal; never claimed again)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: RowId,

    /// Generation input. Opaque to the engine; decoded by the task kind.
    pub payload: serde_json::Value,

    /// Set exactly once, on success.
    pub result: Option<serde_json::Value>,

    pub owner: Option<WorkerId>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl TaskRow {
    /// A fresh, unowned, pending row.
    pub fn pending(id: RowId, payload: serde_json::Value) -> Self {
        Self {
            id,
            payload,
            result: None,
            owner: None,
            claimed_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.result.is_some()
    }

    /// Has the claim on this row outlived `lease` at `now`?
    ///
    /// An owner without a `claimed_at` counts as expired.
    pub fn lease_expired(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        match (&self.owner, self.claimed_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(at)) => at < now - lease,
        }
    }

    /// Eligible iff result is null AND (owner is null OR the lease expired).
    pub fn is_eligible(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        !self.is_done() && (self.owner.is_none() || self.lease_expired(now, lease))
    }

    pub fn is_owned_by(&self, worker: &WorkerId) -> bool {
        self.owner.as_ref() == Some(worker)
    }
}

/// Row counts per derived state, for operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub pending: u64,
    pub claimed: u64,
    pub done: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn claimed(at: DateTime<Utc>) -> TaskRow {
        TaskRow {
            owner: Some(WorkerId::new("a")),
            claimed_at: Some(at),
            ..TaskRow::pending(RowId::new(1), serde_json::json!({}))
        }
    }

    #[test]
    fn pending_row_is_eligible() {
        let row = TaskRow::pending(RowId::new(1), serde_json::json!({}));
        assert!(row.is_eligible(t0(), Duration::minutes(15)));
    }

    #[test]
    fn claimed_row_is_not_eligible_within_lease() {
        let row = claimed(t0());
        let now = t0() + Duration::minutes(2);
        assert!(!row.is_eligible(now, Duration::minutes(15)));
    }

    #[test]
    fn claimed_row_becomes_eligible_after_lease() {
        let row = claimed(t0());
        let now = t0() + Duration::minutes(16);
        assert!(row.is_eligible(now, Duration::minutes(15)));
    }

    #[test]
    fn done_row_is_never_eligible() {
        let mut row = claimed(t0());
        row.result = Some(serde_json::json!({"ok": true}));
        row.owner = None;
        row.claimed_at = None;
        assert!(!row.is_eligible(t0() + Duration::days(30), Duration::minutes(15)));
    }

    #[test]
    fn owner_without_timestamp_counts_as_expired() {
        let mut row = claimed(t0());
        row.claimed_at = None;
        assert!(row.lease_expired(t0(), Duration::minutes(15)));
    }
}
