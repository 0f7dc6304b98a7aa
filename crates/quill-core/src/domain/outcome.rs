//! Outcome model: what happened to each claimed row in one cycle.
//!
//! A row leaves a cycle in exactly one of three ways. `Lost` means the
//! "still owned by me" write touched zero rows: the lease expired and a
//! sweep or another worker took the row.

use serde::{Deserialize, Serialize};

use super::RowId;

/// Why a row was released without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseReason {
    /// The service call failed (non-retryable, or attempts exhausted).
    ServiceFailed,

    /// The response did not carry exactly one item per row in the chunk.
    CountMismatch,

    /// The row's item failed schema validation.
    Invalid,

    /// The row's payload could not be decoded into the task's input type.
    UndecodablePayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowOutcome {
    Completed,
    Released(ReleaseReason),
    Lost,
}

/// Per-row outcomes of one chunk, in chunk order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkReport {
    pub rows: Vec<(RowId, RowOutcome)>,

    /// Set when the chunk failed as a whole (service failure or count mismatch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_failure: Option<ReleaseReason>,
}

impl ChunkReport {
    pub fn push(&mut self, id: RowId, outcome: RowOutcome) {
        self.rows.push((id, outcome));
    }

    pub fn count(&self, outcome: RowOutcome) -> usize {
        self.rows.iter().filter(|(_, o)| *o == outcome).count()
    }

    pub fn completed(&self) -> usize {
        self.count(RowOutcome::Completed)
    }

    pub fn released(&self) -> usize {
        self.rows
            .iter()
            .filter(|(_, o)| matches!(o, RowOutcome::Released(_)))
            .count()
    }

    pub fn lost(&self) -> usize {
        self.count(RowOutcome::Lost)
    }

    pub fn is_failed(&self) -> bool {
        self.chunk_failure.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_by_outcome() {
        let mut report = ChunkReport::default();
        report.push(RowId::new(1), RowOutcome::Completed);
        report.push(RowId::new(2), RowOutcome::Released(ReleaseReason::Invalid));
        report.push(RowId::new(3), RowOutcome::Lost);
        report.push(RowId::new(4), RowOutcome::Completed);

        assert_eq!(report.completed(), 2);
        assert_eq!(report.released(), 1);
        assert_eq!(report.lost(), 1);
        assert!(!report.is_failed());
    }

    #[test]
    fn row_outcome_is_tagged() {
        let v = serde_json::to_value(RowOutcome::Released(ReleaseReason::CountMismatch)).unwrap();
        assert_eq!(v["kind"], "RELEASED");
        assert_eq!(v["reason"], "COUNT_MISMATCH");
    }
}
