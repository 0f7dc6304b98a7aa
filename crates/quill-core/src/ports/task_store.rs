//! TaskStore port - タスク行の正本（source of truth）
//!
//! 前提にする原子性は「単一文の条件付き UPDATE」だけ。
//! 複数行トランザクションも行ロックも使わない。
//!
//! | 操作 | 条件 | 効果 |
//! |------|------|------|
//! | sweep_expired | result IS NULL AND claimed_at < now - lease | owner/claimed_at を NULL |
//! | claim | id ∈ candidates AND result IS NULL AND owner IS NULL | owner = me, claimed_at = now |
//! | complete | id = ? AND owner = me AND result IS NULL | result = ?, owner/claimed_at を NULL |
//! | release | id = ? AND owner = me AND result IS NULL | owner/claimed_at を NULL |

use async_trait::async_trait;
use chrono::Duration;

use crate::domain::{RowId, StoreError, TableStats, TaskRow, WorkerId};

/// One task table reached through filter/order/limit reads and
/// filter-scoped updates.
///
/// Implementations are bound to a single `TaskTable`; every read and
/// update includes its row filter.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Clear ownership on pending rows whose claim is older than `lease`.
    /// Returns the number of rows recovered.
    async fn sweep_expired(&self, lease: Duration) -> Result<u64, StoreError>;

    /// Up to `limit` pending, unowned row ids, ordered by id.
    async fn select_candidates(&self, limit: usize) -> Result<Vec<RowId>, StoreError>;

    /// Conditionally take ownership of at most `limit` of `candidates`.
    ///
    /// Only rows still pending and unowned at write time are touched, and
    /// only those are returned (ordered by id). Losing every race yields an
    /// empty vec, never an error.
    async fn claim(
        &self,
        candidates: &[RowId],
        owner: &WorkerId,
        limit: usize,
    ) -> Result<Vec<TaskRow>, StoreError>;

    /// Write `result` and clear the lock, if `owner` still holds the row.
    /// Returns false when the row was reclaimed in the meantime.
    async fn complete(
        &self,
        id: RowId,
        owner: &WorkerId,
        result: &serde_json::Value,
    ) -> Result<bool, StoreError>;

    /// Clear the lock without a result, if `owner` still holds the row.
    async fn release(&self, id: RowId, owner: &WorkerId) -> Result<bool, StoreError>;

    async fn stats(&self) -> Result<TableStats, StoreError>;
}
