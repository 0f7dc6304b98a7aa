//! In-memory task store.
//!
//! Same conditional-update semantics as the SQL store: every operation
//! runs under one lock, which plays the role of single-statement
//! atomicity. Rows are kept in a `BTreeMap` so "ordered by id" is free.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::Mutex;

use crate::domain::{RowId, StoreError, TableStats, TaskRow, WorkerId};
use crate::ports::{Clock, SystemClock, TaskStore};

pub struct InMemoryTaskStore {
    rows: Mutex<BTreeMap<RowId, TaskRow>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    /// Insert (or replace) pending rows. Stands in for the upstream producer.
    pub async fn insert_pending(&self, rows: impl IntoIterator<Item = (i64, serde_json::Value)>) {
        let mut state = self.rows.lock().await;
        for (id, payload) in rows {
            let id = RowId::new(id);
            state.insert(id, TaskRow::pending(id, payload));
        }
    }

    pub async fn get(&self, id: RowId) -> Option<TaskRow> {
        self.rows.lock().await.get(&id).cloned()
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn sweep_expired(&self, lease: Duration) -> Result<u64, StoreError> {
        let now = self.clock.now();
        let mut state = self.rows.lock().await;
        let mut swept = 0;
        for row in state.values_mut() {
            if !row.is_done() && row.lease_expired(now, lease) {
                row.owner = None;
                row.claimed_at = None;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn select_candidates(&self, limit: usize) -> Result<Vec<RowId>, StoreError> {
        let state = self.rows.lock().await;
        Ok(state
            .values()
            .filter(|row| !row.is_done() && row.owner.is_none())
            .map(|row| row.id)
            .take(limit)
            .collect())
    }

    async fn claim(
        &self,
        candidates: &[RowId],
        owner: &WorkerId,
        limit: usize,
    ) -> Result<Vec<TaskRow>, StoreError> {
        let now = self.clock.now();
        let mut state = self.rows.lock().await;

        let mut ids = candidates.to_vec();
        ids.sort();
        ids.dedup();

        let mut claimed = Vec::new();
        for id in ids {
            if claimed.len() >= limit {
                break;
            }
            let Some(row) = state.get_mut(&id) else {
                continue;
            };
            // the conditional part of the update
            if row.is_done() || row.owner.is_some() {
                continue;
            }
            row.owner = Some(owner.clone());
            row.claimed_at = Some(now);
            claimed.push(row.clone());
        }
        Ok(claimed)
    }

    async fn complete(
        &self,
        id: RowId,
        owner: &WorkerId,
        result: &serde_json::Value,
    ) -> Result<bool, StoreError> {
        let mut state = self.rows.lock().await;
        match state.get_mut(&id) {
            Some(row) if row.is_owned_by(owner) && !row.is_done() => {
                row.result = Some(result.clone());
                row.owner = None;
                row.claimed_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: RowId, owner: &WorkerId) -> Result<bool, StoreError> {
        let mut state = self.rows.lock().await;
        match state.get_mut(&id) {
            Some(row) if row.is_owned_by(owner) && !row.is_done() => {
                row.owner = None;
                row.claimed_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stats(&self) -> Result<TableStats, StoreError> {
        let state = self.rows.lock().await;
        let mut stats = TableStats::default();
        for row in state.values() {
            if row.is_done() {
                stats.done += 1;
            } else if row.owner.is_some() {
                stats.claimed += 1;
            } else {
                stats.pending += 1;
            }
        }
        Ok(stats)
    }
}
