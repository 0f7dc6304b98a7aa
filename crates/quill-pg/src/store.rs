//! PgTaskStore - TaskStore over a PostgreSQL table.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quill_core::domain::{
    ConfigError, RowId, StoreError, TableStats, TaskRow, TaskTable, WorkerId,
};
use quill_core::ports::TaskStore;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, error, instrument};

use crate::sql::Statements;

pub struct PgTaskStore {
    pool: PgPool,
    table: TaskTable,
    sql: Statements,
}

impl PgTaskStore {
    pub fn new(pool: PgPool, table: TaskTable) -> Result<Self, ConfigError> {
        table.validate()?;
        let sql = Statements::new(&table);
        Ok(Self { pool, table, sql })
    }

    /// Open a lazily connecting pool. Connection errors surface on first use.
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        table: TaskTable,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_lazy(url)
            .map_err(StoreError::backend)?;
        Self::new(pool, table).map_err(StoreError::backend)
    }

    fn decode(row: &PgRow) -> Result<TaskRow, StoreError> {
        let id = RowId::new(row.try_get::<i64, _>("id").map_err(StoreError::backend)?);
        let payload: Json<Value> = row
            .try_get("payload")
            .map_err(|e| StoreError::Decode(id, e.to_string()))?;
        let owner: Option<String> = row
            .try_get("owner")
            .map_err(|e| StoreError::Decode(id, e.to_string()))?;
        let claimed_at: Option<DateTime<Utc>> = row
            .try_get("claimed_at")
            .map_err(|e| StoreError::Decode(id, e.to_string()))?;

        Ok(TaskRow {
            id,
            payload: payload.0,
            result: None,
            owner: owner.map(WorkerId::new),
            claimed_at,
        })
    }
}

fn db_error(op: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        error!(op, error = %e, "task table query failed");
        StoreError::backend(e)
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    #[instrument(skip(self), fields(table = %self.table.table))]
    async fn sweep_expired(&self, lease: Duration) -> Result<u64, StoreError> {
        let done = sqlx::query(&self.sql.sweep)
            .bind(lease.num_seconds() as f64)
            .execute(&self.pool)
            .await
            .map_err(db_error("sweep"))?;
        Ok(done.rows_affected())
    }

    #[instrument(skip(self), fields(table = %self.table.table))]
    async fn select_candidates(&self, limit: usize) -> Result<Vec<RowId>, StoreError> {
        let ids: Vec<(i64,)> = sqlx::query_as(&self.sql.select_candidates)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("select_candidates"))?;
        Ok(ids.into_iter().map(|(id,)| RowId::new(id)).collect())
    }

    #[instrument(skip(self, candidates), fields(table = %self.table.table, candidates = candidates.len()))]
    async fn claim(
        &self,
        candidates: &[RowId],
        owner: &WorkerId,
        limit: usize,
    ) -> Result<Vec<TaskRow>, StoreError> {
        let ids: Vec<i64> = candidates.iter().map(|id| id.get()).collect();
        let rows = sqlx::query(&self.sql.claim)
            .bind(owner.as_str())
            .bind(&ids)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("claim"))?;

        let mut claimed = rows
            .iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>, _>>()?;
        claimed.sort_by_key(|row| row.id);
        debug!(claimed = claimed.len(), "claim update finished");
        Ok(claimed)
    }

    #[instrument(skip(self, result), fields(table = %self.table.table))]
    async fn complete(&self, id: RowId, owner: &WorkerId, result: &Value) -> Result<bool, StoreError> {
        let done = sqlx::query(&self.sql.complete)
            .bind(id.get())
            .bind(owner.as_str())
            .bind(Json(result))
            .execute(&self.pool)
            .await
            .map_err(db_error("complete"))?;
        Ok(done.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(table = %self.table.table))]
    async fn release(&self, id: RowId, owner: &WorkerId) -> Result<bool, StoreError> {
        let done = sqlx::query(&self.sql.release)
            .bind(id.get())
            .bind(owner.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error("release"))?;
        Ok(done.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(table = %self.table.table))]
    async fn stats(&self) -> Result<TableStats, StoreError> {
        let (pending, claimed, done): (i64, i64, i64) = sqlx::query_as(&self.sql.stats)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("stats"))?;
        Ok(TableStats {
            pending: pending as u64,
            claimed: claimed as u64,
            done: done as u64,
        })
    }
}
