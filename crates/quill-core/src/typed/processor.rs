//! ChunkProcessor - chunk 単位の実行
//!
//! # 学習ポイント
//! - ジェネリック実装 (`TaskProcessor<K: TaskKind>`) を object-safe な
//!   `dyn ChunkProcessor` に型消去して PollLoop / BatchExecutor に渡す
//! - chunk の失敗は ChunkReport に閉じ込め、StoreError だけを `?` で上に返す
//!
//! # 1 chunk のフロー
//! 1. payload を `K::Payload` にデコード（失敗した行だけ release）
//! 2. prompt を組み立てて RetryPolicy 経由で生成 API を呼ぶ
//! 3. ResponseCodec で item に分解（件数不一致は chunk 全体を release）
//! 4. 行ごとに validate → complete / release
//!
//! complete / release はどちらも「まだ自分が owner なら」でスコープされるので、
//! 0 行更新は `RowOutcome::Lost` として記録する。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::codec::ResponseCodec;
use super::task::TaskKind;
use crate::app::RetryPolicy;
use crate::domain::{
    ChunkReport, ReleaseReason, RowId, RowOutcome, StoreError, TaskRow, ValidationError, WorkerId,
};
use crate::ports::{GenerationRequest, GenerativeService, TaskStore};

/// Object-safe processor used by the executor.
#[async_trait]
pub trait ChunkProcessor: Send + Sync {
    fn task_name(&self) -> &str;

    /// Process one chunk of rows claimed by this worker.
    ///
    /// Every row ends up completed, released or lost. `Err` is returned
    /// only for store faults.
    async fn process_chunk(&self, rows: Vec<TaskRow>) -> Result<ChunkReport, StoreError>;
}

/// Everything a processor needs besides the task itself.
#[derive(Clone)]
pub struct ProcessorContext {
    pub store: Arc<dyn TaskStore>,
    pub service: Arc<dyn GenerativeService>,
    pub worker_id: WorkerId,
    pub model: String,
    pub retry: RetryPolicy,
}

pub struct TaskProcessor<K: TaskKind> {
    kind: K,
    ctx: ProcessorContext,
}

impl<K: TaskKind> TaskProcessor<K> {
    pub fn new(kind: K, ctx: ProcessorContext) -> Self {
        Self { kind, ctx }
    }

    async fn release(&self, id: RowId, reason: ReleaseReason) -> Result<RowOutcome, StoreError> {
        if self.ctx.store.release(id, &self.ctx.worker_id).await? {
            Ok(RowOutcome::Released(reason))
        } else {
            warn!(task = K::NAME, row_id = %id, ?reason, "release hit no row, lock was lost");
            Ok(RowOutcome::Lost)
        }
    }

    async fn complete(&self, id: RowId, result: &serde_json::Value) -> Result<RowOutcome, StoreError> {
        if self.ctx.store.complete(id, &self.ctx.worker_id, result).await? {
            Ok(RowOutcome::Completed)
        } else {
            warn!(task = K::NAME, row_id = %id, "result discarded, lock was lost");
            Ok(RowOutcome::Lost)
        }
    }

    async fn release_all(
        &self,
        ids: &[RowId],
        reason: ReleaseReason,
        report: &mut ChunkReport,
    ) -> Result<(), StoreError> {
        report.chunk_failure = Some(reason);
        for &id in ids {
            let outcome = self.release(id, reason).await?;
            report.push(id, outcome);
        }
        Ok(())
    }
}

#[async_trait]
impl<K: TaskKind> ChunkProcessor for TaskProcessor<K> {
    fn task_name(&self) -> &str {
        K::NAME
    }

    async fn process_chunk(&self, rows: Vec<TaskRow>) -> Result<ChunkReport, StoreError> {
        let mut report = ChunkReport::default();

        let mut ids = Vec::with_capacity(rows.len());
        let mut payloads = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<K::Payload>(row.payload) {
                Ok(payload) => {
                    ids.push(row.id);
                    payloads.push(payload);
                }
                Err(err) => {
                    warn!(task = K::NAME, row_id = %row.id, error = %err, "undecodable payload");
                    let outcome = self.release(row.id, ReleaseReason::UndecodablePayload).await?;
                    report.push(row.id, outcome);
                }
            }
        }
        if ids.is_empty() {
            return Ok(report);
        }

        let request = GenerationRequest {
            model: self.ctx.model.clone(),
            prompt: self.kind.build_prompt(&payloads),
            structured: self.kind.structured(),
        };
        let (service, request) = (&self.ctx.service, &request);
        let text = match self.ctx.retry.call(move || service.generate(request)).await {
            Ok(text) => text,
            Err(err) => {
                warn!(task = K::NAME, rows = ids.len(), error = %err, "generative call failed, releasing chunk");
                self.release_all(&ids, ReleaseReason::ServiceFailed, &mut report)
                    .await?;
                return Ok(report);
            }
        };

        let items = match ResponseCodec::items(&text, ids.len(), self.kind.items_field()) {
            Ok(items) => items,
            Err(err) => {
                let reason = match err {
                    ValidationError::CountMismatch { .. } => ReleaseReason::CountMismatch,
                    _ => ReleaseReason::Invalid,
                };
                warn!(task = K::NAME, rows = ids.len(), error = %err, "unusable response, releasing chunk");
                self.release_all(&ids, reason, &mut report).await?;
                return Ok(report);
            }
        };

        for ((id, payload), item) in ids.into_iter().zip(&payloads).zip(items) {
            let result = self
                .kind
                .validate(payload, item)
                .and_then(|output| {
                    serde_json::to_value(output)
                        .map_err(|e| ValidationError::Malformed(e.to_string()))
                });
            let outcome = match result {
                Ok(value) => self.complete(id, &value).await?,
                Err(err) => {
                    debug!(task = K::NAME, row_id = %id, error = %err, "item rejected");
                    self.release(id, ReleaseReason::Invalid).await?
                }
            };
            report.push(id, outcome);
        }

        Ok(report)
    }
}
