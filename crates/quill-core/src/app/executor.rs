//! BatchExecutor - claim したバッチを chunk に分けて並行実行
//!
//! - chunk は B 行ずつ（B=1 なら行ごと）
//! - 同時に走る chunk は最大 C 個
//! - 遅い chunk・失敗した chunk が他を止めない（fan-out/fan-in）
//!
//! 1 プロセス内の協調的並行性なので、spawn はせず stream で束ねる。

use futures::StreamExt;
use futures::stream;
use tracing::warn;

use crate::domain::{ChunkReport, StoreError, TaskRow};
use crate::typed::ChunkProcessor;

/// Result of running one claimed batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub chunks: Vec<ChunkReport>,

    /// Store faults hit by individual chunks. The other chunks still ran.
    pub errors: Vec<StoreError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchExecutor {
    concurrency: usize,
    chunk_size: usize,
}

impl BatchExecutor {
    pub fn new(concurrency: usize, chunk_size: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `rows` (already in stable-key order) into chunks.
    pub fn split(&self, rows: Vec<TaskRow>) -> Vec<Vec<TaskRow>> {
        let mut chunks = Vec::with_capacity(rows.len().div_ceil(self.chunk_size));
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            chunks.push(rows.by_ref().take(self.chunk_size).collect());
        }
        chunks
    }

    pub async fn run(&self, rows: Vec<TaskRow>, processor: &dyn ChunkProcessor) -> BatchOutcome {
        let results: Vec<Result<ChunkReport, StoreError>> = stream::iter(self.split(rows))
            .map(|chunk| processor.process_chunk(chunk))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for result in results {
            match result {
                Ok(report) => outcome.chunks.push(report),
                Err(err) => {
                    warn!(task = processor.task_name(), error = %err, "chunk hit a store fault");
                    outcome.errors.push(err);
                }
            }
        }
        outcome
    }
}
