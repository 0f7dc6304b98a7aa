//! PollLoop - プロセスごとの駆動ループ
//!
//! # フロー（1 サイクル）
//! 1. LockSweeper::sweep() で lease 切れを回収
//! 2. Claimer::claim(N) で自分の分を確保
//! 3. 空なら Idle に戻って idle_sleep だけ待つ
//! 4. BatchExecutor::run() で chunk ごとに TaskProcessor を実行
//!
//! 状態: `Idle → Claiming → Executing → Idle` の繰り返し。終端状態はない。
//! 他のプロセスとは Claimer の条件付き UPDATE 以外で一切やり取りしない。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use super::{BatchExecutor, Claimer, CycleReport, LockSweeper};
use crate::domain::{EngineError, TaskRow, WorkerId};
use crate::typed::ChunkProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Claiming,
    Executing,
}

pub struct PollLoop {
    sweeper: LockSweeper,
    claimer: Claimer,
    executor: BatchExecutor,
    processor: Arc<dyn ChunkProcessor>,
    batch_size: usize,
    idle_sleep: Duration,
    state: LoopState,
}

impl PollLoop {
    pub fn new(
        sweeper: LockSweeper,
        claimer: Claimer,
        executor: BatchExecutor,
        processor: Arc<dyn ChunkProcessor>,
        batch_size: usize,
        idle_sleep: Duration,
    ) -> Self {
        Self {
            sweeper,
            claimer,
            executor,
            processor,
            batch_size,
            idle_sleep,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn worker_id(&self) -> &WorkerId {
        self.claimer.worker_id()
    }

    pub fn task_name(&self) -> &str {
        self.processor.task_name()
    }

    /// One sweep → claim → execute pass.
    ///
    /// Store faults from any step are returned after every chunk has
    /// finished. Rows still claimed at that point stay locked until their
    /// lease runs out.
    #[instrument(skip(self), fields(worker_id = %self.claimer.worker_id(), task = self.processor.task_name()))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, EngineError> {
        self.state = LoopState::Claiming;
        let (swept, rows) = match self.sweep_and_claim().await {
            Ok(claimed) => claimed,
            Err(err) => {
                self.state = LoopState::Idle;
                return Err(err);
            }
        };

        let mut report = CycleReport {
            swept,
            claimed: rows.len(),
            ..CycleReport::default()
        };
        if rows.is_empty() {
            self.state = LoopState::Idle;
            return Ok(report);
        }

        self.state = LoopState::Executing;
        let outcome = self.executor.run(rows, self.processor.as_ref()).await;
        self.state = LoopState::Idle;

        for chunk in &outcome.chunks {
            report.absorb(chunk);
        }
        match outcome.errors.into_iter().next() {
            Some(err) => {
                error!(?report, "cycle finished with store faults");
                Err(err.into())
            }
            None => Ok(report),
        }
    }

    async fn sweep_and_claim(&self) -> Result<(u64, Vec<TaskRow>), EngineError> {
        let swept = self.sweeper.sweep().await?;
        let rows = self.claimer.claim(self.batch_size).await?;
        Ok((swept, rows))
    }

    /// Loop forever. Returns only when `shutdown` flips to true or its
    /// sender is dropped; an in-flight cycle is always finished first.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            worker_id = %self.worker_id(),
            task = self.task_name(),
            batch_size = self.batch_size,
            chunk_size = self.executor.chunk_size(),
            concurrency = self.executor.concurrency(),
            lease_secs = self.sweeper.lease().num_seconds(),
            "poll loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.run_cycle().await {
                Ok(report) if report.is_idle() => true,
                Ok(report) => {
                    info!(
                        task = self.task_name(),
                        swept = report.swept,
                        claimed = report.claimed,
                        completed = report.completed,
                        released = report.released,
                        lost = report.lost,
                        failed_chunks = report.failed_chunks,
                        "cycle finished"
                    );
                    false
                }
                Err(err) => {
                    error!(task = self.task_name(), error = %err, "cycle failed");
                    true
                }
            };

            if pause {
                tokio::select! {
                    changed = shutdown.changed() => {
                        // sender が drop されたら止める
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.idle_sleep) => {}
                }
            }
        }

        info!(worker_id = %self.worker_id(), "poll loop stopped");
    }
}
