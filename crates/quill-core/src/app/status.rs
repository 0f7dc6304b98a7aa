//! Status - 1 サイクル分の集計
//!
//! 呼び出し側はタスクの完了を待たないので、運用者が見るのはこのログだけ。

use serde::{Deserialize, Serialize};

use crate::domain::ChunkReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub swept: u64,
    pub claimed: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
    pub completed: usize,
    pub released: usize,
    pub lost: usize,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.claimed == 0
    }

    pub fn absorb(&mut self, chunk: &ChunkReport) {
        self.chunks += 1;
        if chunk.is_failed() {
            self.failed_chunks += 1;
        }
        self.completed += chunk.completed();
        self.released += chunk.released();
        self.lost += chunk.lost();
    }
}
