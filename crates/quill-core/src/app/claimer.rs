//! Claimer - 条件付き UPDATE による claim（行単位の compare-and-set）
//!
//! # フロー
//! 1. 候補 id を K·N 件読む（id 順、他のワーカーとの競合に負ける分を見込んで多めに）
//! 2. 候補に対して `result IS NULL AND owner IS NULL` を条件に 1 回だけ UPDATE
//! 3. UPDATE が実際に触った行だけが「自分の claim」
//!
//! 2 で負けた行は 0 行更新になるだけなので、所有を仮定してはいけない。

use std::sync::Arc;

use tracing::debug;

use crate::domain::{StoreError, TaskRow, WorkerId};
use crate::ports::TaskStore;

/// Default oversampling factor K.
pub const DEFAULT_OVERSAMPLE: usize = 2;

pub struct Claimer {
    store: Arc<dyn TaskStore>,
    worker_id: WorkerId,
    oversample: usize,
}

impl Claimer {
    pub fn new(store: Arc<dyn TaskStore>, worker_id: WorkerId) -> Self {
        Self {
            store,
            worker_id,
            oversample: DEFAULT_OVERSAMPLE,
        }
    }

    pub fn with_oversample(mut self, oversample: usize) -> Self {
        self.oversample = oversample.max(1);
        self
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Claim up to `batch_size` rows. May return fewer, or none.
    pub async fn claim(&self, batch_size: usize) -> Result<Vec<TaskRow>, StoreError> {
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let candidates = self
            .store
            .select_candidates(batch_size.saturating_mul(self.oversample))
            .await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let claimed = self
            .store
            .claim(&candidates, &self.worker_id, batch_size)
            .await?;

        debug!(
            worker_id = %self.worker_id,
            candidates = candidates.len(),
            claimed = claimed.len(),
            "claim attempt finished"
        );
        Ok(claimed)
    }
}
