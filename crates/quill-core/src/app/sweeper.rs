//! LockSweeper - lease 切れの claim を回収
//!
//! 毎回の claim サイクルの先頭で 1 回だけ走る。
//! 専用のバックグラウンドループは持たない（どのワーカーでも回収できる）。
//!
//! 完了書き込みとの競合は問題にならない：
//! complete は result の書き込みと lock の解除を同じ UPDATE で行うので、
//! sweep が先なら「未所有の pending 行」、後なら「result 済みで対象外」になる。

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use crate::domain::StoreError;
use crate::ports::TaskStore;

pub struct LockSweeper {
    store: Arc<dyn TaskStore>,
    lease: Duration,
}

impl LockSweeper {
    pub fn new(store: Arc<dyn TaskStore>, lease: Duration) -> Self {
        Self { store, lease }
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Clear every claim older than the lease. Returns how many rows were recovered.
    pub async fn sweep(&self) -> Result<u64, StoreError> {
        let swept = self.store.sweep_expired(self.lease).await?;
        if swept > 0 {
            info!(
                swept,
                lease_secs = self.lease.num_seconds(),
                "recovered rows from expired claims"
            );
        } else {
            debug!("no expired claims");
        }
        Ok(swept)
    }
}
