//! App - エンジン層
//!
//! ports を組み合わせて claim → 実行 → 書き戻しのサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **LockSweeper**: lease 切れの claim を回収
//! - **Claimer**: 条件付き UPDATE による claim
//! - **BatchExecutor**: chunk 単位の fan-out / fan-in
//! - **RetryPolicy**: 生成 API 呼び出しの再試行
//! - **PollLoop**: sweep → claim → execute の繰り返し
//! - **WorkerBuilder**: PollLoop の構築とワイヤリング

pub mod builder;
pub mod claimer;
pub mod executor;
pub mod poll_loop;
pub mod retry;
pub mod status;
pub mod sweeper;

pub use self::builder::{BuildError, WorkerBuilder};
pub use self::claimer::{Claimer, DEFAULT_OVERSAMPLE};
pub use self::executor::{BatchExecutor, BatchOutcome};
pub use self::poll_loop::{LoopState, PollLoop};
pub use self::retry::{Backoff, RetryPolicy};
pub use self::status::CycleReport;
pub use self::sweeper::LockSweeper;
