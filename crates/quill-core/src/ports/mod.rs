//! Ports - 抽象化レイヤー
//!
//! エンジンが外部に要求するものは 3 つだけ：
//! - TaskStore: 条件付き UPDATE ができる表（PostgreSQL / InMemory）
//! - GenerativeService: プロンプトを投げてテキストを受け取る API
//! - Clock: lease 判定用の時刻

pub mod clock;
pub mod generative;
pub mod task_store;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::generative::{GenerationRequest, GenerativeService};
pub use self::task_store::TaskStore;
