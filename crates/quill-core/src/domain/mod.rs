//! Domain model (IDs, rows, tables, outcomes, errors).
//!
//! ストレージにもネットワークにも依存しない型だけを置く。

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod row;
pub mod table;

pub use errors::{
    ConfigError, EngineError, ServiceError, ServiceErrorKind, StoreError, ValidationError,
};
pub use ids::{RowId, WorkerId};
pub use outcome::{ChunkReport, ReleaseReason, RowOutcome};
pub use row::{TableStats, TaskRow};
pub use table::TaskTable;
