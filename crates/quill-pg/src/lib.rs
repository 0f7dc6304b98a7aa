//! quill-pg
//!
//! PostgreSQL implementation of the `TaskStore` port.
//!
//! 表に必要な列（名前は TaskTable で変えられる）:
//! - `id BIGINT` 主キー
//! - payload 列（任意の型。JSON オブジェクトに組み立てて渡す）
//! - 結果列 `JSONB NULL`
//! - `locked_by TEXT NULL`, `locked_at TIMESTAMPTZ NULL`

pub mod sql;
pub mod store;

pub use self::store::PgTaskStore;
