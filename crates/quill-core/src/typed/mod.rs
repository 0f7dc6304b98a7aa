//! Typed - 型付きタスク API
//!
//! タスク名の typo を型で排除し、payload / 出力の形を静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskKind` trait - payload / output 型、prompt、validate
//! - **内部（Dyn）**: `ChunkProcessor` trait - object-safe, type erasure

pub mod codec;
pub mod processor;
pub mod registry;
pub mod schema;
pub mod task;

pub use self::codec::ResponseCodec;
pub use self::processor::{ChunkProcessor, ProcessorContext, TaskProcessor};
pub use self::registry::{ProcessorFactory, RegistryError, TaskRegistry};
pub use self::task::TaskKind;
