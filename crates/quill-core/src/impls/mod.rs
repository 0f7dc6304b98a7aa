//! Impls - ports の開発用・テスト用実装
//!
//! 本番用の実装は別クレート：
//! - `quill-pg`: PgTaskStore
//! - `quill-gemini`: GeminiService

pub mod memory_store;
pub mod scripted;

pub use self::memory_store::InMemoryTaskStore;
pub use self::scripted::ScriptedService;
