//! quill-core
//!
//! Core building blocks for the Quill enrichment workers.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, row, table, outcome, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, GenerativeService, Clock）
//! - **app**: エンジン（sweeper, claimer, executor, retry, poll_loop, builder）
//! - **typed**: 型付きタスク API（TaskKind, ChunkProcessor, TaskRegistry, ResponseCodec）
//! - **impls**: 実装（InMemoryTaskStore, ScriptedService などテスト・デモ用）
//! - **tasks**: 組み込みのタスク種別
//! - **settings**: 設定の読み込み
//! - **observability**: ログ出力の初期化

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod settings;
pub mod tasks;
pub mod typed;
