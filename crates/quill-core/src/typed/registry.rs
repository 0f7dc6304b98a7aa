//! TaskRegistry - タスク種別の登録と管理
//!
//! # 学習ポイント
//! - HashMap での型消去された factory の管理
//! - Generic method (`register::<K>`) での登録と型安全性
//!
//! 実行時に必要なのは store / service / worker_id が揃ってからなので、
//! processor そのものではなく「ProcessorContext を受け取って processor を作る」
//! factory を保持する。

use std::collections::HashMap;
use std::sync::Arc;

use super::processor::{ChunkProcessor, ProcessorContext, TaskProcessor};
use super::task::TaskKind;
use crate::domain::TaskTable;

pub type ProcessorFactory = Arc<dyn Fn(ProcessorContext) -> Arc<dyn ChunkProcessor> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    default_table: TaskTable,
    factory: ProcessorFactory,
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    entries: HashMap<&'static str, Entry>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task `{0}` is already registered")]
    AlreadyRegistered(String),

    #[error("task `{0}` is not registered")]
    NotRegistered(String),
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<K: TaskKind + Clone>(&mut self, kind: K) -> Result<(), RegistryError> {
        if self.entries.contains_key(K::NAME) {
            return Err(RegistryError::AlreadyRegistered(K::NAME.to_string()));
        }
        let default_table = kind.default_table();
        let factory: ProcessorFactory = Arc::new(move |ctx| {
            Arc::new(TaskProcessor::new(kind.clone(), ctx)) as Arc<dyn ChunkProcessor>
        });
        self.entries.insert(
            K::NAME,
            Entry {
                default_table,
                factory,
            },
        );
        Ok(())
    }

    pub fn factory(&self, name: &str) -> Result<ProcessorFactory, RegistryError> {
        self.entry(name).map(|entry| entry.factory.clone())
    }

    pub fn default_table(&self, name: &str) -> Result<TaskTable, RegistryError> {
        self.entry(name).map(|entry| entry.default_table.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered task names, sorted.
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn entry(&self, name: &str) -> Result<&Entry, RegistryError> {
        self.entries
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))
    }
}
