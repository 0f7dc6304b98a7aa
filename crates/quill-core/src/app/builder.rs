//! WorkerBuilder - PollLoop の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 足りない部品は build() で BuildError になる
//!
//! # 使用例
//! ```ignore
//! let poll_loop = WorkerBuilder::new()
//!     .store(store)
//!     .service(service)
//!     .task(SubjectClassification::default())
//!     .settings(task_settings)
//!     .build()?;
//! ```

use std::sync::Arc;

use super::{BatchExecutor, Claimer, LockSweeper, PollLoop};
use crate::domain::WorkerId;
use crate::ports::{Clock, GenerativeService, SystemClock, TaskStore};
use crate::settings::TaskSettings;
use crate::typed::{
    ChunkProcessor, ProcessorContext, ProcessorFactory, RegistryError, TaskKind, TaskProcessor,
    TaskRegistry,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("no task store was provided")]
    MissingStore,

    #[error("no generative service was provided")]
    MissingService,

    #[error("no task processor was provided")]
    MissingProcessor,

    #[error("no task settings were provided")]
    MissingSettings,

    #[error("processor handles `{processor}` but settings are for `{settings}`")]
    TaskMismatch { processor: String, settings: String },
}

pub struct WorkerBuilder {
    store: Option<Arc<dyn TaskStore>>,
    service: Option<Arc<dyn GenerativeService>>,
    factory: Option<ProcessorFactory>,
    settings: Option<TaskSettings>,
    worker_id: Option<WorkerId>,
    clock: Arc<dyn Clock>,
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            service: None,
            factory: None,
            settings: None,
            worker_id: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn service(mut self, service: Arc<dyn GenerativeService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn settings(mut self, settings: TaskSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Fixed worker identity. Generated from the clock when not set.
    pub fn worker_id(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Process chunks with a statically known task kind.
    pub fn task<K: TaskKind + Clone>(mut self, kind: K) -> Self {
        self.factory = Some(Arc::new(move |ctx| {
            Arc::new(TaskProcessor::new(kind.clone(), ctx)) as Arc<dyn ChunkProcessor>
        }));
        self
    }

    /// Process chunks with the task registered under `name`.
    pub fn task_from_registry(
        mut self,
        registry: &TaskRegistry,
        name: &str,
    ) -> Result<Self, RegistryError> {
        self.factory = Some(registry.factory(name)?);
        Ok(self)
    }

    pub fn build(self) -> Result<PollLoop, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let service = self.service.ok_or(BuildError::MissingService)?;
        let factory = self.factory.ok_or(BuildError::MissingProcessor)?;
        let settings = self.settings.ok_or(BuildError::MissingSettings)?;
        let worker_id = self
            .worker_id
            .unwrap_or_else(|| WorkerId::generate(self.clock.as_ref()));

        let processor = factory(ProcessorContext {
            store: store.clone(),
            service,
            worker_id: worker_id.clone(),
            model: settings.model.clone(),
            retry: settings.retry.clone(),
        });
        if processor.task_name() != settings.task {
            return Err(BuildError::TaskMismatch {
                processor: processor.task_name().to_string(),
                settings: settings.task,
            });
        }

        Ok(PollLoop::new(
            LockSweeper::new(store.clone(), settings.lease),
            Claimer::new(store, worker_id).with_oversample(settings.oversample),
            BatchExecutor::new(settings.concurrency, settings.chunk_size),
            processor,
            settings.batch_size,
            settings.idle_sleep,
        ))
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskTable, ValidationError};
    use crate::impls::{InMemoryTaskStore, ScriptedService};
    use serde_json::Value;

    #[derive(Clone)]
    struct Noop;

    impl TaskKind for Noop {
        const NAME: &'static str = "noop";
        type Payload = Value;
        type Output = Value;

        fn default_table(&self) -> TaskTable {
            TaskTable::new("rows", &["body"], "result")
        }

        fn build_prompt(&self, _payloads: &[Value]) -> String {
            "noop".into()
        }

        fn validate(&self, _payload: &Value, item: Value) -> Result<Value, ValidationError> {
            Ok(item)
        }
    }

    fn settings(task: &str) -> TaskSettings {
        TaskSettings::new(task, Noop.default_table()).unwrap()
    }

    fn complete_builder() -> WorkerBuilder {
        WorkerBuilder::new()
            .store(Arc::new(InMemoryTaskStore::new()))
            .service(Arc::new(ScriptedService::new()))
            .task(Noop)
            .settings(settings("noop"))
    }

    #[test]
    fn builds_with_all_parts() {
        let poll_loop = complete_builder()
            .worker_id(WorkerId::new("fixed"))
            .build()
            .unwrap();
        assert_eq!(poll_loop.task_name(), "noop");
        assert_eq!(poll_loop.worker_id().as_str(), "fixed");
    }

    #[test]
    fn generates_worker_id_when_absent() {
        let poll_loop = complete_builder().build().unwrap();
        assert!(poll_loop.worker_id().as_str().starts_with("worker-"));
    }

    #[test]
    fn missing_parts_fail_fast() {
        let no_store = WorkerBuilder::new()
            .service(Arc::new(ScriptedService::new()))
            .task(Noop)
            .settings(settings("noop"))
            .build();
        assert!(matches!(no_store, Err(BuildError::MissingStore)));

        let no_processor = WorkerBuilder::new()
            .store(Arc::new(InMemoryTaskStore::new()))
            .service(Arc::new(ScriptedService::new()))
            .settings(settings("noop"))
            .build();
        assert!(matches!(no_processor, Err(BuildError::MissingProcessor)));

        let no_settings = WorkerBuilder::new()
            .store(Arc::new(InMemoryTaskStore::new()))
            .service(Arc::new(ScriptedService::new()))
            .task(Noop)
            .build();
        assert!(matches!(no_settings, Err(BuildError::MissingSettings)));
    }

    #[test]
    fn settings_for_another_task_are_rejected() {
        let result = complete_builder().settings(settings("flashcards")).build();
        assert!(matches!(result, Err(BuildError::TaskMismatch { .. })));
    }

    #[test]
    fn registry_lookup_selects_processor() {
        let mut registry = TaskRegistry::new();
        registry.register(Noop).unwrap();

        let poll_loop = WorkerBuilder::new()
            .store(Arc::new(InMemoryTaskStore::new()))
            .service(Arc::new(ScriptedService::new()))
            .task_from_registry(&registry, "noop")
            .unwrap()
            .settings(settings("noop"))
            .build()
            .unwrap();
        assert_eq!(poll_loop.task_name(), "noop");

        assert!(
            WorkerBuilder::new()
                .task_from_registry(&registry, "missing")
                .is_err()
        );
    }
}
