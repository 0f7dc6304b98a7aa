//! Settings - 設定の読み込みとタスクごとの解決
//!
//! # ソース（後勝ち）
//! 1. 組み込みのデフォルト（serde default）
//! 2. TOML ファイル（`--config`、省略時は `quill.toml` があれば）
//! 3. 環境変数 `QUILL__SECTION__KEY`（例: `QUILL__WORKER__BATCH_SIZE=20`）
//!
//! `[tasks.<name>]` で worker セクションの任意のキーと対象テーブルを
//! タスク種別ごとに上書きできる。

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::app::{Backoff, RetryPolicy};
use crate::domain::{ConfigError, TaskTable, WorkerId};
use crate::ports::Clock;
use crate::typed::TaskRegistry;

pub const DEFAULT_CONFIG_FILE: &str = "quill.toml";
pub const ENV_PREFIX: &str = "QUILL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub service: ServiceSettings,

    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub tasks: HashMap<String, TaskOverrides>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Fixed worker identity. Generated per process when absent.
    pub id: Option<String>,
    pub model: String,
    pub batch_size: usize,
    pub chunk_size: usize,
    pub concurrency: usize,
    pub idle_sleep_secs: u64,
    pub lease_secs: u64,
    pub oversample: usize,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    /// Exponential retry backoff factor. Linear backoff when absent.
    pub backoff_multiplier: Option<f64>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            id: None,
            model: "gemini-2.0-flash".to_string(),
            batch_size: 50,
            chunk_size: 10,
            concurrency: 4,
            idle_sleep_secs: 30,
            lease_secs: 15 * 60,
            oversample: 2,
            max_attempts: 3,
            retry_base_ms: 1000,
            backoff_multiplier: None,
        }
    }
}

/// Per task type overrides (`[tasks.<name>]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOverrides {
    pub model: Option<String>,
    pub batch_size: Option<usize>,
    pub chunk_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub idle_sleep_secs: Option<u64>,
    pub lease_secs: Option<u64>,
    pub oversample: Option<usize>,
    pub max_attempts: Option<u32>,
    pub retry_base_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub table: Option<TaskTable>,
}

/// Fully resolved, validated settings for one task type.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSettings {
    pub task: String,
    pub table: TaskTable,
    pub model: String,
    pub batch_size: usize,
    pub chunk_size: usize,
    pub concurrency: usize,
    pub idle_sleep: Duration,
    pub lease: chrono::Duration,
    pub oversample: usize,
    pub retry: RetryPolicy,
}

impl TaskSettings {
    /// Worker defaults applied to `table`, validated.
    pub fn new(task: impl Into<String>, table: TaskTable) -> Result<Self, ConfigError> {
        Settings::default().task_settings(&task.into(), table)
    }
}

impl Settings {
    /// Load from defaults, the TOML file and the environment.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Parse a TOML document only (no file, no environment).
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        non_blank(self.database.url.as_deref()).ok_or(ConfigError::Missing("database.url"))
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        non_blank(self.service.api_key.as_deref()).ok_or(ConfigError::Missing("service.api_key"))
    }

    pub fn worker_id(&self, clock: &dyn Clock) -> WorkerId {
        match non_blank(self.worker.id.as_deref()) {
            Some(id) => WorkerId::new(id),
            None => WorkerId::generate(clock),
        }
    }

    /// Resolve a registered task type, using its built-in table as the default.
    pub fn resolve_task(
        &self,
        registry: &TaskRegistry,
        task: &str,
    ) -> Result<TaskSettings, ConfigError> {
        let default_table = registry
            .default_table(task)
            .map_err(|_| ConfigError::UnknownTask(task.to_string()))?;
        self.task_settings(task, default_table)
    }

    /// Merge `[worker]` with `[tasks.<task>]` and validate the result.
    /// `default_table` is used unless the task section names its own table.
    pub fn task_settings(
        &self,
        task: &str,
        default_table: TaskTable,
    ) -> Result<TaskSettings, ConfigError> {
        let base = &self.worker;
        let over = self.tasks.get(task).cloned().unwrap_or_default();

        let table = over.table.unwrap_or(default_table);
        table.validate()?;

        let lease_secs = positive("lease_secs", over.lease_secs.unwrap_or(base.lease_secs))?;
        let lease = i64::try_from(lease_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| invalid("lease_secs", "out of range"))?;

        let mut retry = RetryPolicy::new(
            positive("max_attempts", over.max_attempts.unwrap_or(base.max_attempts))?,
            Duration::from_millis(over.retry_base_ms.unwrap_or(base.retry_base_ms)),
        );
        if let Some(multiplier) = over.backoff_multiplier.or(base.backoff_multiplier) {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(invalid("backoff_multiplier", "must be a finite number >= 1"));
            }
            retry = retry.with_backoff(Backoff::Exponential { multiplier });
        }

        let resolved = TaskSettings {
            task: task.to_string(),
            table,
            model: over.model.unwrap_or_else(|| base.model.clone()),
            batch_size: positive("batch_size", over.batch_size.unwrap_or(base.batch_size))?,
            chunk_size: positive("chunk_size", over.chunk_size.unwrap_or(base.chunk_size))?,
            concurrency: positive("concurrency", over.concurrency.unwrap_or(base.concurrency))?,
            idle_sleep: Duration::from_secs(over.idle_sleep_secs.unwrap_or(base.idle_sleep_secs)),
            lease,
            oversample: positive("oversample", over.oversample.unwrap_or(base.oversample))?,
            retry,
        };

        if resolved.model.trim().is_empty() {
            return Err(invalid("model", "must not be empty"));
        }
        Ok(resolved)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn positive<T: PartialEq + Default>(key: &str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn table() -> TaskTable {
        TaskTable::new("questions", &["question"], "subject")
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let settings = Settings::from_toml_str("").unwrap();
        let task = settings.task_settings("t", table()).unwrap();

        assert_eq!(task.batch_size, 50);
        assert_eq!(task.chunk_size, 10);
        assert_eq!(task.concurrency, 4);
        assert_eq!(task.oversample, 2);
        assert_eq!(task.lease, chrono::Duration::minutes(15));
        assert_eq!(task.retry.max_attempts, 3);
        assert_eq!(task.table, table());
    }

    #[test]
    fn task_section_overrides_worker_section() {
        let settings = Settings::from_toml_str(
            r#"
            [worker]
            batch_size = 40
            model = "base-model"

            [tasks.flashcards]
            batch_size = 5
            chunk_size = 1

            [tasks.flashcards.table]
            table = "content.topics"
            payload_columns = ["topic", "level"]
            result_column = "flashcards"
            filter = "archived = false"
            "#,
        )
        .unwrap();

        let cards = settings.task_settings("flashcards", table()).unwrap();
        assert_eq!(cards.batch_size, 5);
        assert_eq!(cards.chunk_size, 1);
        assert_eq!(cards.model, "base-model");
        assert_eq!(cards.table.table, "content.topics");
        assert_eq!(cards.table.owner_column, "locked_by");
        assert_eq!(cards.table.filter.as_deref(), Some("archived = false"));

        let other = settings.task_settings("other", table()).unwrap();
        assert_eq!(other.batch_size, 40);
        assert_eq!(other.table, table());
    }

    #[rstest]
    #[case("[worker]\nbatch_size = 0", "batch_size")]
    #[case("[worker]\nchunk_size = 0", "chunk_size")]
    #[case("[worker]\nconcurrency = 0", "concurrency")]
    #[case("[tasks.t]\nlease_secs = 0", "lease_secs")]
    fn zero_sizes_are_rejected(#[case] toml: &str, #[case] expected_key: &str) {
        let settings = Settings::from_toml_str(toml).unwrap();
        match settings.task_settings("t", table()) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected invalid {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn oversized_lease_is_rejected_without_panicking() {
        let settings = Settings::from_toml_str("[worker]\nlease_secs = 10000000000000000").unwrap();
        match settings.task_settings("t", table()) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "lease_secs"),
            other => panic!("expected invalid lease_secs, got {other:?}"),
        }
    }

    #[test]
    fn backoff_multiplier_selects_exponential_backoff() {
        let settings = Settings::from_toml_str(
            r#"
            [worker]
            backoff_multiplier = 2.0

            [tasks.slow]
            backoff_multiplier = 3.0
            "#,
        )
        .unwrap();

        let task = settings.task_settings("t", table()).unwrap();
        assert_eq!(task.retry.backoff, Backoff::Exponential { multiplier: 2.0 });
        let slow = settings.task_settings("slow", table()).unwrap();
        assert_eq!(slow.retry.backoff, Backoff::Exponential { multiplier: 3.0 });

        let linear = Settings::default().task_settings("t", table()).unwrap();
        assert_eq!(linear.retry.backoff, Backoff::Linear);
    }

    #[rstest]
    #[case("[worker]\nbackoff_multiplier = 0.5")]
    #[case("[worker]\nbackoff_multiplier = -2.0")]
    #[case("[tasks.t]\nbackoff_multiplier = inf")]
    #[case("[tasks.t]\nbackoff_multiplier = nan")]
    fn unusable_backoff_multiplier_is_rejected(#[case] toml: &str) {
        let settings = Settings::from_toml_str(toml).unwrap();
        match settings.task_settings("t", table()) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "backoff_multiplier"),
            other => panic!("expected invalid backoff_multiplier, got {other:?}"),
        }
    }

    #[test]
    fn resolve_task_uses_registered_table() {
        let registry = crate::tasks::builtin_registry().unwrap();
        let settings = Settings::default();

        let task = settings
            .resolve_task(&registry, "subject_classification")
            .unwrap();
        assert_eq!(task.task, "subject_classification");

        match settings.resolve_task(&registry, "summaries") {
            Err(ConfigError::UnknownTask(name)) => assert_eq!(name, "summaries"),
            other => panic!("expected unknown task, got {other:?}"),
        }
    }

    #[test]
    fn invalid_table_override_is_rejected() {
        let settings = Settings::from_toml_str(
            r#"
            [tasks.t.table]
            table = "questions; drop table x"
            payload_columns = ["question"]
            result_column = "subject"
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.task_settings("t", table()),
            Err(ConfigError::InvalidTable(_))
        ));
    }

    #[test]
    fn required_secrets_are_reported_by_key() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.require_database_url(),
            Err(ConfigError::Missing("database.url"))
        ));
        assert!(matches!(
            settings.require_api_key(),
            Err(ConfigError::Missing("service.api_key"))
        ));

        settings.database.url = Some("postgres://localhost/quill".into());
        settings.service.api_key = Some("  ".into());
        assert_eq!(
            settings.require_database_url().unwrap(),
            "postgres://localhost/quill"
        );
        assert!(settings.require_api_key().is_err());
    }

    #[test]
    fn example_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../quill.example.toml");
        let settings = Settings::load(Some(&path)).unwrap();

        let task = settings
            .task_settings("subject_classification", table())
            .unwrap();
        assert_eq!(task.table.table, "content.questions");
        assert_eq!(task.table.result_column, "subject_label");
        assert_eq!(settings.task_settings("flashcards", table()).unwrap().chunk_size, 1);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/quill.toml"))).is_err());
    }

    #[test]
    fn configured_worker_id_wins() {
        let mut settings = Settings::default();
        settings.worker.id = Some("node-7".into());
        assert_eq!(settings.worker_id(&crate::ports::SystemClock).as_str(), "node-7");

        settings.worker.id = None;
        assert!(settings.worker_id(&crate::ports::SystemClock).as_str().starts_with("worker-"));
    }
}
