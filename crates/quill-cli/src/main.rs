use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{error, info};

use quill_core::app::{LockSweeper, WorkerBuilder};
use quill_core::impls::{InMemoryTaskStore, ScriptedService};
use quill_core::observability::{init_logging, log_format_from_env};
use quill_core::ports::{GenerationRequest, SystemClock, TaskStore};
use quill_core::settings::{Settings, TaskSettings};
use quill_core::tasks::{SubjectClassification, builtin_registry};
use quill_core::typed::{TaskKind, TaskRegistry};
use quill_gemini::GeminiService;
use quill_pg::PgTaskStore;

#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Batch content enrichment workers")]
struct Cli {
    /// path to a TOML config file (default: ./quill.toml if present)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the poll loop for one task type until ctrl-c
    Run {
        #[arg(long)]
        task: String,

        /// run a single cycle and print its report
        #[arg(long)]
        once: bool,
    },

    /// Clear expired claims on a task table
    Sweep {
        #[arg(long)]
        task: String,
    },

    /// Print pending/claimed/done counts for a task table
    Stats {
        #[arg(long)]
        task: String,
    },

    /// List registered task types and their default tables
    Tasks,

    /// Run subject_classification against an in-memory table (no network)
    Demo {
        #[arg(long, default_value_t = 25)]
        rows: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(log_format_from_env());

    let registry = builtin_registry()?;
    match cli.command {
        Command::Run { task, once } => {
            let settings = Settings::load(cli.config.as_deref())?;
            run(&settings, &registry, &task, once).await
        }
        Command::Sweep { task } => {
            let settings = Settings::load(cli.config.as_deref())?;
            let (store, task_settings) = open_store(&settings, &registry, &task)?;
            let swept = LockSweeper::new(store, task_settings.lease).sweep().await?;
            println!("{}", json!({ "task": task, "swept": swept }));
            Ok(())
        }
        Command::Stats { task } => {
            let settings = Settings::load(cli.config.as_deref())?;
            let (store, _) = open_store(&settings, &registry, &task)?;
            let stats = store.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Command::Tasks => {
            for name in registry.registered_types() {
                let table = registry.default_table(name)?;
                println!(
                    "{name}\t{}.{} <- [{}]",
                    table.table,
                    table.result_column,
                    table.payload_columns.join(", ")
                );
            }
            Ok(())
        }
        Command::Demo { rows } => demo(rows).await,
    }
}

fn task_settings(
    settings: &Settings,
    registry: &TaskRegistry,
    task: &str,
) -> anyhow::Result<TaskSettings> {
    settings
        .resolve_task(registry, task)
        .with_context(|| format!("known tasks: {:?}", registry.registered_types()))
}

fn open_store(
    settings: &Settings,
    registry: &TaskRegistry,
    task: &str,
) -> anyhow::Result<(Arc<dyn TaskStore>, TaskSettings)> {
    let task_settings = task_settings(settings, registry, task)?;
    let store = PgTaskStore::connect_lazy(
        settings.require_database_url()?,
        settings.database.max_connections,
        task_settings.table.clone(),
    )?;
    let store: Arc<dyn TaskStore> = Arc::new(store);
    Ok((store, task_settings))
}

async fn run(
    settings: &Settings,
    registry: &TaskRegistry,
    task: &str,
    once: bool,
) -> anyhow::Result<()> {
    let api_key = settings.require_api_key()?;
    let (store, task_settings) = open_store(settings, registry, task)?;
    let service = GeminiService::new(
        settings.service.endpoint.clone(),
        api_key,
        Duration::from_secs(settings.service.timeout_secs),
    )?;

    let mut poll_loop = WorkerBuilder::new()
        .store(store)
        .service(Arc::new(service))
        .task_from_registry(registry, task)?
        .settings(task_settings)
        .worker_id(settings.worker_id(&SystemClock))
        .build()?;

    if once {
        let report = poll_loop.run_cycle().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received, stopping after the current cycle");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                error!(error = %err, "cannot listen for ctrl-c");
                // keep the sender alive so the loop is not stopped
                std::future::pending::<()>().await;
            }
        }
    });

    poll_loop.run(shutdown_rx).await;
    Ok(())
}

/// Count the numbered question lines of a subject_classification prompt.
fn listed_questions(request: &GenerationRequest) -> usize {
    request
        .prompt
        .lines()
        .filter(|line| {
            line.split_once(". ")
                .is_some_and(|(n, _)| n.parse::<usize>().is_ok())
        })
        .count()
}

async fn demo(rows: i64) -> anyhow::Result<()> {
    let kind = SubjectClassification::default();
    let subjects = kind.subjects();

    let store = Arc::new(InMemoryTaskStore::new());
    store
        .insert_pending((1..=rows).map(|i| (i, json!({ "question": format!("Demo question #{i}") }))))
        .await;

    let service = Arc::new(ScriptedService::with_responder(move |request| {
        let items: Vec<Value> = (0..listed_questions(request))
            .map(|i| json!({ "subject": subjects[i % subjects.len()], "confidence": 0.75 }))
            .collect();
        Ok(format!("```json\n{}\n```", Value::Array(items)))
    }));

    let mut task_settings = TaskSettings::new(SubjectClassification::NAME, kind.default_table())?;
    task_settings.batch_size = 10;
    task_settings.chunk_size = 4;
    task_settings.concurrency = 2;

    let mut poll_loop = WorkerBuilder::new()
        .store(store.clone())
        .service(service.clone())
        .task(kind)
        .settings(task_settings)
        .build()?;

    loop {
        let report = poll_loop.run_cycle().await?;
        if report.is_idle() {
            break;
        }
        info!(
            claimed = report.claimed,
            completed = report.completed,
            released = report.released,
            "demo cycle finished"
        );
    }

    let stats = store.stats().await?;
    println!(
        "{}",
        json!({ "stats": stats, "service_calls": service.call_count() })
    );
    Ok(())
}
