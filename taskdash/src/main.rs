//! `taskdash` -- task dashboard client.
//!
//! Loads the task list from the task service, optionally changes it, and
//! prints the status board with its statistics. Configuration via CLI flags,
//! environment variables, or config file (`~/.config/taskdash/config.toml`).
//!
//! ```bash
//! # Offline demo with sample tasks
//! cargo run --bin taskdash -- --demo list
//!
//! # Against a running service
//! TASKDASH_TOKEN=... cargo run --bin taskdash -- list --status todo
//! cargo run --bin taskdash -- add "Write release notes" --priority high
//! cargo run --bin taskdash -- update <id> --status done
//! ```

use std::path::Path;
use std::process::ExitCode;

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing_appender::non_blocking::WorkerGuard;

use taskdash::config::{AddArgs, CliArgs, ClientConfig, Command, UpdateArgs};
use taskdash::engine::{EngineError, EngineHandle, Intent, Snapshot, spawn_engine};
use taskdash::gateway::http::HttpGateway;
use taskdash::gateway::memory::InMemoryGateway;
use taskdash::gateway::{GatewayError, TaskGateway};
use taskdash::lifecycle::{OperationKind, Phase};
use taskdash::tasks::TaskStats;
use taskdash_proto::task::{
    Category, Priority, Task, TaskDraft, TaskId, TaskPatch, TaskStatus, ValidationError,
};

/// Failures reported to the user before exiting non-zero.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{kind} failed: {message}")]
    Rejected {
        kind: OperationKind,
        message: String,
    },
    #[error("{0}")]
    Usage(&'static str),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.clone().unwrap_or_default();
    let result = if cli.demo {
        run(
            InMemoryGateway::with_tasks(demo_tasks(Utc::now())),
            &config,
            command,
        )
        .await
    } else {
        match HttpGateway::new(&config.to_api_config()) {
            Ok(gateway) => run(gateway, &config, command).await,
            Err(e) => Err(e.into()),
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging to stderr, or to `file_path` when given.
///
/// Returns a [`WorkerGuard`] for file logging that must be held until
/// shutdown so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some(log_path) = file_path else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run<G>(gateway: G, config: &ClientConfig, command: Command) -> Result<(), CliError>
where
    G: TaskGateway + 'static,
{
    let (engine, task) = spawn_engine(gateway, &config.to_engine_config());

    perform(&engine, Intent::FetchAll, OperationKind::FetchAll).await?;

    let show_stats_only = matches!(command, Command::Stats(_));
    match command {
        Command::List(filters) | Command::Stats(filters) => {
            engine.send(Intent::SetFilter(filters.to_patch())).await?;
        }
        Command::Add(args) => {
            let draft = draft_from(args);
            draft.validate()?;
            perform(&engine, Intent::Create(draft), OperationKind::Create).await?;
        }
        Command::Update(args) => {
            let (id, patch) = patch_from(args);
            if patch.is_empty() {
                return Err(CliError::Usage("nothing to update; pass at least one field"));
            }
            patch.validate()?;
            perform(&engine, Intent::Update { id, patch }, OperationKind::Update).await?;
        }
        Command::Delete { id } => {
            perform(&engine, Intent::Delete(TaskId::new(id)), OperationKind::Delete).await?;
        }
    }

    // Intents are handled in order, so once the engine has stopped the last
    // published snapshot reflects everything sent above.
    engine.send(Intent::Shutdown).await?;
    if let Err(e) = task.await {
        tracing::error!(error = %e, "engine task failed");
    }

    let snapshot = engine.snapshot();
    if show_stats_only {
        print_stats(&snapshot.stats);
    } else {
        print_board(&snapshot, Utc::now());
    }
    Ok(())
}

/// Sends an intent and waits until the operation it starts has settled.
async fn perform(
    engine: &EngineHandle,
    intent: Intent,
    kind: OperationKind,
) -> Result<Snapshot, CliError> {
    let mut events = engine.lifecycle();
    engine.send(intent).await?;

    let mut operation = None;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "lifecycle events skipped");
                continue;
            }
            Err(RecvError::Closed) => return Err(EngineError::Closed.into()),
        };

        match (operation, event.phase) {
            (None, Phase::Pending) if event.kind == kind => operation = Some(event.id),
            (Some(id), Phase::Fulfilled) if id == event.id => return Ok(engine.snapshot()),
            (Some(id), Phase::Rejected) if id == event.id => {
                let message = engine.snapshot().error.unwrap_or_default();
                return Err(CliError::Rejected { kind, message });
            }
            _ => {}
        }
    }
}

fn draft_from(args: AddArgs) -> TaskDraft {
    TaskDraft {
        title: args.title,
        description: args.description,
        priority: args.priority.unwrap_or_default(),
        category: args.category.unwrap_or_default(),
        due_date: args.due,
    }
}

fn patch_from(args: UpdateArgs) -> (TaskId, TaskPatch) {
    let due_date = if args.clear_due {
        Some(None)
    } else {
        args.due.map(Some)
    };
    let patch = TaskPatch {
        title: args.title,
        description: args.description,
        status: args.status,
        priority: args.priority,
        category: args.category,
        due_date,
    };
    (TaskId::new(args.id), patch)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

const fn column_title(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "To Do",
        TaskStatus::InProgress => "In Progress",
        TaskStatus::Done => "Done",
    }
}

fn print_board(snapshot: &Snapshot, now: DateTime<Utc>) {
    if !snapshot.filters.is_unfiltered() {
        println!("Filters: {}", snapshot.filters);
        println!();
    }
    for (status, tasks) in snapshot.columns() {
        println!("{} ({})", column_title(status), tasks.len());
        if tasks.is_empty() {
            println!("  No tasks");
        }
        for task in tasks {
            println!("  {}", task_line(task, now));
        }
        println!();
    }
    print_stats(&snapshot.stats);
}

fn task_line(task: &Task, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "{}  {}  [{}/{}]",
        task.id,
        task.title,
        task.priority.map_or("-", Priority::as_str),
        task.category.map_or("-", Category::as_str),
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {}", due.format("%Y-%m-%d")));
        if task.is_overdue(now) {
            line.push_str(" (overdue)");
        }
    }
    line
}

fn print_stats(stats: &TaskStats) {
    println!(
        "Total: {}  In progress: {}  Completed: {}  Overdue: {}",
        stats.total, stats.in_progress, stats.completed, stats.overdue
    );
}

/// Sample board used by `--demo`.
fn demo_tasks(now: DateTime<Utc>) -> Vec<Task> {
    vec![
        Task::new("demo-1", "Design landing page")
            .with_priority(Priority::High)
            .with_category(Category::Work)
            .with_due_date(now + Duration::days(3)),
        Task::new("demo-2", "Fix login redirect")
            .with_status(TaskStatus::InProgress)
            .with_priority(Priority::High)
            .with_category(Category::Urgent)
            .with_due_date(now - Duration::days(1)),
        Task::new("demo-3", "Book dentist appointment")
            .with_priority(Priority::Low)
            .with_category(Category::Personal),
        Task::new("demo-4", "Write quarterly report")
            .with_status(TaskStatus::InProgress)
            .with_category(Category::Work)
            .with_due_date(now + Duration::days(10)),
        Task::new("demo-5", "Renew domain")
            .with_status(TaskStatus::Done)
            .with_category(Category::Other)
            .with_due_date(now - Duration::days(5)),
    ]
}
