//! Configuration system for the `taskdash` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskdash/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskdash_proto::task::{Category, Priority, TaskStatus};

use crate::engine::{DEFAULT_EVENT_CAPACITY, DEFAULT_INTENT_CAPACITY, EngineConfig};
use crate::gateway::http::{ApiConfig, DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::tasks::{FilterPatch, FilterValue};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    engine: EngineFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    url: Option<String>,
    token: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[engine]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct EngineFileConfig {
    intent_capacity: Option<usize>,
    event_capacity: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the task service API.
    pub api_url: String,
    /// Bearer credential sent with every request.
    pub token: Option<String>,
    pub request_timeout: Duration,
    /// Capacity of the engine's intent queue.
    pub intent_capacity: usize,
    /// Lifecycle events buffered per subscriber.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            intent_capacity: DEFAULT_INTENT_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit `--config` file cannot be
    /// read, or if any config file that exists cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            api_url: cli
                .api_url
                .clone()
                .or_else(|| file.api.url.clone())
                .unwrap_or(defaults.api_url),
            token: cli.token.clone().or_else(|| file.api.token.clone()),
            request_timeout: cli
                .timeout_secs
                .or(file.api.request_timeout_secs)
                .map_or(defaults.request_timeout, Duration::from_secs),
            intent_capacity: file
                .engine
                .intent_capacity
                .unwrap_or(defaults.intent_capacity),
            event_capacity: file
                .engine
                .event_capacity
                .unwrap_or(defaults.event_capacity),
        }
    }

    /// Connection settings for the HTTP gateway.
    #[must_use]
    pub fn to_api_config(&self) -> ApiConfig {
        ApiConfig {
            url: self.api_url.clone(),
            token: self.token.clone(),
            request_timeout: self.request_timeout,
        }
    }

    #[must_use]
    pub const fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            intent_capacity: self.intent_capacity,
            event_capacity: self.event_capacity,
        }
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task dashboard client")]
pub struct CliArgs {
    /// Base URL of the task service API.
    #[arg(long, env = "TASKDASH_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token for the task service.
    #[arg(long, env = "TASKDASH_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Path to config file (default: `~/.config/taskdash/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Work against built-in sample tasks instead of the service.
    #[arg(long, global = true)]
    pub demo: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", env = "TASKDASH_LOG", global = true)]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Dashboard actions.
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the task board.
    List(FilterArgs),
    /// Show task statistics.
    Stats(FilterArgs),
    /// Create a task.
    Add(AddArgs),
    /// Change fields of a task.
    Update(UpdateArgs),
    /// Delete a task.
    Delete {
        /// Task id.
        id: String,
    },
}

impl Default for Command {
    fn default() -> Self {
        Self::List(FilterArgs::default())
    }
}

/// Filter selection shared by `list` and `stats`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Status to show: all, todo, inprogress, done.
    #[arg(long)]
    pub status: Option<FilterValue<TaskStatus>>,
    /// Priority to show: all, high, medium, low.
    #[arg(long)]
    pub priority: Option<FilterValue<Priority>>,
    /// Category to show: all, work, personal, urgent, other.
    #[arg(long)]
    pub category: Option<FilterValue<Category>>,
}

impl FilterArgs {
    #[must_use]
    pub const fn to_patch(&self) -> FilterPatch {
        FilterPatch {
            status: self.status,
            priority: self.priority,
            category: self.category,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct AddArgs {
    /// Task title.
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    /// high, medium or low (default: medium).
    #[arg(long)]
    pub priority: Option<Priority>,
    /// work, personal, urgent or other (default: other).
    #[arg(long)]
    pub category: Option<Category>,
    /// Due date in RFC 3339 form, e.g. `2025-01-31T17:00:00Z`.
    #[arg(long)]
    pub due: Option<DateTime<Utc>>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Task id.
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// todo, inprogress or done.
    #[arg(long)]
    pub status: Option<TaskStatus>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub category: Option<Category>,
    /// New due date in RFC 3339 form.
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<DateTime<Utc>>,
    /// Remove the due date.
    #[arg(long)]
    pub clear_due: bool,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(path) = explicit_path {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("taskdash").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
