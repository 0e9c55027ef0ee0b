//! `taskdash-server` -- in-memory reference task service.
//!
//! Serves the task REST API the `taskdash` client talks to. Tasks are kept
//! in memory and lost on exit.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 127.0.0.1:5000 without authentication
//! cargo run --bin taskdash-server
//!
//! # Require a bearer token
//! cargo run --bin taskdash-server -- --bind 0.0.0.0:5000 --token s3cret
//! ```

use std::sync::Arc;

use clap::Parser;
use taskdash_server::api::{self, ApiState};
use taskdash_server::config::{ServerCliArgs, ServerConfig};

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        auth = config.token.is_some(),
        "starting task service"
    );

    let state = Arc::new(ApiState::new(config.token.clone()));

    match api::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "task service listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task service task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start task service");
            std::process::exit(1);
        }
    }
}
