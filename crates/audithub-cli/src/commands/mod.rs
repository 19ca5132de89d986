//! CLI command definitions and dispatch.

pub mod cleanup;
pub mod job;
pub mod stats;
pub mod submit;
pub mod worker;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use audithub_core::config::AppConfig;
use audithub_core::error::AppError;
use audithub_queue::JobQueue;
use audithub_service::{AuditService, BatchTracker, RetentionService};

use crate::output::{self, OutputFormat};

/// AuditHub: page audit orchestration
#[derive(Debug, Parser)]
#[command(name = "audithub", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Queue a page audit
    Submit(submit::SubmitArgs),
    /// Show one job
    Job(job::JobArgs),
    /// Show queue statistics
    Stats,
    /// Remove every finished job
    Cleanup,
    /// Worker management
    Worker(worker::WorkerArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(&self.config)?;
        match &self.command {
            Commands::Submit(args) => submit::execute(args, &config, self.format).await,
            Commands::Job(args) => job::execute(args, &config, self.format).await,
            Commands::Stats => stats::execute(&config, self.format).await,
            Commands::Cleanup => cleanup::execute(&config, self.format).await,
            Commands::Worker(args) => worker::execute(args, &config, self.format).await,
        }
    }
}

/// Helper: load configuration from file and environment
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    let env = std::env::var("AUDITHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(config_path, &env)
}

/// Helper: connect the queue and build the submission facade over it
pub async fn connect_service(config: &AppConfig) -> Result<AuditService, AppError> {
    if config.queue.provider == "memory" {
        output::print_warning(
            "queue.provider is 'memory'; this command only sees jobs created by itself",
        );
    }
    let queue = JobQueue::from_config(&config.queue).await?;
    let batches = Arc::new(BatchTracker::new(queue.clone()));
    let retention = Arc::new(RetentionService::new(
        queue.clone(),
        Arc::clone(&batches),
        config.retention.clone(),
    ));
    Ok(AuditService::new(queue, batches, retention))
}
