//! Worker management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use audithub_core::config::AppConfig;
use audithub_core::error::AppError;
use audithub_entity::QueueStats;

use crate::output::{self, OutputFormat};

/// Arguments for worker commands
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Worker subcommand
    #[command(subcommand)]
    pub command: WorkerCommand,
}

/// Worker subcommands
#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Show queue health and worker settings
    Status,
}

#[derive(Debug, Serialize)]
struct WorkerStatus<'a> {
    queue_provider: &'a str,
    queue_healthy: bool,
    worker_enabled: bool,
    concurrency: usize,
    executor_command: &'a str,
    timeout_seconds: u64,
    stats: QueueStats,
}

/// Execute worker commands
pub async fn execute(args: &WorkerArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        WorkerCommand::Status => {
            let service = super::connect_service(config).await?;
            let queue_healthy = service.health_check().await.is_ok();
            let stats = service.get_stats().await?;

            let status = WorkerStatus {
                queue_provider: &config.queue.provider,
                queue_healthy,
                worker_enabled: config.worker.enabled,
                concurrency: config.worker.concurrency,
                executor_command: &config.executor.command,
                timeout_seconds: config.executor.timeout_seconds,
                stats,
            };

            match format {
                OutputFormat::Json => output::print_json(&status),
                OutputFormat::Table => {
                    println!("Worker Queue Status:");
                    output::print_kv("Queue provider", status.queue_provider);
                    output::print_kv("Queue healthy", &status.queue_healthy.to_string());
                    output::print_kv("Waiting", &stats.waiting.to_string());
                    output::print_kv("Delayed", &stats.delayed.to_string());
                    output::print_kv("Active", &stats.active.to_string());
                    output::print_kv("Completed", &stats.completed.to_string());
                    output::print_kv("Failed", &stats.failed.to_string());
                    output::print_kv("Worker Enabled", &status.worker_enabled.to_string());
                    output::print_kv("Concurrency", &status.concurrency.to_string());
                    output::print_kv("Executor", status.executor_command);
                    output::print_kv("Audit timeout", &format!("{}s", status.timeout_seconds));
                }
            }
        }
    }
    Ok(())
}
