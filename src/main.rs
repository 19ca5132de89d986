//! AuditHub Server: audit job orchestration daemon
//!
//! Main entry point that wires the queue, worker pool and scheduler
//! together and drains them on shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use audithub_core::config::AppConfig;
use audithub_core::error::AppError;
use audithub_queue::JobQueue;
use audithub_service::{BatchTracker, RetentionService};
use audithub_worker::{
    CronScheduler, LoggingObserver, ProcessExecutor, WebhookNotifier, WorkerMetrics, WorkerPool,
};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("AUDITHUB_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("AUDITHUB_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting AuditHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Work queue ───────────────────────────────────────
    tracing::info!(
        "Connecting work queue (provider: {})...",
        config.queue.provider
    );
    let queue = JobQueue::from_config(&config.queue).await?;
    queue.health_check().await?;
    let stats = queue.stats().await?;
    tracing::info!(
        waiting = stats.waiting,
        delayed = stats.delayed,
        active = stats.active,
        "Work queue ready"
    );

    // ── Step 2: Batch tracker + retention ────────────────────────
    let batches = Arc::new(BatchTracker::new(queue.clone()));
    let retention = Arc::new(RetentionService::new(
        queue.clone(),
        Arc::clone(&batches),
        config.retention.clone(),
    ));

    // ── Step 3: Scheduled tasks ──────────────────────────────────
    let mut scheduler = CronScheduler::new().await?;
    scheduler
        .register_stalled_recovery(queue.clone(), &config.worker.stalled_check_schedule)
        .await?;
    if config.retention.enabled {
        scheduler
            .register_retention(Arc::clone(&retention), &config.retention.schedule)
            .await?;
    } else {
        tracing::info!("Scheduled retention sweep disabled");
    }
    scheduler.start().await?;

    // ── Step 4: Worker pool ──────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(WorkerMetrics::new());

    let worker_handle = if config.worker.enabled {
        let worker_id = format!("worker-{}", std::process::id());
        let executor = Arc::new(ProcessExecutor::from_config(&config.executor));
        let notifier = Arc::new(WebhookNotifier::new(&config.webhook)?);

        let pool = WorkerPool::new(
            queue.clone(),
            executor,
            notifier,
            config.worker.clone(),
            worker_id,
        )
        .with_observer(Arc::new(LoggingObserver))
        .with_observer(metrics.clone());

        let handle = tokio::spawn(async move { pool.run(shutdown_rx).await });
        tracing::info!(
            "Worker pool started (concurrency: {}, executor: {})",
            config.worker.concurrency,
            config.executor.command
        );
        Some(handle)
    } else {
        tracing::info!("Worker pool disabled");
        None
    };

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, draining workers...");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = worker_handle {
        match handle.await {
            Ok(report) if report.abandoned > 0 => tracing::warn!(
                abandoned = report.abandoned,
                "Jobs left active; they will be recovered once their lease expires"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!("Worker pool task failed: {}", e),
        }
    }

    scheduler.shutdown().await?;

    let snapshot = metrics.snapshot();
    tracing::info!(
        completed = snapshot.completed,
        failed = snapshot.failed,
        retried = snapshot.retried,
        avg_duration_ms = snapshot.avg_duration_ms,
        "AuditHub shut down gracefully"
    );
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
