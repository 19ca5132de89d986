//! AuditHub runner: performs exactly one audit per process.
//!
//! Reads a single `RUN_AUDIT` line from stdin, runs Lighthouse, writes a
//! single `AUDIT_RESULT` line to stdout and then waits until the parent
//! closes stdin or kills the process. All logging goes to stderr.

mod lighthouse;
mod report;

use std::any::Any;
use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing_subscriber::{EnvFilter, fmt};

use audithub_entity::audit::{AuditOutcome, RunnerMessage, RunnerRequest};

use crate::lighthouse::Lighthouse;

static CURRENT_URL: OnceLock<String> = OnceLock::new();
static REPORTED: AtomicBool = AtomicBool::new(false);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    install_panic_hook();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let request = match read_request(&mut lines).await {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("Invalid audit request: {}", e);
            std::process::exit(2);
        }
    };

    let RunnerRequest::RunAudit { url, options } = request;
    let _ = CURRENT_URL.set(url.clone());
    tracing::info!(url = %url, categories = ?options.categories, "Audit requested");

    let outcome = Lighthouse::from_env().audit(&url, &options).await;
    if let Err(e) = write_result(outcome) {
        tracing::error!("Failed to report audit result: {}", e);
        std::process::exit(1);
    }

    while let Ok(Some(_)) = lines.next_line().await {}
}

/// Logs go to stderr; stdout carries the protocol.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Report panics to the parent as a failed audit before the process dies.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let message = panic_message(info.payload());
        let location = info.location().map(|l| l.to_string());
        let url = CURRENT_URL.get().cloned().unwrap_or_default();

        let _ = write_result(AuditOutcome::failure(url, message, location));
        default_hook(info);
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "runner panicked".to_string())
}

/// First non-blank line, decoded as a request.
async fn read_request<R>(lines: &mut Lines<R>) -> Result<RunnerRequest, String>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? {
        if line.trim().is_empty() {
            continue;
        }
        return serde_json::from_str(&line).map_err(|e| e.to_string());
    }
    Err("stdin closed before a request arrived".to_string())
}

fn write_result(result: AuditOutcome) -> std::io::Result<()> {
    write_once(&mut std::io::stdout().lock(), &REPORTED, result).map(|_| ())
}

/// Write the result line unless one was already written.
///
/// Returns whether this call wrote it.
fn write_once<W: Write>(out: &mut W, reported: &AtomicBool, result: AuditOutcome) -> std::io::Result<bool> {
    if reported.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }
    let line = RunnerMessage::AuditResult { result }.to_line()?;
    out.write_all(line.as_bytes())?;
    out.flush()?;
    Ok(true)
}
