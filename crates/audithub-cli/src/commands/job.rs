//! Job inspection command.

use clap::Args;

use audithub_core::config::AppConfig;
use audithub_core::error::AppError;
use audithub_entity::JobView;

use crate::output::{self, OutputFormat};

/// Arguments for `job`
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job id
    pub id: String,
}

pub async fn execute(args: &JobArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let service = super::connect_service(config).await?;
    let job = service.get_job(&args.id).await?;

    match format {
        OutputFormat::Json => output::print_json(&job),
        OutputFormat::Table => print_job(&job),
    }
    Ok(())
}

fn print_job(job: &JobView) {
    println!("Job {}:", job.job_id);
    output::print_kv("URL", &job.data.url);
    output::print_kv("Status", job.status.as_str());
    output::print_kv("Progress", &format!("{}%", job.progress));
    output::print_kv("Attempts", &job.attempts_made.to_string());
    output::print_kv("Categories", &job.data.categories.join(", "));
    output::print_kv("Created", &job.created_at.to_rfc3339());
    if let Some(processed) = job.processed_at {
        output::print_kv("Processed", &processed.to_rfc3339());
    }
    if let Some(finished) = job.finished_at {
        output::print_kv("Finished", &finished.to_rfc3339());
    }
    if let Some(reason) = &job.failed_reason {
        output::print_kv("Failed reason", reason);
    }
    if let Some(scores) = job.result.as_ref().and_then(|r| r.get("scores")).and_then(|s| s.as_object()) {
        for (category, score) in scores {
            let shown = score
                .as_f64()
                .map(|s| format!("{:.0}", s * 100.0))
                .unwrap_or_else(|| "-".to_string());
            output::print_kv(&format!("Score {category}"), &shown);
        }
    }
}
