//! Manual cleanup command.

use audithub_core::config::AppConfig;
use audithub_core::error::AppError;

use crate::output::{self, OutputFormat};

pub async fn execute(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let service = super::connect_service(config).await?;
    let summary = service.cleanup_all().await?;

    match format {
        OutputFormat::Json => output::print_json(&summary),
        OutputFormat::Table => {
            output::print_success(&format!("Removed {} finished jobs", summary.cleaned));
            output::print_kv("Completed", &summary.completed_cleaned.to_string());
            output::print_kv("Failed", &summary.failed_cleaned.to_string());
            output::print_kv("Remaining", &summary.stats.total.to_string());
        }
    }
    Ok(())
}
