//! Queue statistics command.

use tabled::Tabled;

use audithub_core::config::AppConfig;
use audithub_core::error::AppError;
use audithub_entity::QueueStats;

use crate::output::{self, OutputFormat};

#[derive(Debug, Tabled)]
pub struct StateRow {
    #[tabled(rename = "State")]
    pub state: &'static str,
    #[tabled(rename = "Jobs")]
    pub count: u64,
}

/// One row per state, then the total.
pub fn rows(stats: &QueueStats) -> Vec<StateRow> {
    [
        ("waiting", stats.waiting),
        ("delayed", stats.delayed),
        ("active", stats.active),
        ("completed", stats.completed),
        ("failed", stats.failed),
        ("total", stats.total),
    ]
    .into_iter()
    .map(|(state, count)| StateRow { state, count })
    .collect()
}

pub async fn execute(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let service = super::connect_service(config).await?;
    let stats = service.get_stats().await?;
    output::print_rows(&rows(&stats), &stats, format);
    Ok(())
}
