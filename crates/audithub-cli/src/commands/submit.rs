//! Audit submission command.

use clap::Args;

use audithub_core::config::AppConfig;
use audithub_core::error::AppError;
use audithub_service::SubmitAuditRequest;

use crate::output::{self, OutputFormat};

/// Arguments for `submit`
#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Page to audit
    pub url: String,
    /// Lighthouse category; repeat for several
    #[arg(short = 'c', long = "category")]
    pub categories: Vec<String>,
    /// Report locale
    #[arg(short, long)]
    pub locale: Option<String>,
    /// Endpoint notified when the job finishes
    #[arg(long)]
    pub webhook_url: Option<String>,
    /// Bearer token sent to the webhook
    #[arg(long, requires = "webhook_url")]
    pub webhook_token: Option<String>,
}

impl SubmitArgs {
    fn to_request(&self) -> SubmitAuditRequest {
        SubmitAuditRequest {
            url: self.url.clone(),
            categories: (!self.categories.is_empty()).then(|| self.categories.clone()),
            locale: self.locale.clone(),
            webhook_url: self.webhook_url.clone(),
            webhook_token: self.webhook_token.clone(),
        }
    }
}

pub async fn execute(args: &SubmitArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let service = super::connect_service(config).await?;
    let response = service.submit_audit(args.to_request()).await?;

    match format {
        OutputFormat::Json => output::print_json(&response),
        OutputFormat::Table => {
            output::print_success(&format!("Audit of {} queued", response.url));
            output::print_kv("Job ID", &response.job_id.to_string());
            output::print_kv("Status", &response.status);
        }
    }
    Ok(())
}
