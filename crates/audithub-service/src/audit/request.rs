//! Submission requests and their validation rules.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateUrl, ValidationError, ValidationErrors};

use audithub_core::error::AppError;
use audithub_entity::audit::category;

/// Largest number of urls accepted in one batch.
pub const MAX_BATCH_SIZE: usize = 100;

/// Request to audit a single page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAuditRequest {
    #[validate(custom(function = "validate_http_url"))]
    pub url: String,
    #[validate(custom(function = "validate_categories"))]
    pub categories: Option<Vec<String>>,
    #[validate(length(min = 2, max = 16))]
    pub locale: Option<String>,
    #[validate(custom(function = "validate_http_url"))]
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
}

impl SubmitAuditRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Request to audit several pages as one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBatchRequest {
    #[validate(length(min = 1, max = 100), custom(function = "validate_url_list"))]
    pub urls: Vec<String>,
    #[validate(custom(function = "validate_categories"))]
    pub categories: Option<Vec<String>>,
    #[validate(length(min = 2, max = 16))]
    pub locale: Option<String>,
    #[validate(custom(function = "validate_http_url"))]
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
}

/// Absolute `http` or `https` url.
fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    let lower = url.trim().to_ascii_lowercase();
    let has_scheme = lower.starts_with("http://") || lower.starts_with("https://");
    if has_scheme && url.validate_url() {
        Ok(())
    } else {
        let mut err = ValidationError::new("http_url");
        err.message = Some(format!("'{url}' is not an absolute http(s) url").into());
        Err(err)
    }
}

fn validate_url_list(urls: &[String]) -> Result<(), ValidationError> {
    urls.iter().try_for_each(|url| validate_http_url(url))
}

fn validate_categories(categories: &[String]) -> Result<(), ValidationError> {
    match categories.iter().find(|c| !category::is_known(c)) {
        None => Ok(()),
        Some(unknown) => {
            let mut err = ValidationError::new("category");
            err.message = Some(
                format!(
                    "unknown category '{unknown}'; expected one of {}",
                    category::KNOWN_CATEGORIES.join(", ")
                )
                .into(),
            );
            Err(err)
        }
    }
}

/// Requested categories with duplicates removed, or the default set.
pub(crate) fn resolve_categories(categories: Option<&[String]>) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();
    for c in categories.unwrap_or_default() {
        if !resolved.contains(c) {
            resolved.push(c.clone());
        }
    }
    if resolved.is_empty() {
        resolved = category::default_categories();
    }
    resolved
}

/// Map validator output into the application error type.
pub(crate) fn into_app_error(errors: ValidationErrors) -> AppError {
    AppError::validation(format!("Invalid submission: {errors}"))
}
