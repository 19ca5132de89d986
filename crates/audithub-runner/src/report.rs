//! Extraction of scores and core metrics from a Lighthouse JSON report.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

/// Core metrics reported back to the parent, keyed by the name used in
/// results, with the Lighthouse audit id they come from.
pub const CORE_METRICS: [(&str, &str); 6] = [
    ("fcp", "first-contentful-paint"),
    ("lcp", "largest-contentful-paint"),
    ("tbt", "total-blocking-time"),
    ("cls", "cumulative-layout-shift"),
    ("speedIndex", "speed-index"),
    ("tti", "interactive"),
];

/// The subset of a Lighthouse report the runner reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseReport {
    #[serde(default)]
    categories: HashMap<String, CategoryEntry>,
    #[serde(default)]
    audits: HashMap<String, AuditEntry>,
    #[serde(default)]
    runtime_error: Option<RuntimeError>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditEntry {
    numeric_value: Option<f64>,
}

/// Set when Lighthouse could not load the page at all.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeError {
    pub code: String,
    pub message: String,
}

impl LighthouseReport {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn runtime_error(&self) -> Option<&RuntimeError> {
        self.runtime_error.as_ref()
    }

    /// Score per requested category. Categories Lighthouse could not score,
    /// or did not run, map to `None`.
    pub fn scores(&self, requested: &[String]) -> BTreeMap<String, Option<f64>> {
        let mut scores: BTreeMap<String, Option<f64>> = self
            .categories
            .iter()
            .map(|(id, entry)| (id.clone(), entry.score))
            .collect();
        for category in requested {
            scores.entry(category.clone()).or_insert(None);
        }
        scores
    }

    pub fn metrics(&self) -> BTreeMap<String, f64> {
        CORE_METRICS
            .iter()
            .filter_map(|(name, audit_id)| {
                let value = self.audits.get(*audit_id)?.numeric_value?;
                Some((name.to_string(), value))
            })
            .collect()
    }
}
