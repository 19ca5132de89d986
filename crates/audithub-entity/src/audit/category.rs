//! Audit dimensions understood by the runner.

/// Category used when a submission names none.
pub const DEFAULT_CATEGORY: &str = "performance";

/// Every category a submission may request.
pub const KNOWN_CATEGORIES: [&str; 5] = [
    "performance",
    "accessibility",
    "best-practices",
    "seo",
    "pwa",
];

/// Categories always present in webhook score payloads.
pub const STANDARD_CATEGORIES: [&str; 4] = ["performance", "accessibility", "best-practices", "seo"];

/// Check whether `name` is a known category.
pub fn is_known(name: &str) -> bool {
    KNOWN_CATEGORIES.contains(&name)
}

/// Categories to run when the caller supplied none.
pub fn default_categories() -> Vec<String> {
    vec![DEFAULT_CATEGORY.to_string()]
}
