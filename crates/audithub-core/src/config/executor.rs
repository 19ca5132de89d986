//! Audit executor configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration of the per-job child process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Program launched for every audit.
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the child (e.g. `CHROME_PATH`).
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Hard timeout for one audit, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            env: HashMap::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_command() -> String {
    "audithub-runner".to_string()
}

fn default_timeout() -> u64 {
    120
}
