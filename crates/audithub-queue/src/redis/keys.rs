//! Key layout of one queue.
//!
//! ```text
//! <prefix><queue>:job:<id>    HASH  job fields
//! <prefix><queue>:wait        LIST  waiting ids (LPUSH in, RPOP out)
//! <prefix><queue>:delayed     ZSET  id -> due time (ms)
//! <prefix><queue>:active      ZSET  id -> lease expiry (ms)
//! <prefix><queue>:completed   ZSET  id -> finished time (ms)
//! <prefix><queue>:failed      ZSET  id -> finished time (ms)
//! ```

use audithub_core::types::id::JobId;
use audithub_entity::job::JobState;

/// Keys of one named queue.
#[derive(Debug, Clone)]
pub struct QueueKeys {
    base: String,
}

impl QueueKeys {
    pub fn new(prefix: &str, queue: &str) -> Self {
        Self {
            base: format!("{prefix}{queue}"),
        }
    }

    /// Prefix of job hash keys; the id is appended.
    pub fn job_prefix(&self) -> String {
        format!("{}:job:", self.base)
    }

    pub fn job(&self, id: JobId) -> String {
        format!("{}:job:{id}", self.base)
    }

    pub fn wait(&self) -> String {
        format!("{}:wait", self.base)
    }

    pub fn delayed(&self) -> String {
        format!("{}:delayed", self.base)
    }

    pub fn active(&self) -> String {
        format!("{}:active", self.base)
    }

    pub fn completed(&self) -> String {
        format!("{}:completed", self.base)
    }

    pub fn failed(&self) -> String {
        format!("{}:failed", self.base)
    }

    /// Index holding the ids of jobs in `state`.
    pub fn index(&self, state: JobState) -> String {
        match state {
            JobState::Waiting => self.wait(),
            JobState::Delayed => self.delayed(),
            JobState::Active => self.active(),
            JobState::Completed => self.completed(),
            JobState::Failed => self.failed(),
        }
    }
}
