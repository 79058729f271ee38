use std::time::Duration;

/// Polling policy for a running script task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunScriptConfig {
    /// Polls (including retried failures) before giving up.
    pub max_attempts: u32,
    /// Delay between polls.
    pub poll_interval: Duration,
}

impl Default for RunScriptConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            poll_interval: Duration::from_secs(1),
        }
    }
}
