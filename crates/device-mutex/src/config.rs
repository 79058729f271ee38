use request_context::Context;
use std::time::Duration;

/// Lock timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutexConfig {
    /// How often a held lock's timestamp is pushed forward.
    pub refresh_interval: Duration,
    /// Request timeout assumed when the request does not declare one.
    pub default_request_timeout: Duration,
    /// Added to the request timeout before a lock counts as expired.
    pub expiry_slack: Duration,
}

impl Default for MutexConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(90),
            default_request_timeout: Duration::from_secs(120),
            expiry_slack: Duration::from_secs(15),
        }
    }
}

impl MutexConfig {
    /// Request timeout in effect for `ctx`.
    pub fn request_timeout(&self, ctx: &Context) -> Duration {
        ctx.request.timeout.unwrap_or(self.default_request_timeout)
    }

    /// Age beyond which an existing lock is considered abandoned.
    pub fn expiry_window(&self, ctx: &Context) -> Duration {
        self.request_timeout(ctx) + self.expiry_slack
    }

    /// Whole minutes a caller should wait before retrying.
    pub fn retry_minutes(&self, ctx: &Context) -> u64 {
        self.request_timeout(ctx).as_secs().div_ceil(60).max(1)
    }
}
