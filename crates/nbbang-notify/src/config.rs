use std::time::Duration;

/// Tuning for one notifier run.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Upper bound on subscribers evaluated at once (profile fetch + push).
    pub max_concurrency: usize,
    /// Work still pending after this long is dropped.
    pub deadline: Duration,
    /// Characters of the post title carried in the push body.
    pub excerpt_chars: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            deadline: Duration::from_secs(50),
            excerpt_chars: 40,
        }
    }
}
