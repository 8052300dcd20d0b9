//! Engine configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::metrics::RouterMetrics;

/// Configuration for a [`RouterEngine`](crate::RouterEngine).
///
/// Only knobs that affect routing behavior are exposed: the per-rule timeout
/// budget, the size of the guard's worker pool, and an optional shared
/// metrics handle.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use stream_router::RouterConfig;
///
/// let config = RouterConfig::new()
///     .with_rule_timeout(Duration::from_millis(100))
///     .with_guard_workers(4);
/// ```
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Wall-clock budget for a single guarded matcher invocation.
    ///
    /// On expiry the invocation counts as a non-match; the outer
    /// `match_message` call is never aborted.
    ///
    /// **Default**: 50 ms
    pub rule_timeout: Duration,

    /// Number of worker threads in the timeout guard's pool.
    ///
    /// One worker is enough for correctness; a second keeps guarded
    /// evaluations flowing while a timed-out one drains in the background.
    ///
    /// **Default**: 2
    pub guard_workers: usize,

    /// Counter registry shared across engine rebuilds.
    ///
    /// When unset, every engine starts its own counters at zero. Pass the
    /// same handle (for instance via [`EngineFactory`](crate::EngineFactory))
    /// to keep counters continuous over snapshot changes.
    pub metrics: Option<Arc<RouterMetrics>>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rule_timeout: Duration::from_millis(50),
            guard_workers: 2,
            metrics: None,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-rule timeout budget.
    pub fn with_rule_timeout(mut self, timeout: Duration) -> Self {
        self.rule_timeout = timeout;
        self
    }

    /// Set the guard worker pool size.
    pub fn with_guard_workers(mut self, workers: usize) -> Self {
        self.guard_workers = workers;
        self
    }

    /// Share a metrics handle with the engine.
    pub fn with_metrics(mut self, metrics: Arc<RouterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
