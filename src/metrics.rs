//! Engine counters.
//!
//! The engine publishes three monotonic counters: messages evaluated, rule
//! timeouts, and rules dropped at construction. The host exports them through
//! whatever registry it runs; [`RouterMetrics::snapshot`] hands over a plain
//! value for that purpose. Sharing one `Arc<RouterMetrics>` across engine
//! rebuilds keeps the counters continuous over snapshot changes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for one engine (or a lineage of rebuilt engines).
#[derive(Debug, Default)]
pub struct RouterMetrics {
    evaluations: AtomicU64,
    rule_timeouts: AtomicU64,
    dropped_rules: AtomicU64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_evaluation(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rule_timeout(&self) {
        self.rule_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_rule(&self) {
        self.dropped_rules.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values as a plain copyable value.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            rule_timeouts: self.rule_timeouts.load(Ordering::Relaxed),
            dropped_rules: self.dropped_rules.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Number of `match_message` calls.
    pub evaluations: u64,
    /// Number of matcher invocations that exceeded the per-rule budget.
    pub rule_timeouts: u64,
    /// Number of rules dropped during engine construction.
    pub dropped_rules: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = RouterMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_increment() {
        let metrics = RouterMetrics::new();

        metrics.record_evaluation();
        metrics.record_evaluation();
        metrics.record_rule_timeout();
        metrics.record_dropped_rule();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.evaluations, 2);
        assert_eq!(snapshot.rule_timeouts, 1);
        assert_eq!(snapshot.dropped_rules, 1);
    }

    #[test]
    fn test_concurrent_increments() {
        use std::sync::Arc;

        let metrics = Arc::new(RouterMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.record_evaluation();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().evaluations, 4000);
    }
}
