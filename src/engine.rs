//! The stream routing engine.
//!
//! This module provides [`RouterEngine`], the hot-path interface of the
//! crate: given a pre-compiled stream snapshot, [`match_message`] returns the
//! streams whose full rule set matches a message. [`EngineFactory`] rebuilds
//! engines on snapshot changes while keeping one counter lineage.
//!
//! [`match_message`]: RouterEngine::match_message

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RouterConfig;
use crate::guard::TimeoutGuard;
use crate::index::RuleIndex;
use crate::matcher::{CompiledRule, RuleMatcher};
use crate::message::{text_form, Message};
use crate::metrics::RouterMetrics;
use crate::stream::{Stream, StreamRule};

/// Routing engine for one stream snapshot.
///
/// An engine is immutable after construction: matching never touches engine
/// internals beyond atomic counter increments, and all transient state lives
/// on the caller's stack. `RouterEngine` is therefore `Send + Sync` and a
/// single instance may be shared across worker threads; the alternative of
/// one engine per worker also works but duplicates the compiled index.
///
/// Within one `match_message` call evaluation is strictly single-threaded;
/// the only waiting happens inside the timeout guard when a regex rule is
/// evaluated.
///
/// # Example
/// ```rust
/// use stream_router::{Message, RouterConfig, RouterEngine, Stream, StreamRule};
///
/// let streams = vec![
///     Stream::new("errors").with_rule(StreamRule::exact("level", "ERROR")),
/// ];
/// let engine = RouterEngine::new(streams, RouterConfig::default());
///
/// let message = Message::new().with_field("level", "ERROR");
/// let matched = engine.match_message(&message);
/// assert_eq!(matched.len(), 1);
/// assert_eq!(matched[0].id, "errors");
/// ```
pub struct RouterEngine {
    streams: Vec<Arc<Stream>>,
    index: RuleIndex,
    guard: TimeoutGuard,
    metrics: Arc<RouterMetrics>,
}

impl RouterEngine {
    /// Compile a stream snapshot into an engine.
    ///
    /// Construction never fails: rules with unknown types or malformed regex
    /// patterns are logged, counted, and dropped, and the engine is built
    /// from whatever remains. A stream left with zero valid rules can never
    /// match.
    pub fn new(streams: Vec<Stream>, config: RouterConfig) -> Self {
        let streams: Vec<Arc<Stream>> = streams.into_iter().map(Arc::new).collect();
        let metrics = config.metrics.unwrap_or_default();
        let index = RuleIndex::build(&streams, &metrics);
        let guard = TimeoutGuard::new(config.rule_timeout, config.guard_workers);

        Self {
            streams,
            index,
            guard,
            metrics,
        }
    }

    /// The snapshot this engine was built from.
    pub fn streams(&self) -> &[Arc<Stream>] {
        &self.streams
    }

    pub fn metrics(&self) -> &Arc<RouterMetrics> {
        &self.metrics
    }

    /// Number of valid rules in the compiled index.
    pub fn rule_count(&self) -> usize {
        self.index.rule_count()
    }

    /// Streams whose every rule matches the message, in snapshot order.
    ///
    /// A stream matches iff its satisfied-rule count equals its valid-rule
    /// count and that count is non-zero. The call never fails; timed-out or
    /// uncoercible evaluations count as non-matches.
    pub fn match_message(&self, message: &Message) -> Vec<Arc<Stream>> {
        self.metrics.record_evaluation();
        let mut satisfied = vec![0u32; self.streams.len()];

        // Presence buckets are walked in full so absence stays observable.
        for rule in self.index.presence().iter() {
            if self.evaluate_rule(rule, message) {
                satisfied[rule.stream_idx] += 1;
            }
        }

        // The remaining types only look at fields the message carries,
        // walking whichever side of the intersection is smaller.
        for bucket in self.index.intersected() {
            if bucket.fields().len() <= message.field_count() {
                for field in bucket.fields() {
                    if message.contains_field(field) {
                        self.tally_rules(bucket.rules_for(field), message, &mut satisfied);
                    }
                }
            } else {
                for field in message.field_names() {
                    self.tally_rules(bucket.rules_for(field), message, &mut satisfied);
                }
            }
        }

        // Inverted non-presence rules match on absent fields without ever
        // being visited by the intersection above.
        for probe in self.index.inverted_probes() {
            if !message.contains_field(&probe.field) {
                satisfied[probe.stream_idx] += 1;
            }
        }

        self.streams
            .iter()
            .enumerate()
            .filter(|(idx, _)| {
                let required = self.index.required_rules(*idx);
                required > 0 && satisfied[*idx] == required
            })
            .map(|(_, stream)| Arc::clone(stream))
            .collect()
    }

    /// Per-stream, per-rule match report for diagnostics.
    ///
    /// Runs every rule of every stream directly, without the index. This is
    /// for testing stream definitions against a sample message; do not call
    /// it on the routing path, [`match_message`](Self::match_message) is the
    /// production entry point.
    pub fn test_match(&self, message: &Message) -> Vec<StreamTestMatch> {
        self.streams
            .iter()
            .enumerate()
            .map(|(stream_idx, stream)| {
                let mut rule_results = Vec::with_capacity(stream.rules.len());
                for rule in &stream.rules {
                    match RuleMatcher::compile(rule) {
                        Ok(matcher) => {
                            let compiled = CompiledRule {
                                stream_idx,
                                field: rule.field.clone(),
                                inverted: rule.inverted,
                                matcher,
                            };
                            rule_results.push(RuleTestResult {
                                rule: rule.clone(),
                                matched: self.evaluate_rule(&compiled, message),
                            });
                        }
                        Err(e) => {
                            debug!(
                                stream = %stream.id,
                                field = %rule.field,
                                "ignoring invalid rule in test match: {e}"
                            );
                        }
                    }
                }

                let matched = !rule_results.is_empty() && rule_results.iter().all(|r| r.matched);
                StreamTestMatch {
                    stream: Arc::clone(stream),
                    matched,
                    rule_results,
                }
            })
            .collect()
    }

    /// Evaluate one rule, routing regex matchers through the timeout guard.
    ///
    /// The guarded closure computes the final, inversion-applied result; a
    /// timed-out invocation is a non-match regardless of inversion
    /// (fail-closed).
    fn evaluate_rule(&self, rule: &CompiledRule, message: &Message) -> bool {
        match &rule.matcher {
            RuleMatcher::Regex { pattern } => {
                let Some(text) = message.get(&rule.field).and_then(text_form) else {
                    // Raw predicate is false on absent or textless values.
                    return rule.inverted;
                };

                let job_pattern = pattern.clone();
                let job_text = text.into_owned();
                let inverted = rule.inverted;
                match self
                    .guard
                    .evaluate(move || job_pattern.is_match(&job_text) != inverted)
                {
                    Some(result) => result,
                    None => {
                        self.metrics.record_rule_timeout();
                        warn!(
                            field = %rule.field,
                            pattern = pattern_preview(pattern.as_str()),
                            budget_ms = self.guard.budget().as_millis() as u64,
                            "stream rule timed out, treating as non-match"
                        );
                        false
                    }
                }
            }
            _ => rule.evaluate(message),
        }
    }

    fn tally_rules(&self, rules: &[CompiledRule], message: &Message, satisfied: &mut [u32]) {
        for rule in rules {
            if self.evaluate_rule(rule, message) {
                satisfied[rule.stream_idx] += 1;
            }
        }
    }
}

/// Builds a fresh engine per stream snapshot.
///
/// All engines created by one factory share its configuration and one
/// metrics handle, so counters stay continuous across snapshot rebuilds.
pub struct EngineFactory {
    config: RouterConfig,
    metrics: Arc<RouterMetrics>,
}

impl EngineFactory {
    pub fn new(config: RouterConfig) -> Self {
        let metrics = config.metrics.clone().unwrap_or_default();
        Self { config, metrics }
    }

    /// Compile a snapshot into a new engine; the previous engine (if any)
    /// simply gets dropped by the caller, tearing down its guard workers.
    pub fn create(&self, streams: Vec<Stream>) -> RouterEngine {
        let config = self
            .config
            .clone()
            .with_metrics(Arc::clone(&self.metrics));
        RouterEngine::new(streams, config)
    }

    pub fn metrics(&self) -> &Arc<RouterMetrics> {
        &self.metrics
    }
}

/// Match report for a single stream, one entry per valid rule.
#[derive(Debug, Clone)]
pub struct StreamTestMatch {
    pub stream: Arc<Stream>,
    /// True iff the stream has at least one valid rule and all matched.
    pub matched: bool,
    pub rule_results: Vec<RuleTestResult>,
}

/// One rule's verdict within a [`StreamTestMatch`].
#[derive(Debug, Clone)]
pub struct RuleTestResult {
    pub rule: StreamRule,
    pub matched: bool,
}

fn pattern_preview(pattern: &str) -> &str {
    match pattern.char_indices().nth(64) {
        Some((idx, _)) => &pattern[..idx],
        None => pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn engine(streams: Vec<Stream>) -> RouterEngine {
        RouterEngine::new(streams, RouterConfig::default())
    }

    fn matched_ids(engine: &RouterEngine, message: &Message) -> Vec<String> {
        engine
            .match_message(message)
            .iter()
            .map(|s| s.id.clone())
            .collect()
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RouterEngine>();
    }

    #[test]
    fn test_empty_snapshot_matches_nothing() {
        let engine = engine(vec![]);
        let message = Message::new().with_field("source", "app1");
        assert!(engine.match_message(&message).is_empty());
    }

    #[test]
    fn test_single_rule_stream() {
        let engine = engine(vec![
            Stream::new("s1").with_rule(StreamRule::exact("source", "app1"))
        ]);

        let hit = Message::new().with_field("source", "app1");
        let miss = Message::new().with_field("source", "other");

        assert_eq!(matched_ids(&engine, &hit), vec!["s1"]);
        assert!(matched_ids(&engine, &miss).is_empty());
    }

    #[test]
    fn test_conjunction_requires_all_rules() {
        let engine = engine(vec![Stream::new("s1")
            .with_rule(StreamRule::exact("source", "app1"))
            .with_rule(StreamRule::presence("level"))]);

        let both = Message::new()
            .with_field("source", "app1")
            .with_field("level", "INFO");
        let only_one = Message::new().with_field("source", "app1");

        assert_eq!(matched_ids(&engine, &both), vec!["s1"]);
        assert!(matched_ids(&engine, &only_one).is_empty());
    }

    #[test]
    fn test_stream_without_rules_never_matches() {
        let engine = engine(vec![Stream::new("bare")]);
        let message = Message::new().with_field("anything", "x");
        assert!(engine.match_message(&message).is_empty());
    }

    #[test]
    fn test_result_is_in_snapshot_order() {
        let engine = engine(vec![
            Stream::new("b").with_rule(StreamRule::presence("host")),
            Stream::new("a").with_rule(StreamRule::presence("host")),
            Stream::new("c").with_rule(StreamRule::presence("host")),
        ]);

        let message = Message::new().with_field("host", "h1");
        assert_eq!(matched_ids(&engine, &message), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_inverted_exact_matches_absent_field() {
        let engine = engine(vec![
            Stream::new("b").with_rule(StreamRule::exact("source", "app2").inverted())
        ]);

        let absent = Message::new().with_field("level", "INFO");
        let equal = Message::new().with_field("source", "app2");
        let different = Message::new().with_field("source", "app1");

        assert_eq!(matched_ids(&engine, &absent), vec!["b"]);
        assert!(matched_ids(&engine, &equal).is_empty());
        assert_eq!(matched_ids(&engine, &different), vec!["b"]);
    }

    #[test]
    fn test_dropped_rule_reduces_required_count() {
        let engine = engine(vec![Stream::new("g")
            .with_rule(StreamRule::exact("source", "app1"))
            .with_rule(StreamRule::regex("msg", "([invalid"))]);

        // The invalid regex was dropped at construction, so the remaining
        // rule alone decides the match.
        let message = Message::new().with_field("source", "app1");
        assert_eq!(matched_ids(&engine, &message), vec!["g"]);
        assert_eq!(engine.metrics().snapshot().dropped_rules, 1);
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn test_stream_with_only_invalid_rules_never_matches() {
        let engine = engine(vec![
            Stream::new("broken").with_rule(StreamRule::regex("msg", "([invalid"))
        ]);

        let message = Message::new().with_field("msg", "anything");
        assert!(engine.match_message(&message).is_empty());
    }

    #[test]
    fn test_evaluation_counter() {
        let engine = engine(vec![]);
        let message = Message::new();

        engine.match_message(&message);
        engine.match_message(&message);
        assert_eq!(engine.metrics().snapshot().evaluations, 2);
    }

    #[test]
    fn test_regex_timeout_counts_as_non_match() {
        // A zero budget expires before any result can arrive; the long
        // haystack keeps the evaluation from finishing between send and the
        // immediate deadline check.
        let config = RouterConfig::new().with_rule_timeout(Duration::ZERO);
        let engine = RouterEngine::new(
            vec![Stream::new("d").with_rule(StreamRule::regex("msg", "(a+)+$"))],
            config,
        );

        let message = Message::new().with_field("msg", "a".repeat(2_000_000));
        assert!(engine.match_message(&message).is_empty());
        assert!(engine.metrics().snapshot().rule_timeouts >= 1);
    }

    #[test]
    fn test_test_match_reports_per_rule_results() {
        let engine = engine(vec![
            Stream::new("s1")
                .with_rule(StreamRule::exact("source", "app1"))
                .with_rule(StreamRule::presence("level")),
            Stream::new("s2").with_rule(StreamRule::exact("source", "other")),
        ]);

        let message = Message::new().with_field("source", "app1");
        let report = engine.test_match(&message);

        assert_eq!(report.len(), 2);

        let s1 = &report[0];
        assert!(!s1.matched);
        assert_eq!(s1.rule_results.len(), 2);
        assert!(s1.rule_results[0].matched);
        assert!(!s1.rule_results[1].matched);

        let s2 = &report[1];
        assert!(!s2.matched);
        assert!(!s2.rule_results[0].matched);
    }

    #[test]
    fn test_test_match_skips_invalid_rules() {
        let engine = engine(vec![Stream::new("g")
            .with_rule(StreamRule::exact("source", "app1"))
            .with_rule(StreamRule::regex("msg", "([invalid"))]);

        let message = Message::new().with_field("source", "app1");
        let report = engine.test_match(&message);

        assert_eq!(report[0].rule_results.len(), 1);
        assert!(report[0].matched);
    }

    #[test]
    fn test_test_match_agrees_with_match_message() {
        let engine = engine(vec![
            Stream::new("e").with_rule(StreamRule::exact("host", "h1")),
            Stream::new("f")
                .with_rule(StreamRule::exact("host", "h1"))
                .with_rule(StreamRule::exact("env", "prod")),
            Stream::new("bare"),
        ]);

        for message in [
            Message::new().with_field("host", "h1").with_field("env", "prod"),
            Message::new().with_field("host", "h1"),
            Message::new(),
        ] {
            let routed: Vec<String> = matched_ids(&engine, &message);
            let reported: Vec<String> = engine
                .test_match(&message)
                .into_iter()
                .filter(|m| m.matched)
                .map(|m| m.stream.id.clone())
                .collect();
            assert_eq!(routed, reported);
        }
    }

    #[test]
    fn test_factory_shares_metrics_across_rebuilds() {
        let factory = EngineFactory::new(RouterConfig::default());

        let first = factory.create(vec![
            Stream::new("s1").with_rule(StreamRule::regex("msg", "([bad"))
        ]);
        drop(first);
        let second = factory.create(vec![
            Stream::new("s1").with_rule(StreamRule::regex("msg", "([bad"))
        ]);

        // Both rebuilds dropped the same bad rule against one counter set.
        assert_eq!(second.metrics().snapshot().dropped_rules, 2);
        assert!(Arc::ptr_eq(factory.metrics(), second.metrics()));
    }

    #[test]
    fn test_streams_accessor_returns_snapshot() {
        let engine = engine(vec![Stream::new("s1"), Stream::new("s2")]);
        let ids: Vec<&str> = engine.streams().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_shared_engine_across_threads() {
        let engine = Arc::new(engine(vec![
            Stream::new("s1").with_rule(StreamRule::exact("source", "app1"))
        ]));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    let message = Message::new().with_field("source", "app1");
                    for _ in 0..100 {
                        assert_eq!(engine.match_message(&message).len(), 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_pattern_preview_truncates() {
        let long = "x".repeat(200);
        assert_eq!(pattern_preview(&long).len(), 64);
        assert_eq!(pattern_preview("short"), "short");
    }
}
