//! Field-keyed rule index.
//!
//! Rules are bucketed by type and, within each type, by field name, with a
//! parallel field-name set per type. At match time the engine walks each
//! type's buckets restricted to the fields the message actually carries,
//! bounding inner work by the intersection size; presence buckets are the
//! exception and are walked in full because absence has to be observable.
//!
//! Inverted non-presence rules also need absence visibility: an inverted
//! exact rule matches precisely when its field is absent or different, but
//! the field intersection would never visit it on a message lacking the
//! field. Those rules are therefore additionally tracked as probes that are
//! checked once per message against the field set alone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::matcher::{CompiledRule, RuleMatcher};
use crate::metrics::RouterMetrics;
use crate::stream::{RuleType, Stream};

/// One rule type's field→rules buckets plus the union of its field names.
#[derive(Debug, Default)]
pub(crate) struct TypeBucket {
    rules: HashMap<String, Vec<CompiledRule>>,
    fields: HashSet<String>,
}

impl TypeBucket {
    fn insert(&mut self, rule: CompiledRule) {
        self.fields.insert(rule.field.clone());
        self.rules.entry(rule.field.clone()).or_default().push(rule);
    }

    pub(crate) fn fields(&self) -> &HashSet<String> {
        &self.fields
    }

    pub(crate) fn rules_for(&self, field: &str) -> &[CompiledRule] {
        self.rules.get(field).map_or(&[], Vec::as_slice)
    }

    /// All buckets, for the full (non-intersected) presence walk.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.values().flatten()
    }

    fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}

/// An inverted non-presence rule, checked against absent fields only.
#[derive(Debug)]
pub(crate) struct InvertedProbe {
    pub field: String,
    pub stream_idx: usize,
}

/// The compiled rule index for one stream snapshot.
///
/// Immutable after [`build`](RuleIndex::build); every accessor takes `&self`.
#[derive(Debug, Default)]
pub(crate) struct RuleIndex {
    presence: TypeBucket,
    exact: TypeBucket,
    greater: TypeBucket,
    smaller: TypeBucket,
    regex: TypeBucket,
    inverted_probes: Vec<InvertedProbe>,
    /// Valid (compiled) rules per stream, by snapshot position.
    required_rules: Vec<u32>,
}

impl RuleIndex {
    /// Compile every stream's rules into the index.
    ///
    /// Rules that fail to compile are logged, counted in `dropped_rules`,
    /// and skipped; they contribute nothing to the owning stream's required
    /// count, so a stream whose only rule was dropped can never match.
    pub(crate) fn build(streams: &[Arc<Stream>], metrics: &RouterMetrics) -> Self {
        let mut index = RuleIndex {
            required_rules: vec![0; streams.len()],
            ..RuleIndex::default()
        };

        for (stream_idx, stream) in streams.iter().enumerate() {
            for rule in &stream.rules {
                let matcher = match RuleMatcher::compile(rule) {
                    Ok(matcher) => matcher,
                    Err(e) => {
                        warn!(
                            stream = %stream.id,
                            field = %rule.field,
                            rule_type = rule.rule_type.as_str(),
                            "skipping stream rule: {e}"
                        );
                        metrics.record_dropped_rule();
                        continue;
                    }
                };

                index.insert(CompiledRule {
                    stream_idx,
                    field: rule.field.clone(),
                    inverted: rule.inverted,
                    matcher,
                });
                index.required_rules[stream_idx] += 1;
            }
        }

        index
    }

    fn insert(&mut self, rule: CompiledRule) {
        let rule_type = rule.matcher.rule_type();
        if rule.inverted && rule_type != RuleType::Presence {
            self.inverted_probes.push(InvertedProbe {
                field: rule.field.clone(),
                stream_idx: rule.stream_idx,
            });
        }
        self.bucket_mut(rule_type).insert(rule);
    }

    fn bucket_mut(&mut self, rule_type: RuleType) -> &mut TypeBucket {
        match rule_type {
            RuleType::Presence => &mut self.presence,
            RuleType::Exact => &mut self.exact,
            RuleType::Greater => &mut self.greater,
            RuleType::Smaller => &mut self.smaller,
            RuleType::Regex => &mut self.regex,
            RuleType::Unknown => unreachable!("unknown rule types never compile"),
        }
    }

    pub(crate) fn presence(&self) -> &TypeBucket {
        &self.presence
    }

    /// The intersected buckets in evaluation order: exact, greater, smaller,
    /// regex (fastest first, regex last).
    pub(crate) fn intersected(&self) -> [&TypeBucket; 4] {
        [&self.exact, &self.greater, &self.smaller, &self.regex]
    }

    pub(crate) fn inverted_probes(&self) -> &[InvertedProbe] {
        &self.inverted_probes
    }

    /// Number of valid rules the stream at `stream_idx` requires to match.
    pub(crate) fn required_rules(&self, stream_idx: usize) -> u32 {
        self.required_rules[stream_idx]
    }

    /// Total valid rules across all buckets.
    pub(crate) fn rule_count(&self) -> usize {
        self.presence.rule_count()
            + self.exact.rule_count()
            + self.greater.rule_count()
            + self.smaller.rule_count()
            + self.regex.rule_count()
    }
}
