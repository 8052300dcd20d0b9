//! Compiled per-rule matchers.
//!
//! Each [`RuleMatcher`] variant is compiled once at engine construction. At
//! match time, [`RuleMatcher::matches`] evaluates the raw predicate against
//! an optional field value with no allocation beyond numeric/string coercion.
//! Inversion is applied by [`CompiledRule::evaluate`], after the raw result.
//!
//! Regex patterns use the `regex` crate dialect: RE2-style, unanchored,
//! linear-time, no backreferences or lookaround.

use regex::Regex;
use serde_json::Value;

use crate::error::{Result, RouterError};
use crate::message::{has_content, numeric_form, text_form, Message};
use crate::stream::{RuleType, StreamRule};

/// The compiled predicate for one rule type.
#[derive(Debug, Clone)]
pub(crate) enum RuleMatcher {
    /// Field exists with a non-empty value.
    Presence,
    /// Field's string form equals the comparand byte-for-byte.
    Exact { expected: String },
    /// Field's numeric form is strictly greater than the threshold.
    ///
    /// `None` means the rule's own comparand did not parse as a finite
    /// number; the raw predicate is then constantly false.
    Greater { threshold: Option<f64> },
    /// Field's numeric form is strictly smaller than the threshold.
    Smaller { threshold: Option<f64> },
    /// Field's string form contains a match of the pattern.
    Regex { pattern: Regex },
}

impl RuleMatcher {
    /// Compile a rule definition into its matcher.
    ///
    /// Unknown rule types and malformed regex patterns are the only failure
    /// modes; both are construct-time and cause the caller to drop the rule.
    pub(crate) fn compile(rule: &StreamRule) -> Result<Self> {
        match rule.rule_type {
            RuleType::Presence => Ok(RuleMatcher::Presence),
            RuleType::Exact => Ok(RuleMatcher::Exact {
                expected: rule.value.clone(),
            }),
            RuleType::Greater => Ok(RuleMatcher::Greater {
                threshold: parse_threshold(&rule.value),
            }),
            RuleType::Smaller => Ok(RuleMatcher::Smaller {
                threshold: parse_threshold(&rule.value),
            }),
            RuleType::Regex => Regex::new(&rule.value)
                .map(|pattern| RuleMatcher::Regex { pattern })
                .map_err(|e| RouterError::InvalidRegex(e.to_string())),
            RuleType::Unknown => Err(RouterError::UnknownRuleType(rule.field.clone())),
        }
    }

    /// Evaluate the raw (un-inverted) predicate against a field value.
    ///
    /// `None` means the field is absent from the message. Values that cannot
    /// be coerced to the form the predicate needs yield false, never an
    /// error.
    pub(crate) fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            RuleMatcher::Presence => value.is_some_and(has_content),
            RuleMatcher::Exact { expected } => value
                .and_then(text_form)
                .is_some_and(|text| text.as_ref() == expected.as_str()),
            RuleMatcher::Greater { threshold } => match (value.and_then(numeric_form), threshold) {
                (Some(observed), Some(bound)) => observed > *bound,
                _ => false,
            },
            RuleMatcher::Smaller { threshold } => match (value.and_then(numeric_form), threshold) {
                (Some(observed), Some(bound)) => observed < *bound,
                _ => false,
            },
            RuleMatcher::Regex { pattern } => value
                .and_then(text_form)
                .is_some_and(|text| pattern.is_match(&text)),
        }
    }

    pub(crate) fn rule_type(&self) -> RuleType {
        match self {
            RuleMatcher::Presence => RuleType::Presence,
            RuleMatcher::Exact { .. } => RuleType::Exact,
            RuleMatcher::Greater { .. } => RuleType::Greater,
            RuleMatcher::Smaller { .. } => RuleType::Smaller,
            RuleMatcher::Regex { .. } => RuleType::Regex,
        }
    }
}

/// A rule compiled against a snapshot: which stream it belongs to, which
/// field it inspects, and its predicate. Plain value aggregate, no identity.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    /// Position of the owning stream in the snapshot.
    pub stream_idx: usize,
    pub field: String,
    pub inverted: bool,
    pub matcher: RuleMatcher,
}

impl CompiledRule {
    /// Evaluate this rule against a message, inversion included.
    ///
    /// Regex rules on the hot path go through the engine's timeout guard
    /// instead; this direct form is what the guard executes and what the
    /// constant-time passes call inline.
    pub(crate) fn evaluate(&self, message: &Message) -> bool {
        self.matcher.matches(message.get(&self.field)) != self.inverted
    }
}

fn parse_threshold(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
