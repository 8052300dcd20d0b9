//! Stream and stream rule definitions.
//!
//! A [`Stream`] is a routing destination: a stable identifier plus an ordered
//! list of [`StreamRule`]s. A message is routed into the stream only if every
//! one of its rules matches (conjunction). These types are plain data; the
//! host's persistence layer deserializes snapshots into them and hands them
//! to the engine, which never mutates them.

use serde::{Deserialize, Serialize};

/// The predicate type of a single stream rule.
///
/// The recognized set is closed. Rule definitions arriving from a newer host
/// with a type outside this set deserialize to [`RuleType::Unknown`] and are
/// dropped (with a warning) during engine construction instead of failing the
/// whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Field exists with a non-empty value. Ignores the comparand.
    Presence,
    /// Field's string form equals the comparand byte-for-byte.
    Exact,
    /// Field parses as a finite number strictly greater than the comparand.
    Greater,
    /// Field parses as a finite number strictly smaller than the comparand.
    Smaller,
    /// Field's string form contains a match of the pattern (unanchored,
    /// `regex` crate dialect).
    Regex,
    /// Anything the host sent that this engine does not recognize.
    #[serde(other)]
    Unknown,
}

impl RuleType {
    /// Map the host's numeric wire code to a rule type.
    ///
    /// Codes outside the recognized range yield [`RuleType::Unknown`].
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => RuleType::Exact,
            2 => RuleType::Greater,
            3 => RuleType::Smaller,
            4 => RuleType::Regex,
            5 => RuleType::Presence,
            _ => RuleType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Presence => "presence",
            RuleType::Exact => "exact",
            RuleType::Greater => "greater",
            RuleType::Smaller => "smaller",
            RuleType::Regex => "regex",
            RuleType::Unknown => "unknown",
        }
    }
}

/// One predicate over one named message field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRule {
    /// The message field this rule inspects.
    pub field: String,
    /// The predicate type.
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// The comparand. A string for `Exact`/`Regex`, the decimal form of a
    /// number for `Greater`/`Smaller`, unused for `Presence`.
    #[serde(default)]
    pub value: String,
    /// Negate the predicate's truth value after evaluation.
    #[serde(default)]
    pub inverted: bool,
}

impl StreamRule {
    pub fn new(field: impl Into<String>, rule_type: RuleType, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule_type,
            value: value.into(),
            inverted: false,
        }
    }

    pub fn presence(field: impl Into<String>) -> Self {
        Self::new(field, RuleType::Presence, "")
    }

    pub fn exact(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, RuleType::Exact, value)
    }

    pub fn greater(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, RuleType::Greater, value)
    }

    pub fn smaller(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, RuleType::Smaller, value)
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, RuleType::Regex, pattern)
    }

    /// Flip this rule to its negated form.
    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }
}

/// A routing destination defined by a conjunction of field predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Stable identifier, unique within a snapshot.
    pub id: String,
    /// Human-readable name. Not interpreted by the engine.
    #[serde(default)]
    pub title: String,
    /// Ordered rule list. A stream with zero valid rules never matches.
    #[serde(default)]
    pub rules: Vec<StreamRule>,
}

impl Stream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_rule(mut self, rule: StreamRule) -> Self {
        self.rules.push(rule);
        self
    }
}
