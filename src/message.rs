//! Log message representation and field value coercion.
//!
//! A [`Message`] is a flat map from field name to JSON value. The engine only
//! ever reads messages; coercion to string or numeric form happens lazily at
//! match time and never fails loudly, a value that cannot be coerced simply
//! does not match.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// A log message: unique field names mapped to scalar-ish JSON values.
///
/// Iteration order is irrelevant to matching. `Null` values are kept in the
/// map but count as absent for presence purposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    fields: Map<String, Value>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a message from a JSON value.
    ///
    /// Only objects carry fields; any other value yields an empty message,
    /// which matches nothing.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(fields) => Self {
                fields: fields.clone(),
            },
            _ => Self::default(),
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The string form of a field value, if it has one.
///
/// Strings pass through unchanged, numbers and booleans use their canonical
/// rendering. `Null`, arrays and objects have no string form.
pub(crate) fn text_form(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(true) => Some(Cow::Borrowed("true")),
        Value::Bool(false) => Some(Cow::Borrowed("false")),
        _ => None,
    }
}

/// The finite numeric form of a field value, if it has one.
pub(crate) fn numeric_form(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Whether a field value counts as present and non-empty.
pub(crate) fn has_content(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Number(_) | Value::Bool(_) => true,
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_object() {
        let message = Message::from_value(&json!({"source": "app1", "code": 42}));

        assert_eq!(message.field_count(), 2);
        assert_eq!(message.get("source"), Some(&json!("app1")));
        assert_eq!(message.get("code"), Some(&json!(42)));
        assert!(message.get("missing").is_none());
    }

    #[test]
    fn test_from_value_non_object_is_empty() {
        assert!(Message::from_value(&json!("just a string")).is_empty());
        assert!(Message::from_value(&json!([1, 2, 3])).is_empty());
        assert!(Message::from_value(&Value::Null).is_empty());
    }

    #[test]
    fn test_with_field_builder() {
        let message = Message::new()
            .with_field("host", "h1")
            .with_field("response_time", 750);

        assert!(message.contains_field("host"));
        assert!(message.contains_field("response_time"));
        assert_eq!(message.field_count(), 2);
    }

    #[test]
    fn test_field_names() {
        let message = Message::new().with_field("a", 1).with_field("b", 2);
        let mut names: Vec<&str> = message.field_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_text_form_coercion() {
        assert_eq!(text_form(&json!("abc")).as_deref(), Some("abc"));
        assert_eq!(text_form(&json!(42)).as_deref(), Some("42"));
        assert_eq!(text_form(&json!(1.5)).as_deref(), Some("1.5"));
        assert_eq!(text_form(&json!(true)).as_deref(), Some("true"));
        assert_eq!(text_form(&json!(false)).as_deref(), Some("false"));
        assert!(text_form(&Value::Null).is_none());
        assert!(text_form(&json!(["x"])).is_none());
    }

    #[test]
    fn test_numeric_form_coercion() {
        assert_eq!(numeric_form(&json!(750)), Some(750.0));
        assert_eq!(numeric_form(&json!("750")), Some(750.0));
        assert_eq!(numeric_form(&json!(" 2.5 ")), Some(2.5));
        assert!(numeric_form(&json!("abc")).is_none());
        assert!(numeric_form(&json!("NaN")).is_none());
        assert!(numeric_form(&json!("inf")).is_none());
        assert!(numeric_form(&Value::Null).is_none());
    }

    #[test]
    fn test_has_content() {
        assert!(has_content(&json!("x")));
        assert!(has_content(&json!(0)));
        assert!(has_content(&json!(false)));
        assert!(!has_content(&json!("")));
        assert!(!has_content(&Value::Null));
    }
}
