//! Step Result Values
//!
//! Actions return a [`StepValue`], a tagged variant that downstream code
//! matches on explicitly: scalars, text, structured lists/maps, or an error
//! marker for failed invocations.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// The result of a single step invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<Value>),
    Map(Map<String, Value>),
    /// Marks a failed invocation; carries the error message.
    Error(String),
}

impl StepValue {
    /// Creates an error marker.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Returns true for the error marker.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Short name of the variant, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Error(_) => "error",
        }
    }

    /// Converts into a JSON value. Errors become their message string.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Text(s) | Self::Error(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.clone()),
            Self::Map(map) => Value::Object(map.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Follows a dotted path (`items.0.name`) into a structured value.
    ///
    /// Map segments are keys, list segments are indices. An empty path
    /// returns the value itself.
    pub fn lookup_path(&self, path: &str) -> Option<StepValue> {
        let path = path.trim();
        if path.is_empty() {
            return Some(self.clone());
        }

        let root = self.to_json();
        let mut current = &root;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(StepValue::from(current.clone()))
    }

    /// Renders the value for textual interpolation.
    ///
    /// Top-level text is inserted verbatim. Everything else uses Python
    /// literal form: `{'message': 'HELLO WORLD'}`, `[1, 'two']`, `None`,
    /// `True`/`False`. Maps keep their insertion order.
    pub fn render_inline(&self) -> String {
        match self {
            Self::Text(s) | Self::Error(s) => s.clone(),
            other => {
                let mut out = String::new();
                render_nested(&other.to_json(), &mut out);
                out
            }
        }
    }
}

fn render_nested(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(b) => out.push_str(if *b { "True" } else { "False" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => render_quoted(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_nested(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_nested(&Value::String(key.clone()), out);
                out.push_str(": ");
                render_nested(item, out);
            }
            out.push('}');
        }
    }
}

/// Single quotes unless the text holds `'` and no `"`.
fn render_quoted(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

impl From<Value> for StepValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items),
            Value::Object(map) => Self::Map(map),
        }
    }
}

impl From<&str> for StepValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for StepValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for StepValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<bool> for StepValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl Serialize for StepValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for StepValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_inline())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_variants() {
        assert_eq!(StepValue::from(json!(null)), StepValue::Null);
        assert_eq!(StepValue::from(json!(true)), StepValue::Bool(true));
        assert_eq!(StepValue::from(json!("hi")), StepValue::Text("hi".into()));
        assert_eq!(StepValue::from(json!(5)).as_f64(), Some(5.0));
        assert!(matches!(StepValue::from(json!([1, 2])), StepValue::List(_)));
        assert!(matches!(StepValue::from(json!({"a": 1})), StepValue::Map(_)));
    }

    #[test]
    fn test_render_map_inline() {
        let value = StepValue::from(json!({"message": "HELLO WORLD"}));
        assert_eq!(value.render_inline(), "{'message': 'HELLO WORLD'}");
    }

    #[test]
    fn test_render_scalars_and_text() {
        assert_eq!(StepValue::from(5_i64).render_inline(), "5");
        assert_eq!(StepValue::from("plain").render_inline(), "plain");
        assert_eq!(StepValue::Null.render_inline(), "None");
        assert_eq!(StepValue::from(true).render_inline(), "True");
        assert_eq!(
            StepValue::from(json!([1, "two", {"it's": false}, null])).render_inline(),
            "[1, 'two', {\"it's\": False}, None]"
        );
        assert_eq!(
            StepValue::from(json!(["say \"it's\"", "a\\b\n"])).render_inline(),
            "['say \"it\\'s\"', 'a\\\\b\\n']"
        );
    }

    #[test]
    fn test_map_keeps_insertion_order() {
        let value = StepValue::from(json!({"zeta": 1, "alpha": 2}));
        assert_eq!(value.render_inline(), "{'zeta': 1, 'alpha': 2}");
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"zeta":1,"alpha":2}"#);

        let parsed: Value = serde_json::from_str(r#"{"b": true, "a": null}"#).unwrap();
        assert_eq!(StepValue::from(parsed).render_inline(), "{'b': True, 'a': None}");
    }

    #[test]
    fn test_lookup_path() {
        let value = StepValue::from(json!({"items": [{"id": 7}], "name": "x"}));
        assert_eq!(value.lookup_path("items.0.id"), Some(StepValue::from(7_i64)));
        assert_eq!(value.lookup_path("name"), Some(StepValue::from("x")));
        assert_eq!(value.lookup_path(""), Some(value.clone()));
        assert!(value.lookup_path("items.3").is_none());
        assert!(value.lookup_path("name.deeper").is_none());
    }

    #[test]
    fn test_error_serializes_as_message() {
        let value = StepValue::error("boom");
        assert!(value.is_error());
        assert_eq!(serde_json::to_value(&value).unwrap(), json!("boom"));
    }
}
