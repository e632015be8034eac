//! Domain types and DTOs
//!
//! Records mirror the remote tables. Columns are loosely typed upstream
//! (numbers arrive as strings and the reverse, arrays arrive as null), so the
//! deserializers below normalize what the services consume.

pub mod archives;
pub mod email_templates;
pub mod engineers;
pub mod mail;
pub mod matches;
pub mod projects;
pub mod resume;
pub mod runtime_config;

pub use archives::*;
pub use email_templates::*;
pub use engineers::*;
pub use mail::*;
pub use matches::*;
pub use projects::*;
pub use resume::*;
pub use runtime_config::*;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Fallback label for missing display values.
pub const UNSET: &str = "未設定";

/// `null` deserializes to `T::default()`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept strings, numbers and booleans as text.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Accept a JSON array or a comma-separated string.
pub fn string_or_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        value => Some(ensure_list(&value)),
    })
}

/// Normalize a list-ish value: arrays keep their string items, strings are
/// split on commas, anything else is empty.
pub fn ensure_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// First non-empty value, by reference.
pub fn first_non_empty<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|s| !s.trim().is_empty())
}

/// Present-but-empty text clears the column.
pub fn text_or_null(value: &str) -> Value {
    if value.is_empty() {
        Value::Null
    } else {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ensure_list_splits_strings_and_filters_blanks() {
        assert_eq!(ensure_list(&json!("Java, AWS ,,Go")), vec!["Java", "AWS", "Go"]);
        assert_eq!(ensure_list(&json!(["Java", "", 3])), vec!["Java", "3"]);
        assert!(ensure_list(&json!(null)).is_empty());
        assert!(ensure_list(&json!({"a": 1})).is_empty());
    }

    #[test]
    fn first_non_empty_skips_blank_values() {
        assert_eq!(first_non_empty(&[None, Some(" "), Some("x")]), Some("x"));
        assert_eq!(first_non_empty(&[None, Some("")]), None);
    }

    #[test]
    fn lenient_string_accepts_numbers() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default, deserialize_with = "lenient_string")]
            age: Option<String>,
        }
        let row: Row = serde_json::from_value(json!({"age": 31})).unwrap();
        assert_eq!(row.age.as_deref(), Some("31"));
        let row: Row = serde_json::from_value(json!({})).unwrap();
        assert_eq!(row.age, None);
    }
}
