//! Placeholder substitution and preview tagging.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Placeholder values keyed by placeholder name.
pub type PlaceholderValues = BTreeMap<String, String>;

static SINGLE_BRACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([^{}]+)\}").unwrap_or_else(|e| panic!("invalid placeholder pattern: {e}"))
});

static DOUBLE_BRACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{([^{}]+)\}\}").unwrap_or_else(|e| panic!("invalid placeholder pattern: {e}"))
});

/// Token syntax of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `{key}`: stored email templates.
    Single,
    /// `{{key}}`: built-in case templates.
    Double,
}

impl PlaceholderStyle {
    fn pattern(self) -> &'static Regex {
        match self {
            Self::Single => &SINGLE_BRACE,
            Self::Double => &DOUBLE_BRACE,
        }
    }
}

/// Replace every token in one pass. Unknown keys render as empty text and
/// substituted values are never rescanned.
pub fn replace_placeholders(text: &str, values: &PlaceholderValues, style: PlaceholderStyle) -> String {
    style
        .pattern()
        .replace_all(text, |caps: &Captures| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Caller-supplied JSON values as placeholder text. `null` becomes empty.
pub fn values_from_json(map: &Map<String, Value>) -> PlaceholderValues {
    map.iter()
        .map(|(key, value)| {
            let text = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

/// A piece of template text for previews.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Segment {
    Text(String),
    Tag(String),
}

/// Split text into literal and tag segments for preview. Nothing is
/// substituted; each `{key}` becomes a tag carrying `key`.
pub fn tag_placeholders(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in SINGLE_BRACE.captures_iter(text) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(text[last..whole.start()].to_string()));
        }
        segments.push(Segment::Tag(key.as_str().to_string()));
        last = whole.end();
    }

    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_string()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> PlaceholderValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn known_keys_are_substituted() {
        let map = values(&[("name", "Taro")]);
        assert_eq!(
            replace_placeholders("Hello {name}", &map, PlaceholderStyle::Single),
            "Hello Taro"
        );
        assert_eq!(
            replace_placeholders("{name} and {name}", &map, PlaceholderStyle::Single),
            "Taro and Taro"
        );
    }

    #[test]
    fn unknown_keys_render_empty() {
        let map = values(&[("name", "Taro")]);
        assert_eq!(
            replace_placeholders("Hello {foo}", &map, PlaceholderStyle::Single),
            "Hello "
        );
    }

    #[test]
    fn text_without_tokens_is_unchanged() {
        let map = values(&[("name", "Taro")]);
        for text in ["", "plain text", "unbalanced { brace", "close } only", "{}"] {
            assert_eq!(replace_placeholders(text, &map, PlaceholderStyle::Single), text);
        }
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let map = values(&[("a", "{b}"), ("b", "x")]);
        assert_eq!(
            replace_placeholders("{a}", &map, PlaceholderStyle::Single),
            "{b}"
        );
    }

    #[test]
    fn double_style_only_matches_double_braces() {
        let map = values(&[("title", "Java案件")]);
        assert_eq!(
            replace_placeholders("【{{title}}】{title}", &map, PlaceholderStyle::Double),
            "【Java案件】{title}"
        );
    }

    #[test]
    fn json_nulls_become_empty() {
        let map: Map<String, Value> =
            serde_json::from_value(serde_json::json!({"a": null, "b": 3, "c": "x"})).unwrap();
        let values = values_from_json(&map);
        assert_eq!(values["a"], "");
        assert_eq!(values["b"], "3");
        assert_eq!(values["c"], "x");
    }

    #[test]
    fn preview_tags_keep_unknown_keys() {
        assert_eq!(
            tag_placeholders("Hello {foo}!"),
            vec![
                Segment::Text("Hello ".into()),
                Segment::Tag("foo".into()),
                Segment::Text("!".into()),
            ]
        );
        assert_eq!(tag_placeholders("no tags"), vec![Segment::Text("no tags".into())]);
        assert!(tag_placeholders("").is_empty());
    }
}
