//! Step and plan metadata
//!
//! Metadata is an insertion-ordered map of string keys to JSON values. Order
//! is preserved so that serialized plans list attributes the way they were
//! declared.

use indexmap::IndexMap;
use serde_json::Value;

/// Ordered key/value annotations attached to steps and plans
pub type Metadata = IndexMap<String, Value>;

/// Well-known metadata key holding an id
pub const ID_KEY: &str = "id";

/// Well-known metadata key holding a display name
pub const NAME_KEY: &str = "name";

/// Read a string entry from metadata
///
/// Non-string values are not coerced.
#[inline]
#[must_use]
pub fn get_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(Value::as_str)
}

/// Render a metadata value as flat text
///
/// Strings are returned raw, `null` yields `None`, everything else is
/// compact JSON.
#[must_use]
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Build metadata from `(key, value)` pairs
pub fn from_pairs<K, V, I>(pairs: I) -> Metadata
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_str_ignores_non_strings() {
        let metadata = from_pairs([("id", json!(42)), ("name", json!("deploy"))]);
        assert_eq!(get_str(&metadata, NAME_KEY), Some("deploy"));
        assert_eq!(get_str(&metadata, ID_KEY), None);
    }

    #[test]
    fn value_text_rendering() {
        assert_eq!(value_to_text(&json!("x")), Some("x".to_string()));
        assert_eq!(value_to_text(&json!(3)), Some("3".to_string()));
        assert_eq!(value_to_text(&json!(true)), Some("true".to_string()));
        assert_eq!(value_to_text(&Value::Null), None);
    }

    #[test]
    fn pairs_keep_order() {
        let metadata = from_pairs([("z", 1), ("a", 2), ("m", 3)]);
        let keys: Vec<_> = metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
