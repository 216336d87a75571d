//! Dotted-path lookup over an event projection.

use serde_json::Value;

/// Resolve `a.b.c` against `doc`.
///
/// Objects are indexed by key and arrays by a decimal segment. A missing key,
/// an out-of-range index or a scalar intermediate yields `None`. A present
/// `null` leaf is returned as `Some(&Value::Null)`.
pub fn resolve<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Text form of a value for use as an aggregation key.
///
/// Strings are used verbatim, numbers and booleans by their JSON text and
/// containers as compact JSON. `null` and the empty string are untracked.
pub fn stringify_for_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

/// Resolve and stringify in one step.
pub fn key_value(doc: &Value, path: &str) -> Option<String> {
    resolve(doc, path).and_then(stringify_for_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "actor": {"ip": "10.0.0.9", "geo": {"country": "NL"}, "tags": ["vpn", "tor"]},
            "target": {"port": 22},
            "metadata": {"reason": null, "empty": ""}
        })
    }

    #[test]
    fn resolves_nested_keys() {
        let doc = doc();
        assert_eq!(resolve(&doc, "actor.ip"), Some(&json!("10.0.0.9")));
        assert_eq!(resolve(&doc, "actor.geo.country"), Some(&json!("NL")));
        assert_eq!(resolve(&doc, "target.port"), Some(&json!(22)));
    }

    #[test]
    fn resolves_array_index() {
        let doc = doc();
        assert_eq!(resolve(&doc, "actor.tags.1"), Some(&json!("tor")));
        assert_eq!(resolve(&doc, "actor.tags.2"), None);
        assert_eq!(resolve(&doc, "actor.tags.first"), None);
    }

    #[test]
    fn absent_paths_are_none() {
        let doc = doc();
        assert_eq!(resolve(&doc, "actor.email"), None);
        assert_eq!(resolve(&doc, "actor.ip.octet"), None);
        assert_eq!(resolve(&doc, "metadata.reason.code"), None);
        assert_eq!(resolve(&doc, "source.name"), None);
    }

    #[test]
    fn null_leaf_is_present() {
        assert_eq!(resolve(&doc(), "metadata.reason"), Some(&Value::Null));
    }

    #[test]
    fn stringify_rules() {
        assert_eq!(stringify_for_key(&json!("a")), Some("a".to_string()));
        assert_eq!(stringify_for_key(&json!(22)), Some("22".to_string()));
        assert_eq!(stringify_for_key(&json!(1.5)), Some("1.5".to_string()));
        assert_eq!(stringify_for_key(&json!(false)), Some("false".to_string()));
        assert_eq!(stringify_for_key(&json!({"b": 1, "a": 2})), Some(r#"{"a":2,"b":1}"#.to_string()));
        assert_eq!(stringify_for_key(&json!([1, "x"])), Some(r#"[1,"x"]"#.to_string()));
        assert_eq!(stringify_for_key(&Value::Null), None);
        assert_eq!(stringify_for_key(&json!("")), None);
    }

    #[test]
    fn key_value_untracked_cases() {
        let doc = doc();
        assert_eq!(key_value(&doc, "metadata.empty"), None);
        assert_eq!(key_value(&doc, "metadata.reason"), None);
        assert_eq!(key_value(&doc, "actor.missing"), None);
        assert_eq!(key_value(&doc, "actor.ip").as_deref(), Some("10.0.0.9"));
    }
}
