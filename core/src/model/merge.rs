//! # Deep Merge
//!
//! Composition used by `allOf` and by `oneOf` kinds inheriting their parent's
//! shared keywords: objects merge key-wise, arrays concatenate (skipping items
//! already present), scalars from the overlay win.

use serde_json::Value;

/// Merges `overlay` into `base` in place.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            for item in source {
                if !target.contains(item) {
                    target.push(item.clone());
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// Returns a fresh value with `overlay` merged on top of `base`.
pub fn merged(base: &Value, overlay: &Value) -> Value {
    let mut out = base.clone();
    deep_merge(&mut out, overlay);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_objects_merge_keywise() {
        let mut base = json!({"type": "object", "properties": {"a": {"type": "string"}}});
        deep_merge(
            &mut base,
            &json!({"properties": {"b": {"type": "integer"}}, "description": "x"}),
        );
        assert_eq!(
            base,
            json!({
                "type": "object",
                "properties": {"a": {"type": "string"}, "b": {"type": "integer"}},
                "description": "x"
            })
        );
    }

    #[test]
    fn test_arrays_union() {
        let out = merged(&json!({"required": ["a", "b"]}), &json!({"required": ["b", "c"]}));
        assert_eq!(out, json!({"required": ["a", "b", "c"]}));
    }

    #[test]
    fn test_scalar_overlay_wins() {
        let out = merged(&json!({"maxLength": 10}), &json!({"maxLength": 255}));
        assert_eq!(out, json!({"maxLength": 255}));
    }
}
