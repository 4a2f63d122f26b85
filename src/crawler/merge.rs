//! Info merge policy

use serde_json::Value;

/// Applies `new` on top of a copy of `old`
///
/// When both payloads are objects, keys of `new` overwrite and keys only in
/// `old` survive. Any other shape is replaced wholesale by `new`.
///
/// # Example
///
/// ```
/// use pagewalk::crawler::merge_info;
/// use serde_json::json;
///
/// let merged = merge_info(&json!({"a": 1, "b": 2}), json!({"b": 3, "c": 4}));
/// assert_eq!(merged, json!({"a": 1, "b": 3, "c": 4}));
/// ```
pub fn merge_info(old: &Value, new: Value) -> Value {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => {
            let mut merged = old.clone();
            merged.extend(new);
            Value::Object(merged)
        }
        (_, new) => new,
    }
}
