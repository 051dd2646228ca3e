//! Deterministic JSON serialization with sorted object keys.
//!
//! Two replicas holding identical values produce byte-identical text, whatever
//! order their object keys were inserted in.

use serde_json::Value;

/// Serialize `value` to a deterministic JSON string with sorted object keys.
///
/// All other values follow standard JSON serialization rules; strings are
/// escaped by `serde_json`.
///
/// ```
/// use serde_json::json;
/// use replisync_util::json_stable::stringify;
///
/// assert_eq!(stringify(&json!({"b": 2, "a": [1, "x"]})), r#"{"a":[1,"x"],"b":2}"#);
/// ```
pub fn stringify(val: &Value) -> String {
    let mut out = String::new();
    write_value(val, &mut out);
    out
}

fn write_value(val: &Value, out: &mut String) {
    match val {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_str(s, out),
        Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_str(key, out);
                out.push(':');
                write_value(&obj[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

fn write_str(s: &str, out: &mut String) {
    // Serializing a &str cannot fail.
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("\"\""),
    }
}
