use serde_json::{Number, Value};

/// Performs a deep equality check between two JSON values.
///
/// Objects compare by key set regardless of insertion order, arrays
/// element-by-element. Numbers compare by numeric value, so `1` and `1.0`
/// are equal the way they are on the wire.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use replisync_util::json_equal::deep_equal;
///
/// let a = json!({"foo": [1, 2, 3], "bar": 1.0});
/// let b = json!({"bar": 1, "foo": [1, 2, 3]});
/// let c = json!({"foo": [1, 2, 4], "bar": 1});
///
/// assert!(deep_equal(&a, &b));
/// assert!(!deep_equal(&a, &c));
/// ```
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => number_equal(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(arr_a), Value::Array(arr_b)) => {
            arr_a.len() == arr_b.len()
                && arr_a.iter().zip(arr_b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(obj_a), Value::Object(obj_b)) => {
            if obj_a.len() != obj_b.len() {
                return false;
            }
            obj_a
                .iter()
                .all(|(key, val_a)| obj_b.get(key).is_some_and(|val_b| deep_equal(val_a, val_b)))
        }
        // Different types are never equal
        _ => false,
    }
}

fn number_equal(a: &Number, b: &Number) -> bool {
    if a == b {
        return true;
    }
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_equal_null() {
        assert!(deep_equal(&json!(null), &json!(null)));
    }

    #[test]
    fn test_zero_and_null_not_equal() {
        assert!(!deep_equal(&json!(0), &json!(null)));
    }

    #[test]
    fn test_one_and_true_not_equal() {
        assert!(!deep_equal(&json!(1), &json!(true)));
    }

    #[test]
    fn test_integer_and_float_forms_equal() {
        assert!(deep_equal(&json!(2), &json!(2.0)));
        assert!(!deep_equal(&json!(2), &json!(2.5)));
    }

    #[test]
    fn test_equal_objects_different_order() {
        let a = json!({"a": 1, "b": [true, null]});
        let b = json!({"b": [true, null], "a": 1});
        assert!(deep_equal(&a, &b));
    }

    #[test]
    fn test_not_equal_objects_extra_property() {
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_not_equal_arrays_different_length() {
        assert!(!deep_equal(&json!([1, 2]), &json!([1, 2, 3])));
    }

    #[test]
    fn test_equal_nested_objects() {
        let a = json!({"pos": {"x": 1, "y": [1, {"z": "w"}]}});
        let b = json!({"pos": {"y": [1, {"z": "w"}], "x": 1}});
        assert!(deep_equal(&a, &b));
    }
}
