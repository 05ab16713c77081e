//! # Schema-Tolerant Field Lookup
//!
//! Upstream services disagree on key spelling and nesting. Each logical
//! field is described by an ordered list of accessor paths; lookup walks the
//! list in priority order and returns the first non-empty value. The lists
//! are plain data so each one can be inspected and tested on its own.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// A path of object keys from the document root, e.g. `&["data", "md5"]`.
pub type FieldPath = &'static [&'static str];

/// Follow one path. Returns `None` if any hop is missing or not an object.
pub fn get_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.as_object()?.get(*key))
}

/// Whether a value carries information (not null, not a blank string,
/// not an empty array or object).
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// First present value among `paths`, in order.
pub fn first_present<'a>(root: &'a Value, paths: &[FieldPath]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| get_path(root, path))
        .find(|value| is_present(value))
}

/// First present value rendered as a trimmed string. Numbers and booleans
/// are stringified; objects and arrays are skipped.
pub fn first_string(root: &Value, paths: &[FieldPath]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| get_path(root, path))
        .find_map(value_as_string)
}

/// First value that parses as a decimal (JSON number or numeric string).
pub fn first_decimal(root: &Value, paths: &[FieldPath]) -> Option<Decimal> {
    paths
        .iter()
        .filter_map(|path| get_path(root, path))
        .find_map(value_as_decimal)
}

/// First value that is an integer (JSON number or integer string).
pub fn first_i64(root: &Value, paths: &[FieldPath]) -> Option<i64> {
    paths
        .iter()
        .filter_map(|path| get_path(root, path))
        .find_map(value_as_i64)
}

/// Scalar value as a trimmed, non-empty string.
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Scalar value as a decimal.
pub fn value_as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

/// Scalar value as an integer. Fractional numbers are truncated.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Depth-first search for the first present value stored under any of
/// `keys`, at any nesting depth.
///
/// Keys are tried in priority order at each level before descending, so a
/// shallow `qr` wins over a deeply nested one.
pub fn find_key_recursive<'a>(root: &'a Value, keys: &[&str], max_depth: usize) -> Option<&'a Value> {
    let object = root.as_object()?;
    for key in keys {
        if let Some(value) = object.get(*key) {
            if matches!(value, Value::String(_)) && is_present(value) {
                return Some(value);
            }
        }
    }
    if max_depth == 0 {
        return None;
    }
    keys.iter()
        .filter_map(|key| object.get(*key))
        .chain(object.values())
        .filter(|value| value.is_object())
        .find_map(|nested| find_key_recursive(nested, keys, max_depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AMOUNT_PATHS: &[FieldPath] = &[&["amount"], &["data", "amount"], &["totalAmount"]];

    #[test]
    fn get_path_follows_nested_keys() {
        let doc = json!({"data": {"md5": "abc"}});
        assert_eq!(get_path(&doc, &["data", "md5"]), Some(&json!("abc")));
        assert_eq!(get_path(&doc, &["data", "qr"]), None);
        assert_eq!(get_path(&doc, &["data", "md5", "deeper"]), None);
    }

    #[test]
    fn earlier_paths_win() {
        let doc = json!({"amount": "10.00", "data": {"amount": 99}});
        assert_eq!(first_decimal(&doc, AMOUNT_PATHS), Some("10.00".parse().unwrap()));
    }

    #[test]
    fn blank_values_fall_through() {
        let doc = json!({"amount": "  ", "data": {"amount": null}, "totalAmount": 12.5});
        assert_eq!(first_decimal(&doc, AMOUNT_PATHS), Some("12.5".parse().unwrap()));
        assert_eq!(first_present(&doc, AMOUNT_PATHS), Some(&json!(12.5)));
    }

    #[test]
    fn strings_and_integers_coerce() {
        let doc = json!({"a": 1_700_000_000_000_i64, "b": " 42 ", "c": true});
        assert_eq!(first_i64(&doc, &[&["a"]]), Some(1_700_000_000_000));
        assert_eq!(first_i64(&doc, &[&["b"]]), Some(42));
        assert_eq!(first_string(&doc, &[&["c"]]).as_deref(), Some("true"));
    }

    #[test]
    fn recursive_search_prefers_shallow_keys() {
        let doc = json!({
            "status": {"code": 0},
            "data": {"qr": "deep", "payload": {"qr": "deeper"}},
            "qr": "shallow"
        });
        assert_eq!(find_key_recursive(&doc, &["qr", "payload"], 4), Some(&json!("shallow")));
    }

    #[test]
    fn recursive_search_descends_into_wrappers() {
        let doc = json!({"result": {"data": {"payload": "000201"}}});
        assert_eq!(
            find_key_recursive(&doc, &["qr", "payload", "data"], 4),
            Some(&json!("000201"))
        );
        assert_eq!(find_key_recursive(&doc, &["qr"], 4), None);
    }

    #[test]
    fn recursive_search_respects_depth() {
        let doc = json!({"a": {"b": {"qr": "x"}}});
        assert_eq!(find_key_recursive(&doc, &["qr"], 1), None);
        assert_eq!(find_key_recursive(&doc, &["qr"], 2), Some(&json!("x")));
    }
}
