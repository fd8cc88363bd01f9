//! Canonical JSON encoding used for hashing and signing.
//!
//! Keys are sorted lexicographically at every object level, separators are
//! exactly `,` and `:` with no surrounding whitespace, and numbers/bools/null
//! are emitted with `serde_json`'s standard rendering. The encoder is pure
//! and total over `serde_json::Value` — it never fails.

use serde_json::{Map, Value};

/// Serialize `value` to its canonical byte representation.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

pub fn canonicalize_to_string(value: &Value) -> String {
    String::from_utf8(canonicalize(value)).expect("canonical JSON is always valid UTF-8")
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        // Scalars already serialize deterministically (sorted-key objects
        // are the only place `serde_json`'s default output is order-sensitive).
        other => out.extend_from_slice(&serde_json::to_vec(other).expect("scalar JSON values always serialize")),
    }
}

fn write_object(map: &Map<String, Value>, out: &mut Vec<u8>) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push(b'{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        out.extend_from_slice(&serde_json::to_vec(key).expect("string keys always serialize"));
        out.push(b':');
        write_canonical(&map[*key], out);
    }
    out.push(b'}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_at_every_level() {
        let a = json!({"b": 1, "a": {"z": 1, "y": 2}});
        let b = json!({"a": {"y": 2, "z": 1}, "b": 1});
        assert_eq!(canonicalize(&a), canonicalize(&b));
        assert_eq!(canonicalize_to_string(&a), r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn no_insignificant_whitespace() {
        let v = json!({"x": [1, 2, 3], "y": null, "z": true});
        let s = canonicalize_to_string(&v);
        assert!(!s.contains(' '));
        assert!(!s.contains('\n'));
    }

    #[test]
    fn array_order_is_preserved() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonicalize_to_string(&v), "[3,1,2]");
    }

    #[test]
    fn distinct_values_produce_distinct_bytes() {
        let a = json!({"amount": 100});
        let b = json!({"amount": 101});
        assert_ne!(canonicalize(&a), canonicalize(&b));
    }
}
