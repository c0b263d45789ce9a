use crate::canonicalizer::CanonicalizationError;
use serde_json::Value;

fn check_finite(value: &Value, at: &str) -> Result<(), CanonicalizationError> {
    match value {
        Value::Number(num) => match num.as_f64() {
            Some(f) if !f.is_finite() => Err(CanonicalizationError::NonFiniteNumber(at.to_string())),
            _ => Ok(()),
        },
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_finite(item, &format!("{}[{}]", at, i))),
        Value::Object(map) => map
            .iter()
            .try_for_each(|(key, child)| check_finite(child, &format!("{}.{}", at, key))),
        _ => Ok(()),
    }
}

/// Serializes `value` to its exact canonical byte sequence (RFC 8785):
/// sorted keys, no insignificant whitespace, deterministic numbers and
/// escaping. Key insertion order never matters.
pub fn to_canonical_bytes(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    check_finite(value, "root")?;
    let text = canonical_json::to_string(value)
        .map_err(|err| CanonicalizationError::Other(err.to_string()))?;
    Ok(text.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_is_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":true,"x":"s"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":"s","y":true},"b":1}"#).unwrap();
        assert_eq!(to_canonical_bytes(&a).unwrap(), to_canonical_bytes(&b).unwrap());
        assert_eq!(
            to_canonical_bytes(&a).unwrap(),
            br#"{"a":{"x":"s","y":true},"b":1}"#.to_vec()
        );
    }

    #[test]
    fn no_insignificant_whitespace() {
        let bytes = to_canonical_bytes(&json!({"list": [1, 2, 3], "s": "a b"})).unwrap();
        assert_eq!(bytes, br#"{"list":[1,2,3],"s":"a b"}"#.to_vec());
    }
}
