//! Chart filters
//!
//! The subset of Helm's sprig helpers that charts reach for most often,
//! exposed as MiniJinja filters.

use base64::Engine as _;
use minijinja::{Error, ErrorKind, Value};
use sha2::{Digest, Sha256};

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|e| invalid(e.to_string()))
}

/// Strings pass through unchanged, everything else uses its display form
fn text_of(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None if value.is_none() || value.is_undefined() => String::new(),
        None => value.to_string(),
    }
}

/// `{{ values.resources | toyaml }}`
pub fn toyaml(value: Value) -> Result<String, Error> {
    let json = to_json(&value)?;
    let yaml = serde_yaml::to_string(&json).map_err(|e| invalid(e.to_string()))?;
    Ok(yaml.trim_end().to_string())
}

/// `{{ values.config | tojson }}`
pub fn tojson(value: Value) -> Result<String, Error> {
    let json = to_json(&value)?;
    serde_json::to_string(&json).map_err(|e| invalid(e.to_string()))
}

pub fn b64encode(value: Value) -> String {
    base64::engine::general_purpose::STANDARD.encode(text_of(&value))
}

pub fn b64decode(value: String) -> Result<String, Error> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| invalid(format!("b64decode: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| invalid(format!("b64decode: {}", e)))
}

/// Double-quote a scalar; missing values quote as `""`
pub fn quote(value: Value) -> String {
    let s = text_of(&value);
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn squote(value: Value) -> String {
    format!("'{}'", text_of(&value).replace('\'', "''"))
}

/// Prefix every line with `width` spaces
pub fn indent(value: String, width: usize) -> String {
    let pad = " ".repeat(width);
    value
        .split('\n')
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `indent` preceded by a newline
pub fn nindent(value: String, width: usize) -> String {
    format!("\n{}", indent(value, width))
}

/// Fail rendering when the value is missing or empty
///
/// `{{ values.host | required("host is required") }}`
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(str::is_empty);
    if missing {
        return Err(invalid(
            message.unwrap_or_else(|| "required value is missing".to_string()),
        ));
    }
    Ok(value)
}

pub fn sha256sum(value: String) -> String {
    let digest = Sha256::digest(value.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Truncate to `length` characters; a negative length keeps the tail
pub fn trunc(value: String, length: i64) -> String {
    let chars: Vec<char> = value.chars().collect();
    let n = chars.len() as i64;
    if length >= 0 {
        chars.iter().take(length as usize).collect()
    } else if -length >= n {
        value
    } else {
        chars[(n + length) as usize..].iter().collect()
    }
}

pub fn trimprefix(value: String, prefix: String) -> String {
    value
        .strip_prefix(prefix.as_str())
        .map(str::to_string)
        .unwrap_or(value)
}

pub fn trimsuffix(value: String, suffix: String) -> String {
    value
        .strip_suffix(suffix.as_str())
        .map(str::to_string)
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toyaml_nested() {
        let value = Value::from_serialize(serde_json::json!({"limits": {"cpu": "1"}}));
        assert_eq!(toyaml(value).unwrap(), "limits:\n  cpu: '1'");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(Value::from("a\"b")), "\"a\\\"b\"");
        assert_eq!(quote(Value::from(3)), "\"3\"");
        assert_eq!(quote(Value::UNDEFINED), "\"\"");
        assert_eq!(squote(Value::from("it's")), "'it''s'");
    }

    #[test]
    fn test_indent_every_line() {
        assert_eq!(indent("a\nb".into(), 2), "  a\n  b");
        assert_eq!(nindent("a".into(), 4), "\n    a");
    }

    #[test]
    fn test_required() {
        assert!(required(Value::UNDEFINED, None).is_err());
        assert!(required(Value::from(""), Some("host".into())).is_err());
        assert_eq!(required(Value::from("x"), None).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_base64() {
        assert_eq!(b64encode(Value::from("hello")), "aGVsbG8=");
        assert_eq!(b64decode("aGVsbG8=".into()).unwrap(), "hello");
        assert!(b64decode("%%%".into()).is_err());
    }

    #[test]
    fn test_trunc_and_trim() {
        assert_eq!(trunc("abcdef".into(), 3), "abc");
        assert_eq!(trunc("abcdef".into(), -2), "ef");
        assert_eq!(trunc("ab".into(), 10), "ab");
        assert_eq!(trimprefix("v1.2".into(), "v".into()), "1.2");
        assert_eq!(trimsuffix("name-".into(), "-".into()), "name");
    }

    #[test]
    fn test_sha256() {
        assert_eq!(
            sha256sum("abc".into()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
