//! Values handling with deep merge and `--set` style path assignment

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Highest list index accepted in a target path
const MAX_INDEX: usize = 65536;

/// Values container with deep merge capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Default for Values {
    fn default() -> Self {
        Self::new()
    }
}

/// How a raw string is interpreted when assigned at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assign {
    /// Infer booleans, null, integers and lists
    Typed,
    /// Always insert a string
    Literal,
}

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Parse values from a YAML document
    ///
    /// An empty document yields empty values; anything other than a map is
    /// rejected.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        match value {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(_) => Ok(Self(value)),
            other => Err(CoreError::ValuesMerge {
                message: format!("values must be a map, got {}", type_name(&other)),
            }),
        }
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Objects: recursive merge
    /// - Arrays: overlay replaces base (not appended)
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Merge multiple values in order
    pub fn merge_all(values: impl IntoIterator<Item = Values>) -> Self {
        let mut result = Values::new();
        for v in values {
            result.merge(&v);
        }
        result
    }

    /// Get a value by dotted path (e.g., "image.tag")
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        path.split('.').try_fold(&self.0, |value, key| match value {
            JsonValue::Object(map) => map.get(key),
            _ => None,
        })
    }

    /// Assign a raw string at a `--set` style path
    ///
    /// The path is dot separated, `\.` escapes a literal dot and `name[N]`
    /// addresses a list element. Missing maps are created and lists are
    /// padded with nulls.
    pub fn set_path(&mut self, path: &str, raw: &str, assign: Assign) -> Result<()> {
        let segments = parse_path(path)?;
        let value = match assign {
            Assign::Typed => typed_value(raw),
            Assign::Literal => JsonValue::String(raw.to_string()),
        };
        set_segments(&mut self.0, &segments, value, path)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }
}

impl From<JsonValue> for Values {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::new(),
            value => Self(value),
        }
    }
}

/// Deep merge two JSON values
fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Infer the type of a `--set` style value
///
/// Floats are left as strings.
pub fn typed_value(raw: &str) -> JsonValue {
    if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        return list_value(inner);
    }
    if raw.contains(',') {
        return list_value(raw);
    }
    scalar_value(raw)
}

fn list_value(inner: &str) -> JsonValue {
    if inner.is_empty() {
        return JsonValue::Array(Vec::new());
    }
    JsonValue::Array(inner.split(',').map(scalar_value).collect())
}

fn scalar_value(raw: &str) -> JsonValue {
    if raw.eq_ignore_ascii_case("true") {
        return JsonValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return JsonValue::Bool(false);
    }
    if raw.eq_ignore_ascii_case("null") {
        return JsonValue::Null;
    }
    if raw == "0" {
        return JsonValue::from(0);
    }
    if !raw.starts_with('0') {
        if let Ok(n) = raw.parse::<i64>() {
            return JsonValue::from(n);
        }
    }
    JsonValue::String(raw.to_string())
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Split a target path into keys and list indexes
fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let invalid = |reason: &str| CoreError::ValuesMerge {
        message: format!("invalid target path '{}': {}", path, reason),
    };

    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars().peekable();
    // set after a closing bracket: only '.', '[' or end may follow
    let mut after_index = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| invalid("trailing escape"))?;
                if after_index {
                    return Err(invalid("unexpected data after index"));
                }
                key.push(escaped);
            }
            '.' => {
                if !after_index {
                    if key.is_empty() {
                        return Err(invalid("empty key"));
                    }
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                after_index = false;
            }
            '[' => {
                if !after_index {
                    if key.is_empty() {
                        return Err(invalid("list index without a key"));
                    }
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) => digits.push(d),
                        None => return Err(invalid("unterminated list index")),
                    }
                }
                let index: usize = digits
                    .parse()
                    .map_err(|_| invalid(&format!("'{}' is not a valid list index", digits)))?;
                if index > MAX_INDEX {
                    return Err(invalid(&format!(
                        "index of {} is greater than maximum supported index {}",
                        index, MAX_INDEX
                    )));
                }
                segments.push(Segment::Index(index));
                after_index = true;
            }
            c => {
                if after_index {
                    return Err(invalid("unexpected data after index"));
                }
                key.push(c);
            }
        }
    }

    if !after_index {
        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        segments.push(Segment::Key(key));
    }

    Ok(segments)
}

fn set_segments(target: &mut JsonValue, segments: &[Segment], value: JsonValue, path: &str) -> Result<()> {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return Ok(());
    };

    let slot = match first {
        Segment::Key(key) => {
            if !target.is_object() {
                *target = JsonValue::Object(serde_json::Map::new());
            }
            let JsonValue::Object(map) = target else {
                return Err(CoreError::ValuesMerge {
                    message: format!("unable to set '{}'", path),
                });
            };
            map.entry(key.clone()).or_insert(JsonValue::Null)
        }
        Segment::Index(index) => {
            if !target.is_array() {
                *target = JsonValue::Array(Vec::new());
            }
            let JsonValue::Array(list) = target else {
                return Err(CoreError::ValuesMerge {
                    message: format!("unable to set '{}'", path),
                });
            };
            if list.len() <= *index {
                list.resize(index + 1, JsonValue::Null);
            }
            &mut list[*index]
        }
    };

    set_segments(slot, rest, value, path)
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge() {
        let mut base = Values::from_yaml(r#"
image:
  repository: nginx
  tag: "1.0"
replicas: 1
ports: [80, 443]
"#).unwrap();

        let overlay = Values::from_yaml(r#"
image:
  tag: "2.0"
  pullPolicy: Always
replicas: 3
ports: [8080]
"#).unwrap();

        base.merge(&overlay);

        assert_eq!(base.get("image.repository").unwrap(), "nginx");
        assert_eq!(base.get("image.tag").unwrap(), "2.0");
        assert_eq!(base.get("image.pullPolicy").unwrap(), "Always");
        assert_eq!(base.get("replicas").unwrap(), 3);
        assert_eq!(base.get("ports").unwrap(), &json!([8080]));
    }

    #[test]
    fn test_merge_all_precedence() {
        let merged = Values::merge_all(vec![
            Values::from_yaml("a: 1\nb: 1").unwrap(),
            Values::from_yaml("b: 2\nc: 2").unwrap(),
            Values::from_yaml("c: 3").unwrap(),
        ]);
        assert_eq!(merged.inner(), &json!({"a": 1, "b": 2, "c": 3}));
    }

    #[test]
    fn test_from_yaml_empty_and_invalid() {
        assert!(Values::from_yaml("").unwrap().is_empty());
        assert!(Values::from_yaml("# nothing\n").unwrap().is_empty());
        assert!(Values::from_yaml("- a\n- b\n").is_err());
    }

    #[test]
    fn test_typed_value() {
        assert_eq!(typed_value("true"), json!(true));
        assert_eq!(typed_value("FALSE"), json!(false));
        assert_eq!(typed_value("null"), JsonValue::Null);
        assert_eq!(typed_value("0"), json!(0));
        assert_eq!(typed_value("42"), json!(42));
        assert_eq!(typed_value("-7"), json!(-7));
        assert_eq!(typed_value("007"), json!("007"));
        assert_eq!(typed_value("1.5"), json!("1.5"));
        assert_eq!(typed_value("hello"), json!("hello"));
        assert_eq!(typed_value("{a,1,true}"), json!(["a", 1, true]));
        assert_eq!(typed_value("x,y"), json!(["x", "y"]));
        assert_eq!(typed_value("{}"), json!([]));
    }

    #[test]
    fn test_set_path_nested() {
        let mut values = Values::new();
        values.set_path("image.tag", "v1", Assign::Typed).unwrap();
        values.set_path("replicas", "3", Assign::Typed).unwrap();

        assert_eq!(values.get("image.tag").unwrap(), "v1");
        assert_eq!(values.get("replicas").unwrap(), 3);
    }

    #[test]
    fn test_set_path_literal() {
        let mut values = Values::new();
        values.set_path("flag", "true", Assign::Literal).unwrap();
        assert_eq!(values.get("flag").unwrap(), &json!("true"));

        values.set_path("flag", "true", Assign::Typed).unwrap();
        assert_eq!(values.get("flag").unwrap(), &json!(true));
    }

    #[test]
    fn test_set_path_escaped_dot() {
        let mut values = Values::new();
        values
            .set_path(r"annotations.example\.com/owner", "team", Assign::Typed)
            .unwrap();
        assert_eq!(
            values.inner(),
            &json!({"annotations": {"example.com/owner": "team"}})
        );
    }

    #[test]
    fn test_set_path_list_index_pads_with_null() {
        let mut values = Values::new();
        values.set_path("hosts[2].name", "c", Assign::Typed).unwrap();
        assert_eq!(
            values.inner(),
            &json!({"hosts": [null, null, {"name": "c"}]})
        );

        values.set_path("hosts[0].name", "a", Assign::Typed).unwrap();
        assert_eq!(values.inner()["hosts"][0], json!({"name": "a"}));
        assert_eq!(values.inner()["hosts"][2], json!({"name": "c"}));
    }

    #[test]
    fn test_set_path_nested_index() {
        let mut values = Values::new();
        values.set_path("matrix[1][0]", "x", Assign::Typed).unwrap();
        assert_eq!(values.inner(), &json!({"matrix": [null, ["x"]]}));
    }

    #[test]
    fn test_set_path_replaces_scalar_with_map() {
        let mut values = Values::from_yaml("image: nginx").unwrap();
        values.set_path("image.tag", "1.0", Assign::Literal).unwrap();
        assert_eq!(values.inner(), &json!({"image": {"tag": "1.0"}}));
    }

    #[test]
    fn test_set_path_invalid() {
        let mut values = Values::new();
        assert!(values.set_path("", "x", Assign::Typed).is_err());
        assert!(values.set_path("a..b", "x", Assign::Typed).is_err());
        assert!(values.set_path("a[x]", "x", Assign::Typed).is_err());
        assert!(values.set_path("a[1", "x", Assign::Typed).is_err());
        assert!(values.set_path("a[70000]", "x", Assign::Typed).is_err());
    }
}
