//! A tagged-union value tree for frontmatter and schema work.
//!
//! `serde_yaml::Value`/`serde_json::Value` already provide this, but every
//! later pass in the pipeline needs to pattern-match on the same shape
//! regardless of which format a field originated in, so we normalize once
//! at the frontmatter boundary.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Walks a dotted path (`"safe-outputs.create-issue.max"`) through nested maps.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Every string value in the tree, depth-first, for the expression validator to scan.
    pub fn walk_strings<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Value::String(s) => out.push(s),
            Value::List(items) => items.iter().for_each(|v| v.walk_strings(out)),
            Value::Map(m) => m.values().for_each(|v| v.walk_strings(out)),
            _ => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(_) | Value::Map(_) => write!(f, "{self:?}"),
        }
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(v: serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => {
                Value::List(seq.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    let key = match k {
                        serde_yaml::Value::String(s) => s,
                        other => serde_yaml::to_string(&other).unwrap_or_default().trim().to_string(),
                    };
                    out.insert(key, Value::from(v));
                }
                Value::Map(out)
            }
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(x) => serde_json::Number::from_f64(x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => serde_json::Value::Array(items.into_iter().map(Into::into).collect()),
            Value::Map(m) => {
                serde_json::Value::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<Value> for serde_yaml::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_yaml::Value::Null,
            Value::Bool(b) => serde_yaml::Value::Bool(b),
            Value::Int(i) => serde_yaml::Value::Number(i.into()),
            Value::Float(x) => serde_yaml::Value::Number(x.into()),
            Value::String(s) => serde_yaml::Value::String(s),
            Value::List(items) => serde_yaml::Value::Sequence(items.into_iter().map(Into::into).collect()),
            Value::Map(m) => serde_yaml::Value::Mapping(
                m.into_iter()
                    .map(|(k, v)| (serde_yaml::Value::String(k), v.into()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml_value(src: &str) -> Value {
        Value::from(serde_yaml::from_str::<serde_yaml::Value>(src).unwrap())
    }

    #[test]
    fn converts_scalar_kinds() {
        assert_eq!(yaml_value("true"), Value::Bool(true));
        assert_eq!(yaml_value("42"), Value::Int(42));
        assert_eq!(yaml_value("hello"), Value::String("hello".into()));
        assert_eq!(yaml_value("null"), Value::Null);
    }

    #[test]
    fn get_path_walks_nested_maps() {
        let v = yaml_value("safe-outputs:\n  create-issue:\n    max: 2\n");
        assert_eq!(v.get_path("safe-outputs.create-issue.max"), Some(&Value::Int(2)));
        assert_eq!(v.get_path("safe-outputs.nope"), None);
    }

    #[test]
    fn walk_strings_collects_depth_first() {
        let v = yaml_value("on: push\ntools:\n  - bash\n  - edit\n");
        let mut out = Vec::new();
        v.walk_strings(&mut out);
        assert!(out.contains(&"push"));
        assert!(out.contains(&"bash"));
        assert!(out.contains(&"edit"));
    }

    #[test]
    fn mapping_key_order_is_sorted() {
        let v = yaml_value("z: 1\na: 2\n");
        let m = v.as_map().unwrap();
        let keys: Vec<&str> = m.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "z"]);
    }

    #[test]
    fn converts_back_to_serde_yaml() {
        let v = yaml_value("on: push\n");
        let yaml: serde_yaml::Value = v.into();
        assert_eq!(yaml.get("on").and_then(|x| x.as_str()), Some("push"));
    }
}
