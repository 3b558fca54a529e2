//! YAML serialization with the engine's conventions.
//!
//! - MISSING serializes as the literal `???` and loads back as MISSING.
//! - Interpolation expressions serialize verbatim, never resolved.
//! - Strings that would re-parse as int/float/bool are quoted by the codec.
//! - Duplicate keys are a load error (enforced by the codec).
//! - An empty document loads to an empty map container.

use crate::base::{Key, Value};
use crate::config::Config;
use crate::errors::{ConfigError, Result};

impl Config {
    /// Load a configuration from a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|err| ConfigError::validation("", err.to_string(), "YAML document"))?;
        load_yaml_value(&doc)
    }

    /// Serialize to YAML without resolving interpolations.
    pub fn to_yaml(&self) -> Result<String> {
        let plain = crate::convert::project_raw(&self.tree, self.tree.root());
        serde_yaml::to_string(&value_to_yaml(&plain))
            .map_err(|err| ConfigError::validation("", err.to_string(), "YAML document"))
    }
}

/// Build a configuration from an in-memory YAML value.
pub(crate) fn load_yaml_value(doc: &serde_yaml::Value) -> Result<Config> {
    match yaml_to_value(doc)? {
        Value::Null => Ok(Config::new()),
        value @ (Value::Map(_) | Value::List(_)) => Config::from_value(value),
        other => Err(ConfigError::type_error(
            "",
            "map or list document",
            other.type_name(),
        )),
    }
}

fn yaml_to_value(doc: &serde_yaml::Value) -> Result<Value> {
    match doc {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else {
                Ok(Value::Float(n.as_f64().expect("yaml number")))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_yaml::Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(yaml_to_value(item)?);
            }
            Ok(Value::List(out))
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut out = indexmap::IndexMap::with_capacity(mapping.len());
            for (key, value) in mapping {
                out.insert(yaml_key(key)?, yaml_to_value(value)?);
            }
            Ok(Value::Map(out))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(&tagged.value),
    }
}

fn yaml_key(key: &serde_yaml::Value) -> Result<Key> {
    match key {
        serde_yaml::Value::String(s) => Ok(Key::from(s.as_str())),
        serde_yaml::Value::Bool(b) => Ok(Key::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Key::Int(i))
            } else {
                Ok(Key::from(n.as_f64().expect("yaml number")))
            }
        }
        other => Err(ConfigError::validation(
            "",
            format!("{other:?}"),
            "scalar mapping key",
        )),
    }
}

pub(crate) fn value_to_yaml(value: &Value) -> serde_yaml::Value {
    match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Int(i) => serde_yaml::Value::Number((*i).into()),
        Value::Float(f) => serde_yaml::Value::Number((*f).into()),
        Value::Str(s) => serde_yaml::Value::String(s.clone()),
        Value::Bytes(bytes) => serde_yaml::Value::Sequence(
            bytes
                .iter()
                .map(|b| serde_yaml::Value::Number((*b as i64).into()))
                .collect(),
        ),
        Value::Path(p) => serde_yaml::Value::String(p.display().to_string()),
        Value::Enum(m) => serde_yaml::Value::String(m.name().to_string()),
        Value::List(items) => {
            serde_yaml::Value::Sequence(items.iter().map(value_to_yaml).collect())
        }
        Value::Map(map) => {
            let mut out = serde_yaml::Mapping::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key_to_yaml(key), value_to_yaml(value));
            }
            serde_yaml::Value::Mapping(out)
        }
    }
}

fn key_to_yaml(key: &Key) -> serde_yaml::Value {
    match key {
        Key::Str(s) => serde_yaml::Value::String(s.to_string()),
        Key::Int(i) => serde_yaml::Value::Number((*i).into()),
        Key::Bool(b) => serde_yaml::Value::Bool(*b),
        Key::Float(bits) => serde_yaml::Value::Number(bits.value().into()),
        Key::Bytes(_) | Key::Enum { .. } => serde_yaml::Value::String(key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use crate::base::Value;
    use crate::config::Config;
    use crate::convert::ToContainerOpts;

    #[test]
    fn test_empty_document_is_empty_map() {
        let cfg = Config::from_yaml("").unwrap();
        assert_eq!(cfg, Config::new());
        assert!(!cfg.is_readonly("").unwrap());
        assert!(!cfg.is_struct("").unwrap());
    }

    #[test]
    fn test_missing_round_trips_as_question_marks() {
        let cfg = Config::from_yaml("a: '???'\nb: ???\n").unwrap();
        assert!(cfg.is_missing("a").unwrap());
        assert!(cfg.is_missing("b").unwrap());
        let out = cfg.to_yaml().unwrap();
        let again = Config::from_yaml(&out).unwrap();
        assert!(again.is_missing("a").unwrap());
        assert!(again.is_missing("b").unwrap());
    }

    #[test]
    fn test_interpolations_serialize_verbatim() {
        let cfg = Config::from_yaml("a: 1\nb: ${a}\n").unwrap();
        let out = cfg.to_yaml().unwrap();
        assert!(out.contains("${a}"), "expected verbatim expression in {out:?}");
    }

    #[test]
    fn test_numeric_looking_strings_stay_strings() {
        let mut cfg = Config::new();
        cfg.set("version", "1234").unwrap();
        let out = cfg.to_yaml().unwrap();
        let again = Config::from_yaml(&out).unwrap();
        assert_eq!(again.get("version").unwrap(), Value::Str("1234".into()));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        assert!(Config::from_yaml("a: 1\na: 2\n").is_err());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let cfg = Config::from_yaml("z: 1\na: 2\nm: 3\n").unwrap();
        let plain = cfg.to_container(&ToContainerOpts::default()).unwrap();
        let keys: Vec<String> = plain.as_map().unwrap().keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_invalid_expression_rejected_at_load() {
        assert!(Config::from_yaml("a: '${unclosed'\n").is_err());
    }

    #[test]
    fn test_non_string_keys() {
        let cfg = Config::from_yaml("1: one\ntrue: yes_value\n").unwrap();
        let out = cfg.to_yaml().unwrap();
        let again = Config::from_yaml(&out).unwrap();
        assert_eq!(cfg, again);
    }

    #[test]
    fn test_from_serialize() {
        #[derive(serde::Serialize)]
        struct Server {
            port: u16,
            host: String,
        }
        let cfg = Config::from_serialize(&Server {
            port: 80,
            host: "web".into(),
        })
        .unwrap();
        assert_eq!(cfg.get("port").unwrap(), Value::Int(80));
        assert_eq!(cfg.get("host").unwrap(), Value::Str("web".into()));
    }
}
