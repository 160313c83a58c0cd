//! Hierarchical run configuration.
//!
//! One JSON object per module name; values are read by key with typed
//! defaults. Unknown keys are ignored, missing keys yield the documented
//! default, and malformed values are configuration errors that abort the run
//! at init.

use fd_core::{Error, Result};
use serde_json::Value;
use std::path::Path;

/// Whole-run configuration: a block of key/value pairs per module.
#[derive(Debug, Clone, Default)]
pub struct Config {
    root: serde_json::Map<String, Value>,
}

impl Config {
    /// Build from an already-parsed JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(Error::config("<root>", "<root>", "configuration must be a JSON object")),
        }
    }

    /// Parse a configuration string.
    pub fn from_str(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Read and parse a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_str(&std::fs::read_to_string(path)?)
    }

    /// View of one module's block. A missing block behaves as empty:
    /// every key falls back to its default.
    pub fn module<'a>(&'a self, name: &'a str) -> ModuleConfig<'a> {
        ModuleConfig { module: name, block: self.root.get(name) }
    }
}

/// Read-only view of one module's configuration block.
#[derive(Debug, Clone, Copy)]
pub struct ModuleConfig<'a> {
    module: &'a str,
    block: Option<&'a Value>,
}

impl<'a> ModuleConfig<'a> {
    fn value(&self, key: &str) -> Option<&'a Value> {
        self.block.and_then(|b| b.get(key))
    }

    fn type_err(&self, key: &str, expected: &str, got: &Value) -> Error {
        Error::config(self.module, key, format!("expected {expected}, got {got}"))
    }

    /// Integer option with default.
    pub fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        match self.value(key) {
            None => Ok(default),
            Some(v) => v.as_i64().ok_or_else(|| self.type_err(key, "an integer", v)),
        }
    }

    /// Floating-point option with default.
    pub fn get_double(&self, key: &str, default: f64) -> Result<f64> {
        match self.value(key) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.type_err(key, "a number", v)),
        }
    }

    /// Boolean option with default. Accepts 0/1 for card compatibility.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.value(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(v) => match v.as_i64() {
                Some(n) => Ok(n != 0),
                None => Err(self.type_err(key, "a boolean", v)),
            },
        }
    }

    /// String option with default.
    pub fn get_string(&self, key: &str, default: &str) -> Result<String> {
        match self.value(key) {
            None => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(v) => Err(self.type_err(key, "a string", v)),
        }
    }

    /// Structured parameter list (ragged nested arrays of primitives).
    /// A missing key yields an empty list.
    pub fn get_param(&self, key: &str) -> ParamList<'a> {
        ParamList { module: self.module, key: key.to_string(), value: self.value(key) }
    }

    /// Name of the module this block belongs to.
    pub fn module_name(&self) -> &'a str {
        self.module
    }
}

/// One node of a ragged parameter list: either a primitive or a nested array.
#[derive(Debug, Clone)]
pub struct ParamList<'a> {
    module: &'a str,
    key: String,
    value: Option<&'a Value>,
}

impl<'a> ParamList<'a> {
    fn err(&self, message: impl std::fmt::Display) -> Error {
        Error::config(self.module, &self.key, message.to_string())
    }

    /// Number of elements; 0 for a missing key or a primitive node.
    pub fn size(&self) -> usize {
        match self.value {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    /// Child node at `index`.
    pub fn at(&self, index: usize) -> Result<ParamList<'a>> {
        match self.value {
            Some(Value::Array(items)) => items
                .get(index)
                .map(|v| ParamList {
                    module: self.module,
                    key: format!("{}[{}]", self.key, index),
                    value: Some(v),
                })
                .ok_or_else(|| self.err(format!("index {index} out of bounds"))),
            _ => Err(self.err("not a parameter list")),
        }
    }

    /// This node as an integer.
    pub fn as_int(&self) -> Result<i64> {
        self.value
            .and_then(|v| v.as_i64())
            .ok_or_else(|| self.err("expected an integer"))
    }

    /// This node as a floating-point number.
    pub fn as_double(&self) -> Result<f64> {
        self.value
            .and_then(|v| v.as_f64())
            .ok_or_else(|| self.err("expected a number"))
    }

    /// This node as a string.
    pub fn as_string(&self) -> Result<String> {
        match self.value {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(self.err("expected a string")),
        }
    }

    /// Flatten this node into a vector of doubles (one level).
    pub fn doubles(&self) -> Result<Vec<f64>> {
        (0..self.size()).map(|i| self.at(i)?.as_double()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config::from_str(
            r#"{
                "calo": {
                    "TimingEMin": 4.0,
                    "Enabled": 1,
                    "Name": "central",
                    "EtaPhiBins": [[-1.0, 0.0, 1.0], [-3.14, 0.0, 3.14]]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_typed_getters_with_defaults() {
        let cfg = sample();
        let m = cfg.module("calo");
        assert_eq!(m.get_double("TimingEMin", 0.0).unwrap(), 4.0);
        assert_eq!(m.get_double("Missing", 7.5).unwrap(), 7.5);
        assert!(m.get_bool("Enabled", false).unwrap());
        assert_eq!(m.get_string("Name", "x").unwrap(), "central");
        // Unknown module block: everything defaults.
        assert_eq!(cfg.module("nope").get_int("K", 3).unwrap(), 3);
    }

    #[test]
    fn test_malformed_value_is_config_error() {
        let cfg = sample();
        let err = cfg.module("calo").get_double("Name", 0.0).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_ragged_param_list() {
        let cfg = sample();
        let param = cfg.module("calo").get_param("EtaPhiBins");
        assert_eq!(param.size(), 2);
        assert_eq!(param.at(0).unwrap().doubles().unwrap(), vec![-1.0, 0.0, 1.0]);
        assert_eq!(param.at(1).unwrap().size(), 3);
        assert_eq!(cfg.module("calo").get_param("Absent").size(), 0);
    }
}
