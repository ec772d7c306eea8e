//! Dotted-key configuration repository.
//!
//! [`CosyConfig`] is the typed view used at startup; [`Config`] is the
//! mutable, string-keyed view handed to services at runtime:
//!
//! ```rust,ignore
//! let config = app.config();
//! let port: u16 = config.get_as("app.port")?.unwrap_or(3000);
//! config.set("mail.driver", "smtp");
//! ```

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::{ConfigError, ConfigResult};
use super::schema::CosyConfig;

/// Thread-safe configuration repository addressed with dotted keys.
#[derive(Debug, Default)]
pub struct Config {
    items: RwLock<Map<String, Value>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a repository from a typed configuration.
    pub fn from_settings(settings: &CosyConfig) -> ConfigResult<Self> {
        let config = Self::new();
        config.merge(to_value(settings)?);
        Ok(config)
    }

    /// The value at `key`, e.g. `"app.port"`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let items = self.items.read();
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = items.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// The value at `key`, or `default` when absent.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// Deserializes the value at `key`. `Ok(None)` when absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<Option<T>> {
        self.get(key)
            .map(|value| {
                serde_json::from_value(value).map_err(|e| ConfigError::TypeMismatch {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Sets `key`, creating intermediate objects. A non-object value on the
    /// way is replaced.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let mut items = self.items.write();
        let mut segments: Vec<&str> = key.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };

        let mut current = &mut *items;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(next) = entry else {
                return;
            };
            current = next;
        }
        current.insert(last.to_string(), value.into());
    }

    /// Serializes `value` and stores it at `key`.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> ConfigResult<()> {
        self.set(key, to_value(value)?);
        Ok(())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Deep-merges an object into the repository; `other` wins on conflicts.
    /// Non-object values are ignored.
    pub fn merge(&self, other: Value) {
        if let Value::Object(other) = other {
            deep_merge(&mut self.items.write(), other);
        }
    }

    /// A snapshot of every item.
    pub fn all(&self) -> Value {
        Value::Object(self.items.read().clone())
    }
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> ConfigResult<Value> {
    serde_json::to_value(value).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn deep_merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}
