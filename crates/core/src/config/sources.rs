//! Configuration sources consulted during property binding.
//!
//! A [`ConfigurationSource`] is a flat `key -> value` view. Nested documents
//! (YAML, JSON) are flattened into dotted keys, with sequence elements
//! addressed as `key[0]`.

use crate::config::ConfigError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where a configuration value came from, kept for debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyOrigin {
    /// Value loaded from an environment variable
    EnvVar(String),
    /// Value loaded from a named document (file contents handed in by the caller)
    Document(String),
    /// Value provided programmatically
    Programmatic,
}

impl PropertyOrigin {
    /// Check if source is environment variable
    pub fn is_env_var(&self) -> bool {
        matches!(self, PropertyOrigin::EnvVar(_))
    }

    /// Get source description
    pub fn description(&self) -> String {
        match self {
            PropertyOrigin::EnvVar(var) => format!("Environment variable: {}", var),
            PropertyOrigin::Document(name) => format!("Configuration document: {}", name),
            PropertyOrigin::Programmatic => "Programmatically set".to_string(),
        }
    }
}

impl std::fmt::Display for PropertyOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Key/value configuration consumed by the container
pub trait ConfigurationSource: Send + Sync {
    /// Look up a single value
    fn get(&self, key: &str) -> Option<String>;

    /// All keys known to this source
    fn keys(&self) -> Vec<String>;

    /// Provenance of a key, if the source tracks it
    fn origin(&self, _key: &str) -> Option<PropertyOrigin> {
        None
    }

    /// Every `(key, value)` pair whose key starts with `prefix`
    fn with_prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        self.keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect()
    }
}

impl std::fmt::Debug for dyn ConfigurationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationSource")
            .field("keys", &self.keys().len())
            .finish()
    }
}

/// In-memory configuration source
#[derive(Debug, Clone, Default)]
pub struct MapConfigSource {
    values: BTreeMap<String, (String, PropertyOrigin)>,
}

impl MapConfigSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value programmatically
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value, PropertyOrigin::Programmatic);
        self
    }

    /// Insert a value with an explicit origin
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>, origin: PropertyOrigin) {
        self.values.insert(key.into(), (value.into(), origin));
    }

    /// Load environment variables starting with `prefix`.
    ///
    /// `APP_DB_MAX_POOL` with prefix `APP_` becomes `db.max.pool`; double
    /// underscores map to a literal dash (`APP_DB__URL` -> `db-url`).
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Same as [`MapConfigSource::from_env`] over an explicit variable list
    pub fn from_vars<I>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut source = Self::new();
        for (name, value) in vars {
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let key = rest
                .to_lowercase()
                .replace("__", "-")
                .replace('_', ".");
            source.insert(key, value, PropertyOrigin::EnvVar(name));
        }
        source
    }

    /// Flatten a YAML document into dotted keys
    pub fn from_yaml_str(name: &str, document: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_yaml::from_str(document)?;
        Self::from_value(name, &value)
    }

    /// Flatten a JSON document into dotted keys
    pub fn from_json_str(name: &str, document: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(document)?;
        Self::from_value(name, &value)
    }

    fn from_value(name: &str, value: &serde_json::Value) -> Result<Self, ConfigError> {
        if !value.is_object() && !value.is_null() {
            return Err(ConfigError::parsing(format!(
                "configuration document '{}' must be a mapping at the top level",
                name
            )));
        }
        let mut source = Self::new();
        flatten_into(&mut source, name, "", value);
        Ok(source)
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether the source holds no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten_into(source: &mut MapConfigSource, document: &str, path: &str, value: &serde_json::Value) {
    use serde_json::Value;

    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_into(source, document, &child_path, child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(source, document, &format!("{}[{}]", path, index), child);
            }
        }
        Value::String(text) => {
            source.insert(path, text.clone(), PropertyOrigin::Document(document.to_string()))
        }
        other => source.insert(path, other.to_string(), PropertyOrigin::Document(document.to_string())),
    }
}

impl ConfigurationSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|(value, _)| value.clone())
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn origin(&self, key: &str) -> Option<PropertyOrigin> {
        self.values.get(key).map(|(_, origin)| origin.clone())
    }
}

/// Ordered overlay of sources; the first source holding a key wins
#[derive(Default)]
pub struct LayeredConfigSource {
    layers: Vec<Arc<dyn ConfigurationSource>>,
}

impl LayeredConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer with lower precedence than every layer added before it
    pub fn with_layer(mut self, layer: Arc<dyn ConfigurationSource>) -> Self {
        self.layers.push(layer);
        self
    }
}

impl ConfigurationSource for LayeredConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.layers.iter().flat_map(|layer| layer.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn origin(&self, key: &str) -> Option<PropertyOrigin> {
        self.layers
            .iter()
            .find(|layer| layer.get(key).is_some())
            .and_then(|layer| layer.origin(key))
    }
}
