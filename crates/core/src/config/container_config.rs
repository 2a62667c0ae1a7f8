use crate::config::{parse_bool, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Prefix for environment variables read by [`ContainerConfig::from_env`]
pub const ENV_PREFIX: &str = "SPROUT_";

/// Container-wide behaviour switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Proxy decision when no marker, predicate or supertype decides.
    ///
    /// Historically both answers have shipped, so the value is never implied.
    pub proxy_fallback: bool,
    /// Scope for synthesized definitions whose type declares no override
    pub default_singleton: bool,
    /// Instantiate every singleton definition during `Container::init`
    pub eager_init: bool,
    /// Publish definitions synthesized by the resolver into the registry
    pub register_resolved: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            proxy_fallback: false,
            default_singleton: true,
            eager_init: false,
            register_resolved: true,
        }
    }
}

impl ContainerConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the proxy fallback flag
    pub fn with_proxy_fallback(mut self, enabled: bool) -> Self {
        self.proxy_fallback = enabled;
        self
    }

    /// Set the default scope of synthesized definitions
    pub fn with_default_singleton(mut self, singleton: bool) -> Self {
        self.default_singleton = singleton;
        self
    }

    /// Toggle eager singleton instantiation on init
    pub fn with_eager_init(mut self, eager: bool) -> Self {
        self.eager_init = eager;
        self
    }

    /// Toggle registration of resolver-synthesized definitions
    pub fn with_register_resolved(mut self, register: bool) -> Self {
        self.register_resolved = register;
        self
    }

    /// Parse a YAML document; missing fields keep their defaults
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(document)?)
    }

    /// Read and parse a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let document = fs::read_to_string(path)?;
        Self::from_yaml_str(&document)
    }

    /// Load configuration from `SPROUT_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Same as [`ContainerConfig::from_env`] over an explicit variable list
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(name, _)| name.starts_with(ENV_PREFIX))
            .collect();
        let mut config = Self::default();

        let flag = |field: &str| -> Result<Option<bool>, ConfigError> {
            let name = format!("{}{}", ENV_PREFIX, field.to_uppercase());
            vars.get(&name).map(|value| parse_bool(&name, value)).transpose()
        };

        if let Some(value) = flag("proxy_fallback")? {
            config.proxy_fallback = value;
        }
        if let Some(value) = flag("default_singleton")? {
            config.default_singleton = value;
        }
        if let Some(value) = flag("eager_init")? {
            config.eager_init = value;
        }
        if let Some(value) = flag("register_resolved")? {
            config.register_resolved = value;
        }

        Ok(config)
    }
}
