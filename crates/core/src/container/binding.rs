use crate::config::ConfigurationSource;
use crate::errors::{BoxError, CoreError, CoreResult};
use std::collections::BTreeMap;

/// Shape of a bindable member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar,
    /// String-keyed map gathered from every key under the member's prefix
    Map,
}

/// Writable member exposed for configuration binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMember {
    pub name: String,
    pub kind: PropertyKind,
}

impl PropertyMember {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Scalar,
        }
    }

    pub fn map(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Map,
        }
    }
}

/// Value handed to [`PropertyBindable::bind_property`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Scalar(String),
    Map(BTreeMap<String, String>),
}

/// Capability for beans whose members are filled from configuration
pub trait PropertyBindable: Send + Sync {
    /// Key prefix shared by every member, without trailing dot
    fn property_prefix(&self) -> &str;

    fn property_members(&self) -> Vec<PropertyMember>;

    fn bind_property(&self, member: &str, value: PropertyValue) -> Result<(), BoxError>;
}

/// `maxPoolSize` and `max_pool_size` both become `max-pool-size`
pub fn dash_case(name: &str) -> String {
    let mut dashed = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    for ch in name.chars() {
        if ch == '_' {
            dashed.push('-');
            previous_lower = false;
        } else if ch.is_uppercase() {
            if previous_lower {
                dashed.push('-');
            }
            dashed.extend(ch.to_lowercase());
            previous_lower = false;
        } else {
            dashed.push(ch);
            previous_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    dashed
}

fn qualified(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Lookup keys for a member: verbatim first, then dash-cased if different
fn candidate_keys(prefix: &str, member: &str) -> Vec<String> {
    let mut keys = vec![qualified(prefix, member)];
    let dashed = dash_case(member);
    if dashed != member {
        keys.push(qualified(prefix, &dashed));
    }
    keys
}

fn resolve_value(source: &dyn ConfigurationSource, prefix: &str, member: &PropertyMember) -> Option<PropertyValue> {
    let keys = candidate_keys(prefix, &member.name);
    match member.kind {
        PropertyKind::Scalar => keys
            .iter()
            .find_map(|key| source.get(key))
            .map(PropertyValue::Scalar),
        PropertyKind::Map => {
            let mut entries = BTreeMap::new();
            // dashed variants first so verbatim keys win on collision
            for key in keys.iter().rev() {
                let nested = format!("{}.", key);
                for (full_key, value) in source.with_prefix(&nested) {
                    if let Some(entry) = full_key.strip_prefix(nested.as_str()) {
                        entries.insert(entry.to_string(), value);
                    }
                }
            }
            if entries.is_empty() {
                None
            } else {
                Some(PropertyValue::Map(entries))
            }
        }
    }
}

/// Bind every member that has a value; returns how many were bound
pub fn bind_properties(
    definition_id: &str,
    bindable: &dyn PropertyBindable,
    source: &dyn ConfigurationSource,
) -> CoreResult<usize> {
    let prefix = bindable.property_prefix();
    let mut bound = 0;
    for member in bindable.property_members() {
        let Some(value) = resolve_value(source, prefix, &member) else {
            continue;
        };
        bindable
            .bind_property(&member.name, value)
            .map_err(|error| CoreError::PropertyBinding {
                id: definition_id.to_string(),
                member: member.name.clone(),
                message: error.to_string(),
            })?;
        bound += 1;
    }
    tracing::debug!("Bound {} configuration properties on '{}'", bound, definition_id);
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfigSource;
    use std::sync::Mutex;

    #[derive(Default)]
    struct PoolSettings {
        values: Mutex<BTreeMap<String, PropertyValue>>,
    }

    impl PropertyBindable for PoolSettings {
        fn property_prefix(&self) -> &str {
            "datasource"
        }

        fn property_members(&self) -> Vec<PropertyMember> {
            vec![
                PropertyMember::scalar("url"),
                PropertyMember::scalar("maxPoolSize"),
                PropertyMember::scalar("idle_timeout"),
                PropertyMember::map("connectionProperties"),
                PropertyMember::scalar("missing"),
            ]
        }

        fn bind_property(&self, member: &str, value: PropertyValue) -> Result<(), BoxError> {
            if member == "url" {
                if let PropertyValue::Scalar(url) = &value {
                    if !url.contains("://") {
                        return Err(format!("not a url: {}", url).into());
                    }
                }
            }
            self.values.lock().unwrap().insert(member.to_string(), value);
            Ok(())
        }
    }

    #[test]
    fn test_dash_case() {
        assert_eq!(dash_case("maxPoolSize"), "max-pool-size");
        assert_eq!(dash_case("idle_timeout"), "idle-timeout");
        assert_eq!(dash_case("url"), "url");
        assert_eq!(dash_case("http2Enabled"), "http2-enabled");
    }

    #[test]
    fn test_binds_verbatim_and_dashed_names() {
        let source = MapConfigSource::new()
            .with("datasource.url", "postgres://db/app")
            .with("datasource.max-pool-size", "16")
            .with("datasource.idle_timeout", "30s")
            .with("datasource.idle-timeout", "60s");
        let settings = PoolSettings::default();

        let bound = bind_properties("pool", &settings, &source).unwrap();

        assert_eq!(bound, 3);
        let values = settings.values.lock().unwrap();
        assert_eq!(values["maxPoolSize"], PropertyValue::Scalar("16".to_string()));
        assert_eq!(values["idle_timeout"], PropertyValue::Scalar("30s".to_string()));
        assert!(!values.contains_key("missing"));
    }

    #[test]
    fn test_map_members_gather_prefixed_keys() {
        let source = MapConfigSource::new()
            .with("datasource.connection-properties.ssl", "require")
            .with("datasource.connectionProperties.timeout", "5")
            .with("datasource.connection-properties.timeout", "10")
            .with("datasource.other", "ignored");
        let settings = PoolSettings::default();

        bind_properties("pool", &settings, &source).unwrap();

        let values = settings.values.lock().unwrap();
        let PropertyValue::Map(entries) = &values["connectionProperties"] else {
            panic!("expected a map value");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["ssl"], "require");
        assert_eq!(entries["timeout"], "5");
    }

    /// Returns every key from `with_prefix`, matching or not
    struct UnfilteredSource(MapConfigSource);

    impl ConfigurationSource for UnfilteredSource {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }

        fn keys(&self) -> Vec<String> {
            self.0.keys()
        }

        fn with_prefix(&self, _prefix: &str) -> BTreeMap<String, String> {
            self.keys()
                .into_iter()
                .filter_map(|key| self.get(&key).map(|value| (key, value)))
                .collect()
        }
    }

    #[test]
    fn test_map_members_skip_keys_outside_the_prefix() {
        let source = UnfilteredSource(
            MapConfigSource::new()
                .with("a", "short")
                .with("datasource.connectionProperties.ssl", "require"),
        );
        let settings = PoolSettings::default();

        bind_properties("pool", &settings, &source).unwrap();

        let values = settings.values.lock().unwrap();
        let PropertyValue::Map(entries) = &values["connectionProperties"] else {
            panic!("expected a map value");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries["ssl"], "require");
    }

    #[test]
    fn test_binding_errors_name_the_member() {
        let source = MapConfigSource::new().with("datasource.url", "localhost");
        let error = bind_properties("pool", &PoolSettings::default(), &source).unwrap_err();
        assert!(matches!(
            error,
            CoreError::PropertyBinding { ref id, ref member, .. } if id == "pool" && member == "url"
        ));
    }
}
