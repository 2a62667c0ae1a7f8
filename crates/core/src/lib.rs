pub mod foundation;
pub mod errors;
pub mod config;
pub mod metadata;
pub mod container;

// Re-export key types for convenience
pub use foundation::{AsAny, Bean, Instance, InstanceState};
pub use errors::{BoxError, CoreError, CoreResult};
pub use config::{ConfigError, ConfigurationSource, ContainerConfig, LayeredConfigSource, MapConfigSource, PropertyOrigin};
pub use metadata::{Candidate, ConstructionContext, MetadataProvider, TypeCatalog, TypeKind, TypeMetadata, TypeRef};
pub use container::{
    Container, ContainerBuilder, Definition, DefinitionBuilder, DefinitionKind, Interceptor, Invocable,
    LifecycleEvent, LifecyclePhase, Lookup, ProxyBean, ProxyDecision, ProxyReason, ResolverExtension,
};
pub use serde_json::Value;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework information
pub const FRAMEWORK_NAME: &str = "sprout";

/// Get framework version
pub fn version() -> &'static str {
    VERSION
}

/// Get framework name
pub fn name() -> &'static str {
    FRAMEWORK_NAME
}
