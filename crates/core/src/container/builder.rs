use crate::config::{ConfigurationSource, ContainerConfig, MapConfigSource};
use crate::container::container::{Container, ContainerParts};
use crate::container::definition::Definition;
use crate::container::events::{EventDispatcher, LifecycleListener};
use crate::container::interceptor::Interceptor;
use crate::container::lifecycle::{IocProcessor, LifecycleCoordinator};
use crate::container::proxy::{ProxyPolicy, ProxyPredicate};
use crate::container::registry::DefinitionRegistry;
use crate::container::resolver::{Resolver, ResolverExtension};
use crate::errors::CoreError;
use crate::metadata::{MetadataProvider, TypeCatalog};
use std::sync::Arc;

/// Builder for [`Container`]
pub struct ContainerBuilder {
    config: ContainerConfig,
    metadata: Option<Arc<dyn MetadataProvider>>,
    configuration: Option<Arc<dyn ConfigurationSource>>,
    extensions: Vec<Arc<dyn ResolverExtension>>,
    predicates: Vec<Arc<dyn ProxyPredicate>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    processors: Vec<(String, Arc<dyn IocProcessor>)>,
    listeners: Vec<Arc<dyn LifecycleListener>>,
    definitions: Vec<(Arc<Definition>, bool)>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            metadata: None,
            configuration: None,
            extensions: Vec::new(),
            predicates: Vec::new(),
            interceptors: Vec::new(),
            processors: Vec::new(),
            listeners: Vec::new(),
            definitions: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Type facts used for resolution; defaults to an empty [`TypeCatalog`]
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Source for property binding; defaults to an empty [`MapConfigSource`]
    pub fn with_configuration(mut self, configuration: Arc<dyn ConfigurationSource>) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn with_resolver_extension(mut self, extension: Arc<dyn ResolverExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn with_proxy_predicate(mut self, predicate: Arc<dyn ProxyPredicate>) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Interceptor applied to every proxied definition the resolver
    /// synthesizes, after those added before it
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_ioc_processor(mut self, type_name: impl Into<String>, processor: Arc<dyn IocProcessor>) -> Self {
        self.processors.push((type_name.into(), processor));
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Definition registered at build time, failing the build on conflict
    pub fn with_definition(mut self, definition: impl Into<Arc<Definition>>) -> Self {
        self.definitions.push((definition.into(), true));
        self
    }

    /// Like [`ContainerBuilder::with_definition`] but a conflict keeps the
    /// earlier registration
    pub fn with_definition_lenient(mut self, definition: impl Into<Arc<Definition>>) -> Self {
        self.definitions.push((definition.into(), false));
        self
    }

    pub fn build(self) -> Result<Container, CoreError> {
        let metadata = self
            .metadata
            .unwrap_or_else(|| Arc::new(TypeCatalog::new()) as Arc<dyn MetadataProvider>);
        let configuration = self
            .configuration
            .unwrap_or_else(|| Arc::new(MapConfigSource::new()) as Arc<dyn ConfigurationSource>);

        let policy = self
            .predicates
            .into_iter()
            .fold(ProxyPolicy::new(self.config.proxy_fallback), |policy, predicate| {
                policy.with_predicate(predicate)
            });

        let registry = Arc::new(DefinitionRegistry::new());
        for (definition, fail_on_conflict) in self.definitions {
            registry.register(definition, fail_on_conflict)?;
        }

        let resolver = Resolver::new(registry.clone(), metadata.clone(), policy)
            .with_extensions(self.extensions)
            .with_interceptors(self.interceptors)
            .with_default_singleton(self.config.default_singleton)
            .with_register_resolved(self.config.register_resolved);

        let events = Arc::new(EventDispatcher::new());
        for listener in self.listeners {
            events.subscribe(listener);
        }

        let lifecycle = LifecycleCoordinator::new(events.clone(), metadata.clone());
        for (type_name, processor) in self.processors {
            lifecycle.add_processor(type_name, processor)?;
        }

        tracing::debug!(
            "Building container with {} definitions and config {:?}",
            registry.len(),
            self.config
        );

        Ok(Container::from_parts(ContainerParts {
            config: self.config,
            metadata,
            configuration,
            registry,
            resolver,
            events,
            lifecycle,
        }))
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
