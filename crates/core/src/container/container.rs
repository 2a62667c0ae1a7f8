use crate::config::{ConfigurationSource, ContainerConfig};
use crate::container::builder::ContainerBuilder;
use crate::container::definition::{ConstructionStrategy, Definition};
use crate::container::events::{EventDispatcher, LifecycleListener};
use crate::container::lifecycle::{IocProcessor, LifecycleCoordinator};
use crate::container::registry::DefinitionRegistry;
use crate::container::resolver::Resolver;
use crate::container::singleton::SingletonCache;
use crate::errors::{BoxError, CoreError, CoreResult};
use crate::foundation::{Bean, Instance};
use crate::metadata::{MetadataProvider, TypeRef};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use uuid::Uuid;

type ShutdownHook = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// What a caller asks the container for
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Definition id, alias or type name
    Name(String),
    Type(TypeRef),
}

impl Lookup {
    pub fn name(&self) -> &str {
        match self {
            Lookup::Name(name) => name,
            Lookup::Type(ty) => ty.name(),
        }
    }
}

impl From<&str> for Lookup {
    fn from(name: &str) -> Self {
        Lookup::Name(name.to_string())
    }
}

impl From<String> for Lookup {
    fn from(name: String) -> Self {
        Lookup::Name(name)
    }
}

impl From<&String> for Lookup {
    fn from(name: &String) -> Self {
        Lookup::Name(name.clone())
    }
}

impl From<TypeRef> for Lookup {
    fn from(ty: TypeRef) -> Self {
        Lookup::Type(ty)
    }
}

impl From<&TypeRef> for Lookup {
    fn from(ty: &TypeRef) -> Self {
        Lookup::Type(ty.clone())
    }
}

/// Everything [`ContainerBuilder`] hands over when it builds a container
pub(crate) struct ContainerParts {
    pub config: ContainerConfig,
    pub metadata: Arc<dyn MetadataProvider>,
    pub configuration: Arc<dyn ConfigurationSource>,
    pub registry: Arc<DefinitionRegistry>,
    pub resolver: Resolver,
    pub events: Arc<EventDispatcher>,
    pub lifecycle: LifecycleCoordinator,
}

struct ContainerInner {
    id: Uuid,
    config: ContainerConfig,
    metadata: Arc<dyn MetadataProvider>,
    configuration: RwLock<Arc<dyn ConfigurationSource>>,
    registry: Arc<DefinitionRegistry>,
    resolver: Resolver,
    singletons: SingletonCache,
    events: Arc<EventDispatcher>,
    lifecycle: LifecycleCoordinator,
    shutdown_hooks: Mutex<Vec<ShutdownHook>>,
    static_dependence_done: Mutex<HashSet<String>>,
    initialized: AtomicBool,
}

/// Object container: resolves definitions, builds instances and drives their
/// lifecycle. Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// Non-owning handle, handed to container-aware beans
#[derive(Clone)]
pub struct WeakContainer(Weak<ContainerInner>);

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContainer")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub(crate) fn from_parts(parts: ContainerParts) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id: Uuid::new_v4(),
                config: parts.config,
                metadata: parts.metadata,
                configuration: RwLock::new(parts.configuration),
                registry: parts.registry,
                resolver: parts.resolver,
                singletons: SingletonCache::new(),
                events: parts.events,
                lifecycle: parts.lifecycle,
                shutdown_hooks: Mutex::new(Vec::new()),
                static_dependence_done: Mutex::new(HashSet::new()),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataProvider> {
        &self.inner.metadata
    }

    /// The configuration source currently used for binding
    pub fn configuration(&self) -> Arc<dyn ConfigurationSource> {
        match self.inner.configuration.read() {
            Ok(configuration) => configuration.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer(Arc::downgrade(&self.inner))
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Resolve a definition id, alias or type name
    pub fn resolve(&self, name: &str) -> Option<Arc<Definition>> {
        self.inner.resolver.resolve_name(name)
    }

    pub fn resolve_type(&self, ty: &TypeRef) -> Option<Arc<Definition>> {
        self.inner.resolver.resolve_type(ty)
    }

    fn resolve_lookup(&self, lookup: &Lookup) -> Option<Arc<Definition>> {
        match lookup {
            Lookup::Name(name) => self.resolve(name),
            Lookup::Type(ty) => self.resolve_type(ty),
        }
    }

    /// Register a definition; see [`DefinitionRegistry::register`]
    pub fn register(&self, definition: impl Into<Arc<Definition>>, fail_on_conflict: bool) -> CoreResult<Arc<Definition>> {
        self.inner.registry.register(definition.into(), fail_on_conflict)
    }

    /// Get an instance, creating it (and running its lifecycle) if needed.
    ///
    /// Singletons are created at most once; `args` only matter on first
    /// creation. Non-singletons are built fresh on every call.
    pub fn get_instance(&self, lookup: impl Into<Lookup>, args: &[Value]) -> CoreResult<Instance> {
        let lookup = lookup.into();
        let definition = self
            .resolve_lookup(&lookup)
            .ok_or_else(|| CoreError::not_found(lookup.name()))?;
        self.instantiate(&definition, args)
    }

    /// Typed convenience over [`Container::get_instance`] without arguments
    pub fn get<T: Bean>(&self, lookup: impl Into<Lookup>) -> CoreResult<Arc<T>> {
        let lookup = lookup.into();
        let instance = self.get_instance(lookup.clone(), &[])?;
        instance.downcast::<T>().ok_or_else(|| CoreError::TypeMismatch {
            id: lookup.name().to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Whether `lookup` resolves to a definition whose strategy can produce
    /// an instance
    pub fn is_instance(&self, lookup: impl Into<Lookup>) -> bool {
        self.resolve_lookup(&lookup.into())
            .map_or(false, |definition| definition.is_constructible())
    }

    pub fn is_singleton(&self, lookup: impl Into<Lookup>) -> bool {
        self.resolve_lookup(&lookup.into())
            .map_or(false, |definition| definition.is_singleton())
    }

    fn instantiate(&self, definition: &Arc<Definition>, args: &[Value]) -> CoreResult<Instance> {
        if definition.delegate_id().is_some() {
            let target = self.follow_delegates(definition)?;
            return self.instantiate(&target, args);
        }
        if matches!(definition.strategy(), ConstructionStrategy::Prebound(_)) && !args.is_empty() {
            return Err(CoreError::UnsupportedConstruction {
                id: definition.id().to_string(),
                arg_count: args.len(),
            });
        }

        if definition.is_singleton() {
            self.inner
                .singletons
                .get_or_create(definition, || self.materialize(definition, args))
        } else {
            self.materialize(definition, args)
        }
    }

    /// Walk a delegation chain to the first definition that builds its own
    /// instances
    fn follow_delegates(&self, definition: &Arc<Definition>) -> CoreResult<Arc<Definition>> {
        let mut path = vec![definition.id().to_string()];
        let mut current = definition.clone();
        while let Some(delegate) = current.delegate_id() {
            let next = self
                .resolve(delegate)
                .ok_or_else(|| CoreError::not_found(delegate))?;
            if path.iter().any(|id| id == next.id()) {
                path.push(next.id().to_string());
                return Err(CoreError::CircularDependency {
                    path: path.join(" -> "),
                    id: next.id().to_string(),
                });
            }
            path.push(next.id().to_string());
            current = next;
        }
        Ok(current)
    }

    fn materialize(&self, definition: &Arc<Definition>, args: &[Value]) -> CoreResult<Instance> {
        let lifecycle = &self.inner.lifecycle;
        let instance = lifecycle.construct(self, definition, args)?;
        lifecycle.inject_dependence(self, definition, &instance)?;
        lifecycle.init(definition, &instance)?;
        Ok(instance)
    }

    /// Load configuration-contributed definitions, run the static dependence
    /// pass and create eager singletons. Calling it again is a no-op.
    pub fn init(&self) -> CoreResult<()> {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("Container {} is already initialized", self.inner.id);
            return Ok(());
        }
        tracing::info!("Initializing container {}", self.inner.id);
        let result = self.run_init();
        if let Err(error) = &result {
            self.inner.initialized.store(false, Ordering::SeqCst);
            tracing::error!("Container {} failed to initialize: {}", self.inner.id, error);
        }
        result
    }

    fn run_init(&self) -> CoreResult<()> {
        let candidates = self.inner.metadata.configuration_candidates();
        for candidate in &candidates {
            if self.inner.resolver.resolve_type(candidate).is_none() {
                tracing::warn!("Configuration candidate '{}' could not be resolved", candidate);
            }
        }

        let mut types: Vec<TypeRef> = self
            .inner
            .registry
            .definitions()
            .iter()
            .map(|definition| definition.target_type().clone())
            .collect();
        types.extend(candidates);
        for ty in &types {
            self.run_static_dependence(ty)?;
        }

        let mut eager = 0;
        for definition in self.inner.registry.definitions() {
            let wants_eager = self.inner.config.eager_init || self.inner.metadata.metadata(definition.target_type()).eager;
            if !wants_eager
                || !definition.is_singleton()
                || !definition.is_constructible()
                || definition.delegate_id().is_some()
            {
                continue;
            }
            self.instantiate(&definition, &[])?;
            eager += 1;
        }

        tracing::info!(
            "Container {} initialized: {} definitions, {} eager singletons",
            self.inner.id,
            self.inner.registry.len(),
            eager
        );
        Ok(())
    }

    fn run_static_dependence(&self, ty: &TypeRef) -> CoreResult<()> {
        let Some(hook) = self.inner.metadata.static_dependence(ty) else {
            return Ok(());
        };
        if self.static_dependence_done()?.contains(ty.name()) {
            return Ok(());
        }
        tracing::debug!("Running static dependence for '{}'", ty);
        hook(self).map_err(|source| CoreError::StaticDependenceFailed {
            type_name: ty.name().to_string(),
            source,
        })?;
        // only a successful hook counts; a failed one runs again on the next init
        self.static_dependence_done()?.insert(ty.name().to_string());
        Ok(())
    }

    fn static_dependence_done(&self) -> CoreResult<MutexGuard<'_, HashSet<String>>> {
        self.inner
            .static_dependence_done
            .lock()
            .map_err(|_| CoreError::lock("static_dependence"))
    }

    /// Destroy live singletons newest first, then run shutdown hooks.
    ///
    /// Failures are logged and do not stop the remaining destroys; the first
    /// one is returned at the end.
    pub fn destroy(&self) -> CoreResult<()> {
        tracing::info!(
            "Destroying container {} ({} singletons)",
            self.inner.id,
            self.inner.singletons.len()
        );
        let mut first_error = None;

        for (definition, instance) in self.inner.singletons.drain_reverse() {
            if let Err(error) = self.inner.lifecycle.destroy(&definition, &instance) {
                first_error.get_or_insert(error);
            }
        }

        let hooks: Vec<ShutdownHook> = match self.inner.shutdown_hooks.lock() {
            Ok(mut hooks) => hooks.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for hook in hooks {
            if let Err(error) = hook() {
                tracing::error!("Shutdown hook failed: {}", error);
            }
        }

        self.inner.initialized.store(false, Ordering::SeqCst);
        tracing::info!("Container {} destroyed", self.inner.id);
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn on_lifecycle_event<L>(&self, listener: L)
    where
        L: LifecycleListener + 'static,
    {
        self.inner.events.subscribe(Arc::new(listener));
    }

    /// Register a processor for every instance whose type hierarchy contains
    /// `type_name`
    pub fn add_ioc_processor(&self, type_name: impl Into<String>, processor: Arc<dyn IocProcessor>) -> CoreResult<()> {
        self.inner.lifecycle.add_processor(type_name, processor)
    }

    /// Run `hook` once, after singletons are destroyed
    pub fn add_shutdown_hook<F>(&self, hook: F) -> CoreResult<()>
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.inner
            .shutdown_hooks
            .lock()
            .map_err(|_| CoreError::lock("shutdown_hooks"))?
            .push(Box::new(hook));
        Ok(())
    }

    /// Re-run dependence injection on every live singleton; returns how many
    /// were refreshed
    pub fn refresh_dependence(&self) -> CoreResult<usize> {
        let live = self.inner.singletons.live();
        for (definition, instance) in &live {
            self.inner.lifecycle.inject_dependence(self, definition, instance)?;
        }
        tracing::debug!("Refreshed dependence on {} singletons", live.len());
        Ok(live.len())
    }

    /// Swap the active configuration source and refresh live singletons
    pub fn reload_configuration(&self, source: Arc<dyn ConfigurationSource>) -> CoreResult<usize> {
        {
            let mut configuration = self
                .inner
                .configuration
                .write()
                .map_err(|_| CoreError::lock("configuration"))?;
            *configuration = source;
        }
        tracing::info!("Configuration reloaded for container {}", self.inner.id);
        self.refresh_dependence()
    }

    pub fn singleton_count(&self) -> usize {
        self.inner.singletons.len()
    }

    pub fn definition_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Registered definition ids, sorted
    pub fn definition_ids(&self) -> Vec<String> {
        self.inner.registry.ids()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("definitions", &self.inner.registry.len())
            .field("singletons", &self.inner.singletons.len())
            .field("initialized", &self.is_initialized())
            .field("resolver", &self.inner.resolver)
            .finish()
    }
}
