use crate::config::ConfigurationSource;
use crate::container::binding::bind_properties;
use crate::container::container::{Container, WeakContainer};
use crate::container::definition::Definition;
use crate::container::events::{EventDispatcher, LifecyclePhase, LifecycleStage};
use crate::errors::{BoxError, CoreError, CoreResult};
use crate::foundation::{Instance, InstanceState};
use crate::metadata::MetadataProvider;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Opt-out hooks checked once per phase
pub trait LifecycleGate: Send + Sync {
    fn allow_dependence(&self) -> bool {
        true
    }

    fn allow_init(&self) -> bool {
        true
    }

    fn allow_destroy(&self) -> bool {
        true
    }
}

/// Generic init capability, run after the ioc processors
pub trait InitializingBean: Send + Sync {
    fn init(&self) -> Result<(), BoxError>;
}

/// Generic destroy capability, run before the ioc processors
pub trait DisposableBean: Send + Sync {
    fn destroy(&self) -> Result<(), BoxError>;
}

/// Receives a handle to the owning container during dependence injection
pub trait ContainerAware: Send + Sync {
    fn set_container(&self, container: WeakContainer);
}

/// Receives the active configuration source during dependence injection
pub trait ConfigurationAware: Send + Sync {
    fn set_configuration(&self, configuration: Arc<dyn ConfigurationSource>);
}

/// Receives the definition it was built from during dependence injection
pub trait DefinitionAware: Send + Sync {
    fn set_definition(&self, definition: Arc<Definition>);
}

/// Type-specific lifecycle processor.
///
/// Processors are registered against a type name and apply to every instance
/// whose target type has that name anywhere in its hierarchy.
pub trait IocProcessor: Send + Sync {
    fn dependence(&self, _instance: &Instance, _definition: &Definition) -> Result<(), BoxError> {
        Ok(())
    }

    fn init(&self, _instance: &Instance, _definition: &Definition) -> Result<(), BoxError> {
        Ok(())
    }

    fn destroy(&self, _instance: &Instance, _definition: &Definition) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Drives construct, dependence, init and destroy for single instances and
/// publishes the before/after event pair around each of them
pub struct LifecycleCoordinator {
    processors: RwLock<HashMap<String, Vec<Arc<dyn IocProcessor>>>>,
    events: Arc<EventDispatcher>,
    metadata: Arc<dyn MetadataProvider>,
}

impl LifecycleCoordinator {
    pub fn new(events: Arc<EventDispatcher>, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self {
            processors: RwLock::new(HashMap::new()),
            events,
            metadata,
        }
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    pub fn add_processor(&self, type_name: impl Into<String>, processor: Arc<dyn IocProcessor>) -> CoreResult<()> {
        let mut processors = self
            .processors
            .write()
            .map_err(|_| CoreError::lock("ioc_processors"))?;
        processors.entry(type_name.into()).or_default().push(processor);
        Ok(())
    }

    /// Processors applying to `definition`, most specific type first
    fn processors_for(&self, definition: &Definition) -> CoreResult<Vec<Arc<dyn IocProcessor>>> {
        let processors = self
            .processors
            .read()
            .map_err(|_| CoreError::lock("ioc_processors"))?;
        if processors.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .metadata
            .type_hierarchy(definition.target_type())
            .iter()
            .filter_map(|name| processors.get(name))
            .flatten()
            .cloned()
            .collect())
    }

    pub fn construct(
        &self,
        container: &Container,
        definition: &Arc<Definition>,
        args: &[Value],
    ) -> CoreResult<Instance> {
        self.events
            .publish(LifecyclePhase::BeforeConstruct, definition, None);
        let instance = definition.construct(container, args)?;
        advance(&instance, InstanceState::Constructed);
        self.events
            .publish(LifecyclePhase::AfterConstruct, definition, Some(&instance));
        Ok(instance)
    }

    /// Processors, then awareness callbacks, then property binding
    pub fn inject_dependence(
        &self,
        container: &Container,
        definition: &Arc<Definition>,
        instance: &Instance,
    ) -> CoreResult<()> {
        let allowed = instance
            .bean()
            .lifecycle_gate()
            .map_or(true, |gate| gate.allow_dependence());

        self.run_stage(LifecycleStage::Dependence, definition, instance, allowed, || {
            for processor in self.processors_for(definition)? {
                processor.dependence(instance, definition).map_err(|error| {
                    CoreError::lifecycle_failed(definition.id(), LifecycleStage::Dependence, error)
                })?;
            }

            let bean = instance.bean();
            if let Some(aware) = bean.container_aware() {
                aware.set_container(container.downgrade());
            }
            let configuration = container.configuration();
            if let Some(aware) = bean.configuration_aware() {
                aware.set_configuration(configuration.clone());
            }
            if let Some(aware) = bean.definition_aware() {
                aware.set_definition(definition.clone());
            }
            if let Some(bindable) = bean.property_bindable() {
                bind_properties(definition.id(), bindable, configuration.as_ref())?;
            }
            Ok(())
        })?;

        advance(instance, InstanceState::Depended);
        Ok(())
    }

    pub fn init(&self, definition: &Arc<Definition>, instance: &Instance) -> CoreResult<()> {
        let allowed = instance
            .bean()
            .lifecycle_gate()
            .map_or(true, |gate| gate.allow_init());

        self.run_stage(LifecycleStage::Init, definition, instance, allowed, || {
            for processor in self.processors_for(definition)? {
                processor
                    .init(instance, definition)
                    .map_err(|error| CoreError::lifecycle_failed(definition.id(), LifecycleStage::Init, error))?;
            }
            if let Some(initializing) = instance.bean().initializing() {
                initializing
                    .init()
                    .map_err(|error| CoreError::lifecycle_failed(definition.id(), LifecycleStage::Init, error))?;
            }
            Ok(())
        })?;

        advance(instance, InstanceState::Initialized);
        Ok(())
    }

    /// Mirror of init: generic destroy first, then processors least specific
    /// first. Every step runs; the first failure is returned.
    pub fn destroy(&self, definition: &Arc<Definition>, instance: &Instance) -> CoreResult<()> {
        let allowed = instance
            .bean()
            .lifecycle_gate()
            .map_or(true, |gate| gate.allow_destroy());

        let outcome = self.run_stage(LifecycleStage::Destroy, definition, instance, allowed, || {
            let mut first_error = None;
            let mut record = |error: CoreError| {
                tracing::error!("Failed to destroy '{}': {}", definition.id(), error);
                first_error.get_or_insert(error);
            };

            if let Some(disposable) = instance.bean().disposable() {
                if let Err(error) = disposable.destroy() {
                    record(CoreError::lifecycle_failed(definition.id(), LifecycleStage::Destroy, error));
                }
            }
            match self.processors_for(definition) {
                Ok(processors) => {
                    for processor in processors.iter().rev() {
                        if let Err(error) = processor.destroy(instance, definition) {
                            record(CoreError::lifecycle_failed(definition.id(), LifecycleStage::Destroy, error));
                        }
                    }
                }
                Err(error) => record(error),
            }

            match first_error {
                Some(error) => Err(error),
                None => Ok(()),
            }
        });

        advance(instance, InstanceState::Destroyed);
        outcome
    }

    fn run_stage<F>(
        &self,
        stage: LifecycleStage,
        definition: &Arc<Definition>,
        instance: &Instance,
        allowed: bool,
        body: F,
    ) -> CoreResult<()>
    where
        F: FnOnce() -> CoreResult<()>,
    {
        self.events
            .publish(LifecyclePhase::before(stage), definition, Some(instance));
        if allowed {
            body()?;
        } else {
            tracing::debug!("Skipping {} for '{}': opted out", stage, definition.id());
        }
        self.events
            .publish(LifecyclePhase::after(stage), definition, Some(instance));
        Ok(())
    }
}

fn advance(instance: &Instance, state: InstanceState) {
    if let Some(cell) = instance.bean().lifecycle_state() {
        cell.set(state);
    }
}

impl fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let processor_types = self
            .processors
            .read()
            .map(|processors| processors.len())
            .unwrap_or(0);
        f.debug_struct("LifecycleCoordinator")
            .field("processor_types", &processor_types)
            .field("events", &self.events)
            .finish()
    }
}
