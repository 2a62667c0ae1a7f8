use crate::container::container::WeakContainer;
use crate::container::definition::Definition;
use crate::foundation::Instance;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Lifecycle stage bracketed by a before/after event pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
    Construct,
    Dependence,
    Init,
    Destroy,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::Construct => "construct",
            LifecycleStage::Dependence => "dependence",
            LifecycleStage::Init => "init",
            LifecycleStage::Destroy => "destroy",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase carried by a [`LifecycleEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    BeforeConstruct,
    AfterConstruct,
    BeforeDependence,
    AfterDependence,
    BeforeInit,
    AfterInit,
    BeforeDestroy,
    AfterDestroy,
}

impl LifecyclePhase {
    pub fn before(stage: LifecycleStage) -> Self {
        match stage {
            LifecycleStage::Construct => LifecyclePhase::BeforeConstruct,
            LifecycleStage::Dependence => LifecyclePhase::BeforeDependence,
            LifecycleStage::Init => LifecyclePhase::BeforeInit,
            LifecycleStage::Destroy => LifecyclePhase::BeforeDestroy,
        }
    }

    pub fn after(stage: LifecycleStage) -> Self {
        match stage {
            LifecycleStage::Construct => LifecyclePhase::AfterConstruct,
            LifecycleStage::Dependence => LifecyclePhase::AfterDependence,
            LifecycleStage::Init => LifecyclePhase::AfterInit,
            LifecycleStage::Destroy => LifecyclePhase::AfterDestroy,
        }
    }

    pub fn stage(&self) -> LifecycleStage {
        match self {
            LifecyclePhase::BeforeConstruct | LifecyclePhase::AfterConstruct => {
                LifecycleStage::Construct
            }
            LifecyclePhase::BeforeDependence | LifecyclePhase::AfterDependence => {
                LifecycleStage::Dependence
            }
            LifecyclePhase::BeforeInit | LifecyclePhase::AfterInit => LifecycleStage::Init,
            LifecyclePhase::BeforeDestroy | LifecyclePhase::AfterDestroy => {
                LifecycleStage::Destroy
            }
        }
    }

    pub fn is_before(&self) -> bool {
        *self == LifecyclePhase::before(self.stage())
    }
}

/// Immutable record of one lifecycle transition
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub phase: LifecyclePhase,
    pub definition: Arc<Definition>,
    /// Absent before construction
    pub instance: Option<Instance>,
}

impl LifecycleEvent {
    pub fn new(phase: LifecyclePhase, definition: Arc<Definition>, instance: Option<Instance>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            phase,
            definition,
            instance,
        }
    }
}

/// Subscriber to lifecycle events
pub trait LifecycleListener: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

impl<F> LifecycleListener for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, event: &LifecycleEvent) {
        self(event)
    }
}

/// Fan-out of lifecycle events to subscribed listeners
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn LifecycleListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    /// Deliver an event; listeners run outside the lock so they may call back
    /// into the container
    pub fn publish(&self, phase: LifecyclePhase, definition: &Arc<Definition>, instance: Option<&Instance>) {
        let listeners: Vec<Arc<dyn LifecycleListener>> = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if listeners.is_empty() {
            return;
        }
        let event = LifecycleEvent::new(phase, definition.clone(), instance.cloned());
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|listeners| listeners.len()).unwrap_or(0)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

/// Re-runs dependence injection on every live singleton once the trigger
/// definition finishes init
pub struct DependenceRefreshListener {
    container: WeakContainer,
    trigger_id: String,
}

impl DependenceRefreshListener {
    pub fn new(container: WeakContainer, trigger_id: impl Into<String>) -> Self {
        Self {
            container,
            trigger_id: trigger_id.into(),
        }
    }
}

impl LifecycleListener for DependenceRefreshListener {
    fn on_event(&self, event: &LifecycleEvent) {
        if event.phase != LifecyclePhase::AfterInit || event.definition.id() != self.trigger_id {
            return;
        }
        let Some(container) = self.container.upgrade() else {
            return;
        };
        if let Err(error) = container.refresh_dependence() {
            tracing::error!(
                "Dependence refresh triggered by '{}' failed: {}",
                self.trigger_id,
                error
            );
        }
    }
}
