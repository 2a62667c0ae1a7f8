use crate::container::binding::PropertyBindable;
use crate::container::interceptor::{Invocable, ProxyBean};
use crate::container::lifecycle::{
    ConfigurationAware, ContainerAware, DefinitionAware, DisposableBean, InitializingBean,
    LifecycleGate,
};
use crate::foundation::lifecycle::StateCell;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Upcasting support for every `Send + Sync + 'static` type
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// An object managed by the container.
///
/// Every capability is opt-in: a bean overrides the accessor for the
/// capabilities it implements and the lifecycle coordinator probes them
/// once per phase.
pub trait Bean: AsAny {
    /// Type name used in logs and error messages
    fn bean_type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn lifecycle_gate(&self) -> Option<&dyn LifecycleGate> {
        None
    }

    fn initializing(&self) -> Option<&dyn InitializingBean> {
        None
    }

    fn disposable(&self) -> Option<&dyn DisposableBean> {
        None
    }

    fn container_aware(&self) -> Option<&dyn ContainerAware> {
        None
    }

    fn configuration_aware(&self) -> Option<&dyn ConfigurationAware> {
        None
    }

    fn definition_aware(&self) -> Option<&dyn DefinitionAware> {
        None
    }

    fn property_bindable(&self) -> Option<&dyn PropertyBindable> {
        None
    }

    /// Dynamic method surface used by proxies
    fn invocable(&self) -> Option<&dyn Invocable> {
        None
    }

    /// Per-instance lifecycle state, tracked for proxied instances
    fn lifecycle_state(&self) -> Option<&StateCell> {
        None
    }
}

/// Shared handle to a constructed bean
#[derive(Clone)]
pub struct Instance(Arc<dyn Bean>);

impl Instance {
    /// Wrap a freshly built bean
    pub fn new<T: Bean>(bean: T) -> Self {
        Self(Arc::new(bean))
    }

    /// Wrap an already shared bean
    pub fn from_arc(bean: Arc<dyn Bean>) -> Self {
        Self(bean)
    }

    /// Borrow the bean as its capability interface
    pub fn bean(&self) -> &dyn Bean {
        self.0.as_ref()
    }

    /// Downcast to a concrete type, looking through proxies
    pub fn downcast<T: Bean>(&self) -> Option<Arc<T>> {
        if let Ok(concrete) = self.0.clone().into_any_arc().downcast::<T>() {
            return Some(concrete);
        }
        self.proxy().and_then(|proxy| proxy.target().downcast::<T>())
    }

    /// The proxy wrapping the target, if this instance is proxied
    pub fn proxy(&self) -> Option<&ProxyBean> {
        self.bean().as_any().downcast_ref::<ProxyBean>()
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy().is_some()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn type_name(&self) -> &'static str {
        self.bean().bean_type_name()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name())
            .field("proxy", &self.is_proxy())
            .finish()
    }
}

impl<T: Bean> From<Arc<T>> for Instance {
    fn from(bean: Arc<T>) -> Self {
        Self(bean)
    }
}
