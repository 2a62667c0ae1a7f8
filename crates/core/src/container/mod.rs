pub mod binding;
pub mod builder;
#[allow(clippy::module_inception)]
pub mod container;
pub mod definition;
pub mod events;
pub mod interceptor;
pub mod lifecycle;
pub mod proxy;
pub mod registry;
pub mod resolver;
pub mod singleton;


pub use binding::{dash_case, PropertyBindable, PropertyKind, PropertyMember, PropertyValue};
pub use builder::ContainerBuilder;
pub use container::{Container, Lookup, WeakContainer};
pub use definition::{ConstructionStrategy, Definition, DefinitionBuilder, DefinitionKind};
pub use events::{
    DependenceRefreshListener, EventDispatcher, LifecycleEvent, LifecycleListener, LifecyclePhase,
    LifecycleStage,
};
pub use interceptor::{Interceptor, Invocable, Invocation, LifecycleInterceptor, Next, ProxyBean};
pub use lifecycle::{
    ConfigurationAware, ContainerAware, DefinitionAware, DisposableBean, InitializingBean,
    IocProcessor, LifecycleCoordinator, LifecycleGate,
};
pub use proxy::{ProxyDecision, ProxyPolicy, ProxyPredicate, ProxyReason};
pub use registry::DefinitionRegistry;
pub use resolver::{Resolver, ResolverExtension};
pub use singleton::SingletonCache;
