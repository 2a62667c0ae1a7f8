use crate::container::interceptor::{Interceptor, ProxyBean};
use crate::container::proxy::{ProxyDecision, ProxyReason};
use crate::container::Container;
use crate::errors::{CoreError, CoreResult};
use crate::foundation::Instance;
use crate::metadata::{ConstructionContext, TypeRef};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// How a definition produces its instance
#[derive(Clone)]
pub enum ConstructionStrategy {
    /// Invoke the target type's constructor with the resolved arguments
    Constructor,
    /// Hand out an instance supplied at registration
    Prebound(Instance),
    /// Defer to the definition registered under another id
    Delegate(String),
}

impl fmt::Debug for ConstructionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionStrategy::Constructor => write!(f, "Constructor"),
            ConstructionStrategy::Prebound(instance) => {
                f.debug_tuple("Prebound").field(&instance.type_name()).finish()
            }
            ConstructionStrategy::Delegate(target) => f.debug_tuple("Delegate").field(target).finish(),
        }
    }
}

/// Definition variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Reflective,
    Proxied,
    PreboundInstance,
    DelegatingAutoImpl,
}

/// Frozen construction and lifecycle contract for one logical id
pub struct Definition {
    id: String,
    aliases: BTreeSet<String>,
    target_type: TypeRef,
    singleton: bool,
    proxy: ProxyDecision,
    interceptors: Vec<Arc<dyn Interceptor>>,
    strategy: ConstructionStrategy,
}

impl Definition {
    /// Start a definition for `target_type` under `id`
    pub fn builder(id: impl Into<String>, target_type: TypeRef) -> DefinitionBuilder {
        DefinitionBuilder {
            id: id.into(),
            aliases: BTreeSet::new(),
            target_type,
            singleton: true,
            proxy: ProxyDecision::disabled(ProxyReason::Fallback),
            interceptors: Vec::new(),
            strategy: ConstructionStrategy::Constructor,
        }
    }

    /// Constructor-backed definition named after its type
    pub fn reflective(target_type: TypeRef) -> DefinitionBuilder {
        Self::builder(target_type.name().to_string(), target_type)
    }

    /// Definition returning an existing instance
    pub fn prebound(id: impl Into<String>, instance: Instance) -> DefinitionBuilder {
        let target_type = TypeRef::opaque(instance.type_name());
        Self::builder(id, target_type)
            .strategy(ConstructionStrategy::Prebound(instance))
            .singleton(true)
    }

    /// Definition for `target_type` that delegates to `delegate_id`
    pub fn delegating(id: impl Into<String>, target_type: TypeRef, delegate_id: impl Into<String>) -> DefinitionBuilder {
        Self::builder(id, target_type)
            .strategy(ConstructionStrategy::Delegate(delegate_id.into()))
            .proxy(ProxyDecision::disabled(ProxyReason::Delegated))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    pub fn target_type(&self) -> &TypeRef {
        &self.target_type
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn is_proxy_enabled(&self) -> bool {
        self.proxy.enabled && matches!(self.strategy, ConstructionStrategy::Constructor)
    }

    pub fn proxy_decision(&self) -> &ProxyDecision {
        &self.proxy
    }

    /// External interceptors, in the order they run
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub fn strategy(&self) -> &ConstructionStrategy {
        &self.strategy
    }

    pub fn kind(&self) -> DefinitionKind {
        match self.strategy {
            ConstructionStrategy::Prebound(_) => DefinitionKind::PreboundInstance,
            ConstructionStrategy::Delegate(_) => DefinitionKind::DelegatingAutoImpl,
            ConstructionStrategy::Constructor if self.proxy.enabled => DefinitionKind::Proxied,
            ConstructionStrategy::Constructor => DefinitionKind::Reflective,
        }
    }

    /// Whether the construction strategy is usable
    pub fn is_constructible(&self) -> bool {
        match self.strategy {
            ConstructionStrategy::Constructor => self.target_type.is_constructible(),
            ConstructionStrategy::Prebound(_) | ConstructionStrategy::Delegate(_) => true,
        }
    }

    pub fn delegate_id(&self) -> Option<&str> {
        match &self.strategy {
            ConstructionStrategy::Delegate(target) => Some(target),
            _ => None,
        }
    }

    /// Run the construction strategy.
    ///
    /// Failures are reported as `ConstructionFailed` and leave the definition
    /// reusable. Delegating definitions go back through the container so the
    /// delegate's own scope and lifecycle apply.
    pub fn construct(self: &Arc<Self>, container: &Container, args: &[Value]) -> CoreResult<Instance> {
        match &self.strategy {
            ConstructionStrategy::Prebound(instance) => {
                if !args.is_empty() {
                    return Err(CoreError::UnsupportedConstruction {
                        id: self.id.clone(),
                        arg_count: args.len(),
                    });
                }
                Ok(instance.clone())
            }
            ConstructionStrategy::Delegate(target) => container.get_instance(target.as_str(), args),
            ConstructionStrategy::Constructor => {
                let constructor = self.target_type.constructor().ok_or_else(|| {
                    CoreError::construction_failed(
                        self.id.clone(),
                        format!("type '{}' has no constructor", self.target_type),
                    )
                })?;
                if self.target_type.is_abstract() {
                    return Err(CoreError::construction_failed(
                        self.id.clone(),
                        format!("type '{}' is abstract", self.target_type),
                    ));
                }

                let context = ConstructionContext::new(container, self, args);
                let target = constructor(&context)
                    .map_err(|source| CoreError::construction_failed(self.id.clone(), source))?;

                if self.is_proxy_enabled() {
                    Ok(Instance::new(ProxyBean::new(self.clone(), target)))
                } else {
                    Ok(target)
                }
            }
        }
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("id", &self.id)
            .field("aliases", &self.aliases)
            .field("target_type", &self.target_type.name())
            .field("singleton", &self.singleton)
            .field("proxy", &self.proxy)
            .field("interceptors", &self.interceptors.len())
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Mutable, not yet published definition
pub struct DefinitionBuilder {
    id: String,
    aliases: BTreeSet<String>,
    target_type: TypeRef,
    singleton: bool,
    proxy: ProxyDecision,
    interceptors: Vec<Arc<dyn Interceptor>>,
    strategy: ConstructionStrategy,
}

impl DefinitionBuilder {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    pub fn proxy(mut self, decision: ProxyDecision) -> Self {
        self.proxy = decision;
        self
    }

    /// Append an interceptor after those already present
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn interceptors<I>(mut self, interceptors: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Interceptor>>,
    {
        self.interceptors.extend(interceptors);
        self
    }

    pub fn strategy(mut self, strategy: ConstructionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Freeze into a publishable, immutable definition
    pub fn freeze(self) -> Arc<Definition> {
        let mut aliases = self.aliases;
        aliases.remove(&self.id);
        Arc::new(Definition {
            id: self.id,
            aliases,
            target_type: self.target_type,
            singleton: self.singleton,
            proxy: self.proxy,
            interceptors: self.interceptors,
            strategy: self.strategy,
        })
    }
}

impl From<DefinitionBuilder> for Arc<Definition> {
    fn from(builder: DefinitionBuilder) -> Self {
        builder.freeze()
    }
}
