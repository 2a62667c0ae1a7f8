//! Explicit decorator used in place of dynamic proxies.
//!
//! A proxied instance is a [`ProxyBean`] wrapping the real target. Calls go
//! through [`Invocable::invoke`], run the interceptor chain in order and end
//! at the target's own `Invocable` implementation.

use crate::container::binding::PropertyBindable;
use crate::container::definition::Definition;
use crate::container::lifecycle::{
    ConfigurationAware, ContainerAware, DefinitionAware, DisposableBean, InitializingBean,
    LifecycleGate,
};
use crate::errors::{CoreError, CoreResult};
use crate::foundation::{Bean, Instance, InstanceState, StateCell};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Dynamic method surface of a bean
pub trait Invocable: Send + Sync {
    fn invoke(&self, method: &str, args: &[Value]) -> CoreResult<Value>;
}

/// One method call travelling through the chain
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub definition_id: &'a str,
    pub method: &'a str,
    pub args: &'a [Value],
}

/// Around-advice applied to proxied instances
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle the call; `next.proceed(..)` continues down the chain
    fn intercept(&self, invocation: &Invocation<'_>, next: Next<'_>) -> CoreResult<Value>;
}

/// Remainder of the chain after the current interceptor
pub struct Next<'a> {
    rest: &'a [Arc<dyn Interceptor>],
    target: &'a Instance,
}

impl<'a> Next<'a> {
    pub fn proceed(self, invocation: &Invocation<'_>) -> CoreResult<Value> {
        match self.rest.split_first() {
            Some((head, tail)) => head.intercept(
                invocation,
                Next {
                    rest: tail,
                    target: self.target,
                },
            ),
            None => {
                let invocable = self.target.bean().invocable().ok_or_else(|| CoreError::MethodNotFound {
                    id: invocation.definition_id.to_string(),
                    method: invocation.method.to_string(),
                })?;
                invocable.invoke(invocation.method, invocation.args)
            }
        }
    }
}

/// The definition's own hook; always first in a proxy's chain
pub struct LifecycleInterceptor {
    state: Arc<StateCell>,
}

impl LifecycleInterceptor {
    pub fn new(state: Arc<StateCell>) -> Self {
        Self { state }
    }
}

impl Interceptor for LifecycleInterceptor {
    fn name(&self) -> &str {
        "lifecycle"
    }

    fn intercept(&self, invocation: &Invocation<'_>, next: Next<'_>) -> CoreResult<Value> {
        if self.state.is_destroyed() {
            return Err(CoreError::InstanceDestroyed {
                id: invocation.definition_id.to_string(),
            });
        }
        tracing::trace!(
            "Invoking '{}' on '{}' in state {:?}",
            invocation.method,
            invocation.definition_id,
            self.state.get()
        );
        next.proceed(invocation)
    }
}

/// Intercepting decorator around a constructed target
pub struct ProxyBean {
    definition: Arc<Definition>,
    target: Instance,
    chain: Vec<Arc<dyn Interceptor>>,
    state: Arc<StateCell>,
}

impl ProxyBean {
    pub fn new(definition: Arc<Definition>, target: Instance) -> Self {
        let state = Arc::new(StateCell::new(InstanceState::Constructed));
        let mut chain: Vec<Arc<dyn Interceptor>> = Vec::with_capacity(definition.interceptors().len() + 1);
        chain.push(Arc::new(LifecycleInterceptor::new(state.clone())));
        chain.extend(definition.interceptors().iter().cloned());

        Self {
            definition,
            target,
            chain,
            state,
        }
    }

    pub fn target(&self) -> &Instance {
        &self.target
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    /// Interceptor names in execution order
    pub fn chain_names(&self) -> Vec<String> {
        self.chain.iter().map(|interceptor| interceptor.name().to_string()).collect()
    }

    pub fn state(&self) -> InstanceState {
        self.state.get()
    }
}

impl Invocable for ProxyBean {
    fn invoke(&self, method: &str, args: &[Value]) -> CoreResult<Value> {
        let invocation = Invocation {
            definition_id: self.definition.id(),
            method,
            args,
        };
        Next {
            rest: &self.chain,
            target: &self.target,
        }
        .proceed(&invocation)
    }
}

impl Bean for ProxyBean {
    fn bean_type_name(&self) -> &'static str {
        self.target.type_name()
    }

    fn lifecycle_gate(&self) -> Option<&dyn LifecycleGate> {
        self.target.bean().lifecycle_gate()
    }

    fn initializing(&self) -> Option<&dyn InitializingBean> {
        self.target.bean().initializing()
    }

    fn disposable(&self) -> Option<&dyn DisposableBean> {
        self.target.bean().disposable()
    }

    fn container_aware(&self) -> Option<&dyn ContainerAware> {
        self.target.bean().container_aware()
    }

    fn configuration_aware(&self) -> Option<&dyn ConfigurationAware> {
        self.target.bean().configuration_aware()
    }

    fn definition_aware(&self) -> Option<&dyn DefinitionAware> {
        self.target.bean().definition_aware()
    }

    fn property_bindable(&self) -> Option<&dyn PropertyBindable> {
        self.target.bean().property_bindable()
    }

    fn invocable(&self) -> Option<&dyn Invocable> {
        Some(self)
    }

    fn lifecycle_state(&self) -> Option<&StateCell> {
        Some(&self.state)
    }
}

impl fmt::Debug for ProxyBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyBean")
            .field("definition", &self.definition.id())
            .field("target", &self.target)
            .field("chain", &self.chain_names())
            .field("state", &self.state.get())
            .finish()
    }
}
