//! Decision of whether constructed instances get wrapped in an
//! intercepting [`ProxyBean`](crate::container::interceptor::ProxyBean).

use crate::metadata::{MetadataProvider, TypeMetadata, TypeRef};
use std::fmt;
use std::sync::Arc;

/// Extension predicate that can switch proxying on for a type
pub trait ProxyPredicate: Send + Sync {
    fn name(&self) -> &str;

    fn enables(&self, ty: &TypeRef, metadata: &TypeMetadata) -> bool;
}

/// Why a [`ProxyDecision`] came out the way it did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyReason {
    /// The type is final or sealed
    Final,
    /// Type-level override marker
    TypeOverride,
    /// Override marker on the named member
    MemberOverride(String),
    /// Service marker
    Service,
    /// The named extension predicate
    Extension(String),
    /// Inherited from the named supertype
    Inherited(String),
    /// Configured fallback
    Fallback,
    /// Delegating definitions leave proxying to their delegate
    Delegated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDecision {
    pub enabled: bool,
    pub reason: ProxyReason,
}

impl ProxyDecision {
    pub fn enabled(reason: ProxyReason) -> Self {
        Self {
            enabled: true,
            reason,
        }
    }

    pub fn disabled(reason: ProxyReason) -> Self {
        Self {
            enabled: false,
            reason,
        }
    }
}

/// Proxy enablement policy
#[derive(Clone)]
pub struct ProxyPolicy {
    predicates: Vec<Arc<dyn ProxyPredicate>>,
    fallback: bool,
}

impl ProxyPolicy {
    pub fn new(fallback: bool) -> Self {
        Self {
            predicates: Vec::new(),
            fallback,
        }
    }

    pub fn with_predicate(mut self, predicate: Arc<dyn ProxyPredicate>) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn fallback(&self) -> bool {
        self.fallback
    }

    /// Decide for `ty` given its declared markers.
    ///
    /// Finality vetoes everything. Otherwise the first rule that matches wins:
    /// type override, member overrides, service marker, extension predicates,
    /// then the same rules applied to supertypes, then the fallback flag.
    pub fn decide(&self, ty: &TypeRef, metadata: &TypeMetadata, provider: &dyn MetadataProvider) -> ProxyDecision {
        if metadata.is_final {
            return ProxyDecision::disabled(ProxyReason::Final);
        }

        let mut visited = vec![ty.name().to_string()];
        self.decide_by_markers(ty, metadata, provider, &mut visited)
            .unwrap_or_else(|| ProxyDecision {
                enabled: self.fallback,
                reason: ProxyReason::Fallback,
            })
    }

    fn decide_by_markers(
        &self,
        ty: &TypeRef,
        metadata: &TypeMetadata,
        provider: &dyn MetadataProvider,
        visited: &mut Vec<String>,
    ) -> Option<ProxyDecision> {
        if let Some(enabled) = metadata.proxy_override {
            return Some(ProxyDecision {
                enabled,
                reason: ProxyReason::TypeOverride,
            });
        }

        if let Some((member, _)) = metadata
            .member_proxy_overrides
            .iter()
            .find(|(_, enabled)| **enabled)
        {
            return Some(ProxyDecision::enabled(ProxyReason::MemberOverride(member.clone())));
        }

        if metadata.service {
            return Some(ProxyDecision::enabled(ProxyReason::Service));
        }

        if let Some(predicate) = self.predicates.iter().find(|predicate| predicate.enables(ty, metadata)) {
            return Some(ProxyDecision::enabled(ProxyReason::Extension(
                predicate.name().to_string(),
            )));
        }

        for supertype_name in &metadata.supertypes {
            if visited.contains(supertype_name) {
                continue;
            }
            visited.push(supertype_name.clone());

            let Some(supertype) = provider.lookup_type(supertype_name) else {
                continue;
            };
            let supertype_metadata = provider.metadata(&supertype);
            if let Some(inherited) = self.decide_by_markers(&supertype, &supertype_metadata, provider, visited) {
                return Some(ProxyDecision {
                    enabled: inherited.enabled,
                    reason: ProxyReason::Inherited(supertype_name.clone()),
                });
            }
        }

        None
    }
}

impl Default for ProxyPolicy {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for ProxyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyPolicy")
            .field("predicates", &self.predicates.iter().map(|p| p.name().to_string()).collect::<Vec<_>>())
            .field("fallback", &self.fallback)
            .finish()
    }
}
