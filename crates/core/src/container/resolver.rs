//! Name and type resolution to definitions.
//!
//! Resolution runs a fixed chain and the first constructible candidate wins:
//! registry hit, auto-implementation markers, configuration candidates,
//! resolver extensions, a lenient retry for abstract requests and finally a
//! reflective definition for plain concrete types. Every definition the chain
//! synthesizes is registered so later lookups hit the registry.

use crate::container::definition::{Definition, DefinitionBuilder};
use crate::container::interceptor::Interceptor;
use crate::container::proxy::ProxyPolicy;
use crate::container::registry::DefinitionRegistry;
use crate::metadata::{Candidate, MetadataProvider, TypeMetadata, TypeRef};
use std::fmt;
use std::sync::Arc;

/// Last-chance resolution hook consulted after the built-in markers
pub trait ResolverExtension: Send + Sync {
    fn name(&self) -> &str;

    fn resolve(&self, ty: &TypeRef, metadata: &dyn MetadataProvider) -> Option<DefinitionBuilder>;
}

/// How strictly a candidate must be constructible to be accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Acceptance {
    /// Registered and constructible, or a concrete type with a constructor
    Direct,
    /// Anything the full chain can resolve to a constructible definition
    Transitive,
}

pub struct Resolver {
    registry: Arc<DefinitionRegistry>,
    metadata: Arc<dyn MetadataProvider>,
    policy: ProxyPolicy,
    extensions: Vec<Arc<dyn ResolverExtension>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    default_singleton: bool,
    register_resolved: bool,
}

impl Resolver {
    pub fn new(registry: Arc<DefinitionRegistry>, metadata: Arc<dyn MetadataProvider>, policy: ProxyPolicy) -> Self {
        Self {
            registry,
            metadata,
            policy,
            extensions: Vec::new(),
            interceptors: Vec::new(),
            default_singleton: true,
            register_resolved: true,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<Arc<dyn ResolverExtension>>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Interceptors attached to every definition synthesized for a type
    pub fn with_interceptors(mut self, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn with_default_singleton(mut self, singleton: bool) -> Self {
        self.default_singleton = singleton;
        self
    }

    pub fn with_register_resolved(mut self, register: bool) -> Self {
        self.register_resolved = register;
        self
    }

    pub fn registry(&self) -> &Arc<DefinitionRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &ProxyPolicy {
        &self.policy
    }

    /// Registry first, then the name as a type known to the metadata
    /// provider, then as an alias declared in type metadata
    pub fn resolve_name(&self, name: &str) -> Option<Arc<Definition>> {
        if let Some(definition) = self.registry.lookup(name) {
            return Some(definition);
        }
        let ty = self
            .metadata
            .lookup_type(name)
            .or_else(|| self.metadata.lookup_alias(name))?;
        self.resolve_type(&ty)
    }

    pub fn resolve_type(&self, ty: &TypeRef) -> Option<Arc<Definition>> {
        let mut visiting = Vec::new();
        self.resolve_guarded(ty, &mut visiting)
    }

    fn resolve_guarded(&self, ty: &TypeRef, visiting: &mut Vec<String>) -> Option<Arc<Definition>> {
        if let Some(definition) = self.registry.lookup(ty.name()) {
            return Some(definition);
        }
        if visiting.iter().any(|name| name == ty.name()) {
            tracing::debug!("Resolution of '{}' is already in progress, skipping", ty.name());
            return None;
        }

        visiting.push(ty.name().to_string());
        let builder = self.synthesize(ty, visiting);
        visiting.pop();

        builder.map(|builder| self.publish(builder))
    }

    fn synthesize(&self, ty: &TypeRef, visiting: &mut Vec<String>) -> Option<DefinitionBuilder> {
        let metadata = self.metadata.metadata(ty);

        if let Some(builder) = self.from_auto_implementations(ty, &metadata, Acceptance::Direct, visiting) {
            return Some(builder);
        }
        if let Some(builder) = self.from_configuration_candidates(ty, Acceptance::Direct, visiting) {
            return Some(builder);
        }
        for extension in &self.extensions {
            if let Some(builder) = extension.resolve(ty, self.metadata.as_ref()) {
                tracing::debug!("Resolver extension '{}' resolved '{}'", extension.name(), ty.name());
                return Some(builder);
            }
        }

        if ty.is_abstract() {
            return self
                .from_auto_implementations(ty, &metadata, Acceptance::Transitive, visiting)
                .or_else(|| self.from_configuration_candidates(ty, Acceptance::Transitive, visiting));
        }

        if !ty.is_constructible() {
            tracing::debug!("Type '{}' has no constructor and no candidates", ty.name());
            return None;
        }
        Some(self.reflective(ty, &metadata))
    }

    fn from_auto_implementations(
        &self,
        ty: &TypeRef,
        metadata: &TypeMetadata,
        acceptance: Acceptance,
        visiting: &mut Vec<String>,
    ) -> Option<DefinitionBuilder> {
        for candidate in &metadata.auto_implementations {
            if let Some(target) = self.accept_candidate(ty, candidate, acceptance, visiting) {
                return Some(self.delegating(ty, metadata, &target));
            }
        }
        None
    }

    fn from_configuration_candidates(
        &self,
        ty: &TypeRef,
        acceptance: Acceptance,
        visiting: &mut Vec<String>,
    ) -> Option<DefinitionBuilder> {
        let mut candidates: Vec<(i32, TypeRef)> = self
            .metadata
            .configuration_candidates()
            .into_iter()
            .filter(|candidate| candidate != ty && self.metadata.is_assignable(candidate, ty))
            .map(|candidate| {
                let priority = self
                    .metadata
                    .metadata(&candidate)
                    .configuration_priority
                    .unwrap_or_default();
                (priority, candidate)
            })
            .collect();
        candidates.sort_by_key(|(priority, _)| *priority);

        let metadata = self.metadata.metadata(ty);
        for (_, candidate) in candidates {
            let candidate = Candidate::Type(candidate);
            if let Some(target) = self.accept_candidate(ty, &candidate, acceptance, visiting) {
                return Some(self.delegating(ty, &metadata, &target));
            }
        }
        None
    }

    /// The definition `candidate` stands for, if it is assignable to `ty` and
    /// constructible under `acceptance`
    fn accept_candidate(
        &self,
        ty: &TypeRef,
        candidate: &Candidate,
        acceptance: Acceptance,
        visiting: &mut Vec<String>,
    ) -> Option<Arc<Definition>> {
        let (name, registered, candidate_type) = match candidate {
            Candidate::Name(name) => (
                name.as_str(),
                self.registry.lookup(name),
                self.metadata.lookup_type(name),
            ),
            Candidate::Type(candidate_type) => (
                candidate_type.name(),
                self.registry.lookup(candidate_type.name()),
                Some(candidate_type.clone()),
            ),
        };

        let assignable_type = registered
            .as_ref()
            .map(|definition| definition.target_type().clone())
            .or_else(|| candidate_type.clone());
        let Some(assignable_type) = assignable_type else {
            tracing::warn!("Candidate '{}' for '{}' is not a known type or definition", name, ty.name());
            return None;
        };
        if !self.metadata.is_assignable(&assignable_type, ty) {
            tracing::warn!(
                "Candidate '{}' is not assignable to '{}', skipping it",
                name,
                ty.name()
            );
            return None;
        }

        if let Some(definition) = registered {
            return definition.is_constructible().then_some(definition);
        }
        let candidate_type = candidate_type?;
        match acceptance {
            Acceptance::Direct if !candidate_type.is_constructible() => None,
            _ => self
                .resolve_guarded(&candidate_type, visiting)
                .filter(|definition| definition.is_constructible()),
        }
    }

    fn delegating(&self, ty: &TypeRef, metadata: &TypeMetadata, target: &Arc<Definition>) -> DefinitionBuilder {
        tracing::debug!("Resolved '{}' to implementation '{}'", ty.name(), target.id());
        Definition::delegating(ty.name(), ty.clone(), target.id())
            .singleton(target.is_singleton())
            .aliases(metadata.aliases.iter().cloned())
    }

    fn reflective(&self, ty: &TypeRef, metadata: &TypeMetadata) -> DefinitionBuilder {
        let decision = self.policy.decide(ty, metadata, self.metadata.as_ref());
        tracing::debug!(
            "Proxy decision for '{}': enabled={} ({:?})",
            ty.name(),
            decision.enabled,
            decision.reason
        );
        Definition::reflective(ty.clone())
            .singleton(metadata.singleton.unwrap_or(self.default_singleton))
            .proxy(decision)
            .aliases(metadata.aliases.iter().cloned())
            .interceptors(self.interceptors.iter().cloned())
    }

    /// Freeze and register; a concurrently registered winner is returned
    /// instead so every caller shares one definition
    fn publish(&self, builder: DefinitionBuilder) -> Arc<Definition> {
        let definition = builder.freeze();
        if !self.register_resolved {
            return definition;
        }
        match self.registry.register(definition.clone(), false) {
            Ok(winner) => winner,
            Err(error) => {
                tracing::warn!("Could not register resolved definition '{}': {}", definition.id(), error);
                definition
            }
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry.len())
            .field("policy", &self.policy)
            .field(
                "extensions",
                &self.extensions.iter().map(|e| e.name().to_string()).collect::<Vec<_>>(),
            )
            .field("interceptors", &self.interceptors.len())
            .field("default_singleton", &self.default_singleton)
            .field("register_resolved", &self.register_resolved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::definition::DefinitionKind;
    use crate::container::proxy::ProxyReason;
    use crate::foundation::{Bean, Instance};
    use crate::metadata::TypeCatalog;

    struct Impl;

    impl Bean for Impl {}

    fn concrete(name: &str) -> TypeRef {
        TypeRef::concrete(name, |_| Ok(Instance::new(Impl)))
    }

    fn resolver(catalog: TypeCatalog) -> Resolver {
        Resolver::new(
            Arc::new(DefinitionRegistry::new()),
            Arc::new(catalog),
            ProxyPolicy::default(),
        )
    }

    #[test]
    fn test_auto_implementation_list_beats_configuration_candidates() {
        let catalog = TypeCatalog::new()
            .with_type(
                TypeRef::interface("Storage"),
                TypeMetadata::new()
                    .auto_implement_name("DiskStorage")
                    .auto_implement_name("MemoryStorage"),
            )
            .with_type(TypeRef::abstract_type("DiskStorage"), TypeMetadata::new().extends("Storage"))
            .with_type(concrete("MemoryStorage"), TypeMetadata::new().extends("Storage"))
            .with_type(
                concrete("CloudStorage"),
                TypeMetadata::new().extends("Storage").configuration_candidate(0),
            );
        let resolver = resolver(catalog);

        let definition = resolver.resolve_name("Storage").unwrap();

        assert_eq!(definition.kind(), DefinitionKind::DelegatingAutoImpl);
        assert_eq!(definition.id(), "Storage");
        assert_eq!(definition.delegate_id(), Some("MemoryStorage"));
        assert!(resolver.registry().contains("MemoryStorage"));
    }

    #[test]
    fn test_configuration_candidates_ordered_by_priority() {
        let catalog = TypeCatalog::new()
            .with_type(TypeRef::interface("Clock"), TypeMetadata::new())
            .with_type(
                concrete("SystemClock"),
                TypeMetadata::new().extends("Clock").configuration_candidate(10),
            )
            .with_type(
                concrete("FixedClock"),
                TypeMetadata::new().extends("Clock").configuration_candidate(1),
            );

        let definition = resolver(catalog).resolve_name("Clock").unwrap();
        assert_eq!(definition.delegate_id(), Some("FixedClock"));
    }

    #[test]
    fn test_non_assignable_candidate_is_skipped() {
        let catalog = TypeCatalog::new()
            .with_type(
                TypeRef::interface("Notifier"),
                TypeMetadata::new()
                    .auto_implement_name("Unrelated")
                    .auto_implement_name("EmailNotifier"),
            )
            .with_type(concrete("Unrelated"), TypeMetadata::new())
            .with_type(concrete("EmailNotifier"), TypeMetadata::new().extends("Notifier"));

        let definition = resolver(catalog).resolve_name("Notifier").unwrap();
        assert_eq!(definition.delegate_id(), Some("EmailNotifier"));
    }

    #[test]
    fn test_lenient_retry_follows_nested_candidates() {
        let catalog = TypeCatalog::new()
            .with_type(
                TypeRef::interface("Repository"),
                TypeMetadata::new().auto_implement_name("CachedRepository"),
            )
            .with_type(
                TypeRef::abstract_type("CachedRepository"),
                TypeMetadata::new()
                    .extends("Repository")
                    .auto_implement_name("LruRepository"),
            )
            .with_type(concrete("LruRepository"), TypeMetadata::new().extends("CachedRepository"));
        let resolver = resolver(catalog);

        let definition = resolver.resolve_name("Repository").unwrap();
        assert_eq!(definition.delegate_id(), Some("CachedRepository"));
        let nested = resolver.resolve_name("CachedRepository").unwrap();
        assert_eq!(nested.delegate_id(), Some("LruRepository"));
    }

    #[test]
    fn test_unresolvable_types() {
        let catalog = TypeCatalog::new()
            .with_type(TypeRef::interface("Orphan"), TypeMetadata::new())
            .with_type(TypeRef::opaque("External"), TypeMetadata::new())
            .with_type(
                TypeRef::interface("Loop"),
                TypeMetadata::new().auto_implement_name("Loop"),
            );
        let resolver = resolver(catalog);

        assert!(resolver.resolve_name("Orphan").is_none());
        assert!(resolver.resolve_name("External").is_none());
        assert!(resolver.resolve_name("Loop").is_none());
        assert!(resolver.resolve_name("Unknown").is_none());
    }

    #[test]
    fn test_reflective_definition_applies_markers() {
        let catalog = TypeCatalog::new().with_type(
            concrete("Mailer"),
            TypeMetadata::new().service().singleton(false).alias("mailer"),
        );
        let resolver = resolver(catalog);

        let definition = resolver.resolve_name("Mailer").unwrap();
        assert_eq!(definition.kind(), DefinitionKind::Proxied);
        assert_eq!(definition.proxy_decision().reason, ProxyReason::Service);
        assert!(!definition.is_singleton());
        assert!(Arc::ptr_eq(&resolver.resolve_name("mailer").unwrap(), &definition));
    }

    #[test]
    fn test_metadata_alias_resolves_before_its_type() {
        let catalog = TypeCatalog::new().with_type(concrete("Mailer"), TypeMetadata::new().alias("mailer"));
        let resolver = resolver(catalog);

        let by_alias = resolver.resolve_name("mailer").unwrap();
        assert_eq!(by_alias.id(), "Mailer");
        assert!(Arc::ptr_eq(&resolver.resolve_name("Mailer").unwrap(), &by_alias));
        assert!(resolver.resolve_name("postman").is_none());
    }

    struct FixedExtension;

    impl ResolverExtension for FixedExtension {
        fn name(&self) -> &str {
            "fixed"
        }

        fn resolve(&self, ty: &TypeRef, _metadata: &dyn MetadataProvider) -> Option<DefinitionBuilder> {
            (ty.name() == "Plugin").then(|| Definition::prebound("Plugin", Instance::new(Impl)))
        }
    }

    #[test]
    fn test_extension_consulted_after_markers() {
        let catalog = TypeCatalog::new().with_type(TypeRef::interface("Plugin"), TypeMetadata::new());
        let resolver = resolver(catalog).with_extensions(vec![Arc::new(FixedExtension) as Arc<dyn ResolverExtension>]);

        let definition = resolver.resolve_name("Plugin").unwrap();
        assert_eq!(definition.kind(), DefinitionKind::PreboundInstance);
    }
}
