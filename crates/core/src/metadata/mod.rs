//! Declarative type metadata consumed by the container.
//!
//! Types are described by registration tables rather than runtime
//! reflection: a [`TypeRef`] names a type and optionally carries its
//! constructor, and a [`MetadataProvider`] answers questions about the
//! markers declared on it.

pub mod catalog;

pub use catalog::TypeCatalog;

use crate::container::definition::Definition;
use crate::container::Container;
use crate::errors::BoxError;
use crate::foundation::Instance;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Constructor invoked by reflective definitions
pub type Constructor =
    Arc<dyn Fn(&ConstructionContext<'_>) -> Result<Instance, BoxError> + Send + Sync>;

/// One-time static dependence hook run during `Container::init`
pub type StaticHook = Arc<dyn Fn(&Container) -> Result<(), BoxError> + Send + Sync>;

/// Structural kind of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Concrete,
    Abstract,
    Interface,
}

struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    constructor: Option<Constructor>,
}

/// Opaque reference to a type known to the container
#[derive(Clone)]
pub struct TypeRef(Arc<TypeDescriptor>);

impl TypeRef {
    /// A concrete type built by `constructor`
    pub fn concrete<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&ConstructionContext<'_>) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self::with_parts(name, TypeKind::Concrete, Some(Arc::new(constructor)))
    }

    /// A concrete type the container cannot build itself
    pub fn opaque(name: impl Into<String>) -> Self {
        Self::with_parts(name, TypeKind::Concrete, None)
    }

    pub fn abstract_type(name: impl Into<String>) -> Self {
        Self::with_parts(name, TypeKind::Abstract, None)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_parts(name, TypeKind::Interface, None)
    }

    fn with_parts(name: impl Into<String>, kind: TypeKind, constructor: Option<Constructor>) -> Self {
        Self(Arc::new(TypeDescriptor {
            name: name.into(),
            kind,
            constructor,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    /// Abstract types and interfaces cannot be constructed directly
    pub fn is_abstract(&self) -> bool {
        !matches!(self.0.kind, TypeKind::Concrete)
    }

    pub fn constructor(&self) -> Option<&Constructor> {
        self.0.constructor.as_ref()
    }

    /// Concrete and carrying a constructor
    pub fn is_constructible(&self) -> bool {
        !self.is_abstract() && self.0.constructor.is_some()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRef")
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("constructor", &self.0.constructor.is_some())
            .finish()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Candidate implementation listed by an auto-implementation marker
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Name(String),
    Type(TypeRef),
}

/// Markers declared on a type
#[derive(Debug, Clone, Default)]
pub struct TypeMetadata {
    /// Structurally final; never proxied
    pub is_final: bool,
    /// Carries the service marker
    pub service: bool,
    /// Explicit type-level proxy override
    pub proxy_override: Option<bool>,
    /// Explicit per-member proxy overrides
    pub member_proxy_overrides: BTreeMap<String, bool>,
    /// Explicit scope override
    pub singleton: Option<bool>,
    /// Present when the type is a configuration candidate; lower wins
    pub configuration_priority: Option<i32>,
    /// Declared alternate implementations, in priority order
    pub auto_implementations: Vec<Candidate>,
    /// Superclass first, then implemented interfaces
    pub supertypes: Vec<String>,
    /// Extra names the definition should answer to
    pub aliases: Vec<String>,
    /// Instantiate during `Container::init`
    pub eager: bool,
}

impl TypeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sealed(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn service(mut self) -> Self {
        self.service = true;
        self
    }

    pub fn proxy_override(mut self, enabled: bool) -> Self {
        self.proxy_override = Some(enabled);
        self
    }

    pub fn member_proxy_override(mut self, member: impl Into<String>, enabled: bool) -> Self {
        self.member_proxy_overrides.insert(member.into(), enabled);
        self
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = Some(singleton);
        self
    }

    pub fn configuration_candidate(mut self, priority: i32) -> Self {
        self.configuration_priority = Some(priority);
        self
    }

    pub fn auto_implement(mut self, candidate: Candidate) -> Self {
        self.auto_implementations.push(candidate);
        self
    }

    pub fn auto_implement_name(self, name: impl Into<String>) -> Self {
        self.auto_implement(Candidate::Name(name.into()))
    }

    pub fn auto_implement_type(self, ty: TypeRef) -> Self {
        self.auto_implement(Candidate::Type(ty))
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }
}

/// Source of declarative facts about types
pub trait MetadataProvider: Send + Sync {
    /// Markers declared on `ty`; unknown types have none
    fn metadata(&self, ty: &TypeRef) -> TypeMetadata;

    /// Find a type by name
    fn lookup_type(&self, name: &str) -> Option<TypeRef>;

    /// Find the type whose markers declare `alias`
    fn lookup_alias(&self, _alias: &str) -> Option<TypeRef> {
        None
    }

    /// Whether a value of `candidate` may stand in for `target`
    fn is_assignable(&self, candidate: &TypeRef, target: &TypeRef) -> bool;

    /// Types carrying the configuration candidate marker, in discovery order
    fn configuration_candidates(&self) -> Vec<TypeRef>;

    /// One-time static dependence hook declared for `ty`
    fn static_dependence(&self, _ty: &TypeRef) -> Option<StaticHook> {
        None
    }

    /// `ty` followed by its supertypes, most specific first, without duplicates
    fn type_hierarchy(&self, ty: &TypeRef) -> Vec<String> {
        let mut hierarchy = vec![ty.name().to_string()];
        let mut cursor = 0;
        while cursor < hierarchy.len() {
            let current = hierarchy[cursor].clone();
            cursor += 1;
            let supertypes = match self.lookup_type(&current) {
                Some(found) => self.metadata(&found).supertypes,
                None if current == ty.name() => self.metadata(ty).supertypes,
                None => continue,
            };
            for supertype in supertypes {
                if !hierarchy.contains(&supertype) {
                    hierarchy.push(supertype);
                }
            }
        }
        hierarchy
    }
}

/// Everything a constructor may use while building an instance
pub struct ConstructionContext<'a> {
    container: &'a Container,
    definition: &'a Definition,
    args: &'a [Value],
}

impl<'a> ConstructionContext<'a> {
    pub(crate) fn new(container: &'a Container, definition: &'a Definition, args: &'a [Value]) -> Self {
        Self {
            container,
            definition,
            args,
        }
    }

    /// Container performing the construction, for constructor injection
    pub fn container(&self) -> &'a Container {
        self.container
    }

    pub fn definition(&self) -> &'a Definition {
        self.definition
    }

    pub fn definition_id(&self) -> &'a str {
        self.definition.id()
    }

    /// Explicit arguments passed to `get_instance`
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    pub fn arg(&self, index: usize) -> Option<&'a Value> {
        self.args.get(index)
    }
}
