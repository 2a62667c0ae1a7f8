use crate::metadata::{MetadataProvider, StaticHook, TypeMetadata, TypeRef};
use crate::container::Container;
use crate::errors::BoxError;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
struct CatalogEntry {
    ty: TypeRef,
    metadata: TypeMetadata,
    static_hook: Option<StaticHook>,
}

/// Registration-table metadata provider.
///
/// Entries keep their registration order, which doubles as the discovery
/// order of configuration candidates.
#[derive(Clone, Default)]
pub struct TypeCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type and its markers; re-registering a name replaces it in place
    pub fn with_type(mut self, ty: TypeRef, metadata: TypeMetadata) -> Self {
        self.register(ty, metadata);
        self
    }

    pub fn register(&mut self, ty: TypeRef, metadata: TypeMetadata) {
        match self.index.get(ty.name()) {
            Some(&position) => {
                let entry = &mut self.entries[position];
                entry.ty = ty;
                entry.metadata = metadata;
            }
            None => {
                self.index.insert(ty.name().to_string(), self.entries.len());
                self.entries.push(CatalogEntry {
                    ty,
                    metadata,
                    static_hook: None,
                });
            }
        }
    }

    /// Attach a static dependence hook to an already registered type
    pub fn with_static_hook<F>(mut self, type_name: &str, hook: F) -> Self
    where
        F: Fn(&Container) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        if let Some(&position) = self.index.get(type_name) {
            self.entries[position].static_hook = Some(Arc::new(hook));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&CatalogEntry> {
        self.index.get(name).map(|&position| &self.entries[position])
    }
}

impl MetadataProvider for TypeCatalog {
    fn metadata(&self, ty: &TypeRef) -> TypeMetadata {
        self.entry(ty.name())
            .map(|entry| entry.metadata.clone())
            .unwrap_or_default()
    }

    fn lookup_type(&self, name: &str) -> Option<TypeRef> {
        self.entry(name).map(|entry| entry.ty.clone())
    }

    fn lookup_alias(&self, alias: &str) -> Option<TypeRef> {
        self.entries
            .iter()
            .find(|entry| entry.metadata.aliases.iter().any(|declared| declared == alias))
            .map(|entry| entry.ty.clone())
    }

    fn is_assignable(&self, candidate: &TypeRef, target: &TypeRef) -> bool {
        candidate == target
            || self
                .type_hierarchy(candidate)
                .iter()
                .any(|name| name == target.name())
    }

    fn configuration_candidates(&self) -> Vec<TypeRef> {
        self.entries
            .iter()
            .filter(|entry| entry.metadata.configuration_priority.is_some())
            .map(|entry| entry.ty.clone())
            .collect()
    }

    fn static_dependence(&self, ty: &TypeRef) -> Option<StaticHook> {
        self.entry(ty.name()).and_then(|entry| entry.static_hook.clone())
    }
}
