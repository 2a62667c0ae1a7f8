use crate::container::definition::Definition;
use crate::errors::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct RegistryMaps {
    definitions: HashMap<String, Arc<Definition>>,
    aliases: HashMap<String, String>,
}

/// Thread-safe store of definitions keyed by id and alias
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    inner: RwLock<RegistryMaps>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition` under its id and aliases in one critical section.
    ///
    /// With `fail_on_conflict` any clash fails and nothing is inserted.
    /// Without it an id clash keeps the existing definition and clashing
    /// aliases are skipped. Returns the definition that is authoritative for
    /// the id afterwards.
    pub fn register(&self, definition: Arc<Definition>, fail_on_conflict: bool) -> CoreResult<Arc<Definition>> {
        let mut maps = self
            .inner
            .write()
            .map_err(|_| CoreError::lock("definition_registry"))?;

        let id = definition.id();
        let existing = maps.definitions.get(id).cloned().or_else(|| {
            maps.aliases
                .get(id)
                .and_then(|owner| maps.definitions.get(owner))
                .cloned()
        });
        if let Some(existing) = existing {
            if fail_on_conflict {
                return Err(CoreError::AlreadyExists {
                    key: id.to_string(),
                    kind: "id",
                });
            }
            tracing::debug!(
                "Definition '{}' already registered as '{}', keeping the existing one",
                id,
                existing.id()
            );
            return Ok(existing);
        }

        let mut accepted = Vec::with_capacity(definition.aliases().len());
        for alias in definition.aliases() {
            let taken = maps.aliases.contains_key(alias) || maps.definitions.contains_key(alias);
            if !taken {
                accepted.push(alias.clone());
                continue;
            }
            if fail_on_conflict {
                return Err(CoreError::AlreadyExists {
                    key: alias.clone(),
                    kind: "alias",
                });
            }
            tracing::debug!("Alias '{}' of '{}' is already taken, skipping it", alias, id);
        }

        for alias in accepted {
            maps.aliases.insert(alias, id.to_string());
        }
        maps.definitions.insert(id.to_string(), definition.clone());
        tracing::debug!("Registered definition '{}' ({:?})", id, definition.kind());
        Ok(definition)
    }

    /// Alias first, then id
    pub fn lookup(&self, name: &str) -> Option<Arc<Definition>> {
        let maps = self.inner.read().ok()?;
        match maps.aliases.get(name) {
            Some(owner) => maps.definitions.get(owner).cloned(),
            None => maps.definitions.get(name).cloned(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|maps| maps.definitions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .read()
            .map(|maps| maps.definitions.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Snapshot of every registered definition, ordered by id
    pub fn definitions(&self) -> Vec<Arc<Definition>> {
        let mut definitions: Vec<Arc<Definition>> = self
            .inner
            .read()
            .map(|maps| maps.definitions.values().cloned().collect())
            .unwrap_or_default();
        definitions.sort_by(|a, b| a.id().cmp(b.id()));
        definitions
    }
}
