use crate::container::definition::Definition;
use crate::errors::{CoreError, CoreResult};
use crate::foundation::Instance;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, LockResult, Mutex, MutexGuard, PoisonError, RwLock};

thread_local! {
    /// Singleton ids currently being created on this thread
    static CREATING: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Pops the id pushed on `CREATING` when creation ends, success or not
struct CreationGuard;

impl CreationGuard {
    fn enter(id: &str) -> CoreResult<Self> {
        CREATING.with(|creating| {
            let mut creating = creating.borrow_mut();
            if creating.iter().any(|current| current == id) {
                let mut path = creating.clone();
                path.push(id.to_string());
                return Err(CoreError::CircularDependency {
                    path: path.join(" -> "),
                    id: id.to_string(),
                });
            }
            creating.push(id.to_string());
            Ok(CreationGuard)
        })
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        CREATING.with(|creating| {
            creating.borrow_mut().pop();
        });
    }
}

fn relock<'a, T>(result: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

/// Published singleton instances plus the order they were created in.
///
/// Creation of one id holds only that id's slot, so unrelated singletons are
/// built concurrently.
#[derive(Debug, Default)]
pub struct SingletonCache {
    published: RwLock<HashMap<String, Instance>>,
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    order: Mutex<Vec<(Arc<Definition>, Instance)>>,
}

impl SingletonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Instance> {
        self.published.read().ok()?.get(id).cloned()
    }

    /// Return the published instance for `definition`, running `create` at
    /// most once across threads. A failed `create` publishes nothing.
    pub fn get_or_create<F>(&self, definition: &Arc<Definition>, create: F) -> CoreResult<Instance>
    where
        F: FnOnce() -> CoreResult<Instance>,
    {
        let id = definition.id();
        if let Some(instance) = self.get(id) {
            return Ok(instance);
        }

        let _creating = CreationGuard::enter(id)?;

        let slot = relock(self.slots.lock())
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _slot_guard = relock(slot.lock());

        if let Some(instance) = self.get(id) {
            return Ok(instance);
        }

        let instance = create()?;
        {
            let mut published = self
                .published
                .write()
                .map_err(|_| CoreError::lock("singleton_cache"))?;
            published.insert(id.to_string(), instance.clone());
        }
        relock(self.order.lock()).push((definition.clone(), instance.clone()));
        tracing::debug!("Published singleton '{}'", id);
        Ok(instance)
    }

    /// Live singletons in creation order
    pub fn live(&self) -> Vec<(Arc<Definition>, Instance)> {
        relock(self.order.lock()).clone()
    }

    /// Remove every singleton, newest first
    pub fn drain_reverse(&self) -> Vec<(Arc<Definition>, Instance)> {
        let mut drained: Vec<_> = relock(self.order.lock()).drain(..).collect();
        drained.reverse();
        match self.published.write() {
            Ok(mut published) => published.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
        relock(self.slots.lock()).clear();
        drained
    }

    pub fn len(&self) -> usize {
        self.published.read().map(|published| published.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::Bean;
    use crate::metadata::TypeRef;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter;

    impl Bean for Counter {}

    fn definition(id: &str) -> Arc<Definition> {
        Definition::builder(id, TypeRef::opaque(id)).freeze()
    }

    #[test]
    fn test_failed_creation_is_not_cached() {
        let cache = SingletonCache::new();
        let definition = definition("flaky");
        let attempts = AtomicUsize::new(0);

        let first = cache.get_or_create(&definition, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::construction_failed("flaky", "boom"))
        });
        assert!(first.is_err());
        assert!(cache.get("flaky").is_none());

        let second = cache.get_or_create(&definition, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new(Counter))
        });
        assert!(second.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reentrant_creation_reports_cycle() {
        let cache = SingletonCache::new();
        let definition = definition("selfish");

        let error = cache
            .get_or_create(&definition, || cache.get_or_create(&definition, || Ok(Instance::new(Counter))))
            .unwrap_err();
        assert!(matches!(error, CoreError::CircularDependency { ref id, .. } if id == "selfish"));

        // the guard was released, so a fresh attempt succeeds
        assert!(cache.get_or_create(&definition, || Ok(Instance::new(Counter))).is_ok());
    }

    #[test]
    fn test_drain_returns_newest_first() {
        let cache = SingletonCache::new();
        for id in ["s1", "s2", "s3"] {
            cache.get_or_create(&definition(id), || Ok(Instance::new(Counter))).unwrap();
        }
        let order: Vec<String> = cache
            .drain_reverse()
            .iter()
            .map(|(definition, _)| definition.id().to_string())
            .collect();
        assert_eq!(order, vec!["s3", "s2", "s1"]);
        assert!(cache.is_empty());
    }
}
