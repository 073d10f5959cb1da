use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::DescriptorId;
use crate::descriptor::Instance;

/// Cache of singleton instances.
///
/// Each descriptor owns a cell that is initialized at most once. Concurrent
/// requests for the same descriptor block on its cell while other descriptors
/// are created in parallel. A failed initialization leaves the cell empty so a
/// later request retries.
#[derive(Default)]
pub(crate) struct ScopeManager {
    cells: DashMap<DescriptorId, Arc<OnceCell<Instance>>>,
}

impl ScopeManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, id: DescriptorId) -> Option<Instance> {
        self.cells.get(&id).and_then(|cell| cell.get().cloned())
    }

    /// Returns the cached instance or runs `factory` exactly once to create it.
    pub(crate) fn get_or_create<E, F>(&self, id: DescriptorId, factory: F) -> Result<Instance, E>
    where
        F: FnOnce() -> Result<Instance, E>,
    {
        // The map shard lock must be released before the factory runs.
        let cell = Arc::clone(self.cells.entry(id).or_default().value());
        cell.get_or_try_init(factory).cloned()
    }

    pub(crate) fn contains(&self, id: DescriptorId) -> bool {
        self.cells.get(&id).is_some_and(|cell| cell.get().is_some())
    }

    pub(crate) fn evict(&self, id: DescriptorId) -> bool {
        self.cells
            .remove(&id)
            .is_some_and(|(_, cell)| cell.get().is_some())
    }

    pub(crate) fn clear(&self) {
        self.cells.clear();
    }

    /// Returns the number of created singletons.
    pub(crate) fn len(&self) -> usize {
        self.cells.iter().filter(|cell| cell.get().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn factory_runs_once() {
        let scopes = ScopeManager::new();
        let id = DescriptorId::next();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            scopes
                .get_or_create::<(), _>(id, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(7u32) as Instance)
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scopes.len(), 1);
    }

    #[test]
    fn failed_factory_is_retried() {
        let scopes = ScopeManager::new();
        let id = DescriptorId::next();
        assert!(scopes.get_or_create(id, || Err("boom")).is_err());
        assert!(!scopes.contains(id));
        let value = scopes
            .get_or_create::<&str, _>(id, || Ok(Arc::new(1u8) as Instance))
            .unwrap();
        assert_eq!(value.downcast_ref::<u8>(), Some(&1));
    }

    #[test]
    fn evict_forgets_instance() {
        let scopes = ScopeManager::new();
        let id = DescriptorId::next();
        scopes
            .get_or_create::<(), _>(id, || Ok(Arc::new(()) as Instance))
            .unwrap();
        assert!(scopes.evict(id));
        assert!(scopes.get(id).is_none());
        assert!(!scopes.evict(id));
    }
}
