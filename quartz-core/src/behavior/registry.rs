//! Registry mapping block types to automation behaviors.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::world::BlockTypeId;

use super::BehaviorDefinition;

/// Failure to change the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry was changed while a tick was running.
    #[error("registry cannot be modified while a tick is in progress")]
    ConcurrentModification,
    /// The block type already has a behavior.
    #[error("block type {0} already has a behavior")]
    AlreadyRegistered(BlockTypeId),
    /// The definition violates its own constraints.
    #[error("invalid behavior definition: {0}")]
    InvalidDefinition(&'static str),
}

/// Block type to behavior lookup, shared between the host and the scheduler.
///
/// Registration is expected at startup or between ticks. While any scheduler
/// holds a [`TickGuard`], mutations fail with
/// [`RegistryError::ConcurrentModification`] instead of changing behavior
/// under a running tick.
#[derive(Debug, Default)]
pub struct AutomationRegistry {
    behaviors: RwLock<FxHashMap<BlockTypeId, Arc<BehaviorDefinition>>>,
    active_ticks: AtomicUsize,
    generation: AtomicU64,
}

impl AutomationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `definition` with `id`.
    pub fn register(
        &self,
        id: BlockTypeId,
        definition: BehaviorDefinition,
    ) -> Result<(), RegistryError> {
        let mut behaviors = self.behaviors.write();
        if self.in_tick() {
            return Err(RegistryError::ConcurrentModification);
        }
        if behaviors.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        log::debug!("Registered automation behavior for {id}");
        behaviors.insert(id, Arc::new(definition));
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Removes the behavior for `id`, returning it if there was one.
    ///
    /// Sites of that type are dropped at the scheduler's next reconcile.
    pub fn unregister(
        &self,
        id: &BlockTypeId,
    ) -> Result<Option<Arc<BehaviorDefinition>>, RegistryError> {
        let mut behaviors = self.behaviors.write();
        if self.in_tick() {
            return Err(RegistryError::ConcurrentModification);
        }
        let removed = behaviors.remove(id);
        if removed.is_some() {
            log::debug!("Unregistered automation behavior for {id}");
            self.generation.fetch_add(1, Ordering::Release);
        }
        Ok(removed)
    }

    /// The behavior for `id`.
    #[must_use]
    pub fn lookup(&self, id: &BlockTypeId) -> Option<Arc<BehaviorDefinition>> {
        self.behaviors.read().get(id).cloned()
    }

    /// Whether `definition` is still the behavior registered for `id`.
    ///
    /// False once `id` is unregistered, even if it was registered again since.
    #[must_use]
    pub fn is_current(&self, id: &BlockTypeId, definition: &Arc<BehaviorDefinition>) -> bool {
        self.behaviors
            .read()
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, definition))
    }

    /// Whether `id` has a behavior.
    #[must_use]
    pub fn contains(&self, id: &BlockTypeId) -> bool {
        self.behaviors.read().contains_key(id)
    }

    /// Number of registered block types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviors.read().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviors.read().is_empty()
    }

    /// Bumped on every successful mutation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether a tick is currently running against this registry.
    #[must_use]
    pub fn in_tick(&self) -> bool {
        self.active_ticks.load(Ordering::Acquire) > 0
    }

    /// Marks a tick as running until the guard is dropped.
    ///
    /// Takes the write lock briefly so a registration racing with the start
    /// of a tick either completes first or observes the guard.
    #[must_use]
    pub fn enter_tick(&self) -> TickGuard<'_> {
        let _behaviors = self.behaviors.write();
        self.active_ticks.fetch_add(1, Ordering::AcqRel);
        TickGuard { registry: self }
    }
}

/// Blocks registry mutation while alive.
#[derive(Debug)]
pub struct TickGuard<'a> {
    registry: &'a AutomationRegistry,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.registry.active_ticks.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use quartz_utils::Identifier;

    use super::*;

    const GENERATOR: Identifier = Identifier::new_static("fastquartz", "quartz_generator");

    fn definition() -> BehaviorDefinition {
        BehaviorDefinition::builder(1, 1).build().expect("valid")
    }

    #[test]
    fn test_register_lookup_unregister() {
        let registry = AutomationRegistry::new();
        assert!(registry.is_empty());

        registry
            .register(GENERATOR, definition())
            .expect("register");
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&GENERATOR));
        assert!(registry.lookup(&GENERATOR).is_some());
        assert_eq!(registry.generation(), 1);

        let removed = registry.unregister(&GENERATOR).expect("unregister");
        assert!(removed.is_some());
        assert!(registry.lookup(&GENERATOR).is_none());
        assert_eq!(registry.generation(), 2);

        assert!(registry.unregister(&GENERATOR).expect("no-op").is_none());
        assert_eq!(registry.generation(), 2);
    }

    #[test]
    fn test_reregistration_is_not_current() {
        let registry = AutomationRegistry::new();
        registry
            .register(GENERATOR, definition())
            .expect("register");
        let first = registry.lookup(&GENERATOR).expect("registered");
        assert!(registry.is_current(&GENERATOR, &first));

        registry.unregister(&GENERATOR).expect("unregister");
        assert!(!registry.is_current(&GENERATOR, &first));

        registry
            .register(GENERATOR, definition())
            .expect("register again");
        assert!(!registry.is_current(&GENERATOR, &first));
        let second = registry.lookup(&GENERATOR).expect("registered");
        assert!(registry.is_current(&GENERATOR, &second));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = AutomationRegistry::new();
        registry
            .register(GENERATOR, definition())
            .expect("register");
        assert_eq!(
            registry.register(GENERATOR, definition()),
            Err(RegistryError::AlreadyRegistered(GENERATOR))
        );
    }

    #[test]
    fn test_mutation_during_tick_fails() {
        let registry = AutomationRegistry::new();
        {
            let _guard = registry.enter_tick();
            assert!(registry.in_tick());
            assert_eq!(
                registry.register(GENERATOR, definition()),
                Err(RegistryError::ConcurrentModification)
            );
            assert_eq!(
                registry.unregister(&GENERATOR).map(|d| d.is_some()),
                Err(RegistryError::ConcurrentModification)
            );
            assert_eq!(registry.generation(), 0);
        }
        assert!(!registry.in_tick());
        registry
            .register(GENERATOR, definition())
            .expect("register after tick");
    }

    #[test]
    fn test_nested_guards() {
        let registry = AutomationRegistry::new();
        let outer = registry.enter_tick();
        let inner = registry.enter_tick();
        drop(inner);
        assert!(registry.in_tick());
        drop(outer);
        assert!(!registry.in_tick());
    }
}
