//! Prototype catalog and pooled instantiation for cell visuals.
//!
//! The pool is an owned object injected into the stage rather than a global;
//! `clear` is called at level-teardown boundaries. A visual borrowed for one
//! position is owned by exactly that position (or by a pending hide timer)
//! until it is released back here.

use std::collections::HashMap;

use hexink_core::{CellId, GridPosition, LayerKind, WorldPoint};
use tracing::error;

use crate::behavior::CellBehavior;
use crate::visual::{AnimationProfile, CellHandle, CellVisual};

/// Blueprint from which live visuals are instantiated.
#[derive(Clone, Debug)]
pub struct CellPrototype {
    id: CellId,
    behavior: CellBehavior,
    animation: AnimationProfile,
}

impl CellPrototype {
    /// Creates a prototype with the provided identity, behavior, and timing.
    #[must_use]
    pub fn new(id: CellId, behavior: CellBehavior, animation: AnimationProfile) -> Self {
        Self {
            id,
            behavior,
            animation,
        }
    }

    /// Identity stamped onto every visual instantiated from this prototype.
    #[must_use]
    pub const fn id(&self) -> CellId {
        self.id
    }

    fn instantiate(&self) -> CellVisual {
        CellVisual::new(self.id, self.behavior.clone(), self.animation)
    }
}

/// Catalog of prototypes keyed by identity.
#[derive(Clone, Debug, Default)]
pub struct CellCatalog {
    prototypes: HashMap<CellId, CellPrototype>,
}

impl CellCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a prototype. A second registration under the same identity
    /// is rejected and leaves the existing prototype in place.
    pub fn register(&mut self, prototype: CellPrototype) -> bool {
        if self.prototypes.contains_key(&prototype.id()) {
            error!(id = prototype.id().get(), "prototype already registered");
            return false;
        }
        let _ = self.prototypes.insert(prototype.id(), prototype);
        true
    }

    /// Reports whether a prototype with the identity exists.
    #[must_use]
    pub fn contains(&self, id: CellId) -> bool {
        self.prototypes.contains_key(&id)
    }

    fn get(&self, id: CellId) -> Option<&CellPrototype> {
        self.prototypes.get(&id)
    }
}

/// Reusable store of parked visuals keyed by identity.
#[derive(Clone, Debug, Default)]
pub struct CellPool {
    catalog: CellCatalog,
    parked: HashMap<CellId, Vec<CellVisual>>,
}

impl CellPool {
    /// Creates a pool backed by the provided prototype catalog.
    #[must_use]
    pub fn new(catalog: CellCatalog) -> Self {
        Self {
            catalog,
            parked: HashMap::new(),
        }
    }

    /// Prototype catalog backing the pool.
    #[must_use]
    pub const fn catalog(&self) -> &CellCatalog {
        &self.catalog
    }

    /// Acquires a visual of the requested identity, bound to its layer, grid
    /// position, and world location. Reuses a parked instance when one is
    /// available; otherwise instantiates from the catalog. Unknown identities
    /// are a logged failure.
    pub fn acquire(
        &mut self,
        id: CellId,
        layer: LayerKind,
        position: GridPosition,
        world: WorldPoint,
    ) -> Option<CellHandle> {
        let visual = match self.parked.get_mut(&id).and_then(Vec::pop) {
            Some(parked) => Some(parked),
            None => self.catalog.get(id).map(CellPrototype::instantiate),
        };
        let Some(mut visual) = visual else {
            error!(id = id.get(), "acquire failed, prototype not registered");
            return None;
        };
        visual.setup(layer, position, world);
        Some(CellHandle::new(visual))
    }

    /// Returns a handle's visual to the pool for later reuse.
    pub fn release(&mut self, handle: CellHandle) {
        let visual = handle.into_visual();
        self.parked.entry(visual.id()).or_default().push(visual);
    }

    /// Number of parked visuals of the given identity.
    #[must_use]
    pub fn parked(&self, id: CellId) -> usize {
        self.parked.get(&id).map_or(0, Vec::len)
    }

    /// Drops every parked visual. Called at level-teardown boundaries.
    pub fn clear(&mut self) {
        self.parked.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with_prototype(id: u32) -> CellPool {
        let mut catalog = CellCatalog::new();
        assert!(catalog.register(CellPrototype::new(
            CellId::new(id),
            CellBehavior::Collect,
            AnimationProfile::instant(),
        )));
        CellPool::new(catalog)
    }

    fn acquire(pool: &mut CellPool, id: u32) -> Option<CellHandle> {
        pool.acquire(
            CellId::new(id),
            LayerKind::Collectible,
            GridPosition::new(0, 0),
            WorldPoint::new(0.0, 0.0),
        )
    }

    #[test]
    fn acquire_reuses_released_visuals() {
        let mut pool = pool_with_prototype(1);
        let handle = acquire(&mut pool, 1).expect("known prototype");
        pool.release(handle);
        assert_eq!(pool.parked(CellId::new(1)), 1);

        let _reused = acquire(&mut pool, 1).expect("parked visual");
        assert_eq!(pool.parked(CellId::new(1)), 0);
    }

    #[test]
    fn acquire_rejects_unknown_prototypes() {
        let mut pool = pool_with_prototype(1);
        assert!(acquire(&mut pool, 9).is_none());
    }

    #[test]
    fn duplicate_registration_keeps_the_original() {
        let mut catalog = CellCatalog::new();
        assert!(catalog.register(CellPrototype::new(
            CellId::new(1),
            CellBehavior::Collect,
            AnimationProfile::instant(),
        )));
        assert!(!catalog.register(CellPrototype::new(
            CellId::new(1),
            CellBehavior::Ink {
                spawn: CellId::new(1)
            },
            AnimationProfile::instant(),
        )));
    }

    #[test]
    fn clear_drops_parked_visuals() {
        let mut pool = pool_with_prototype(1);
        let handle = acquire(&mut pool, 1).expect("known prototype");
        pool.release(handle);
        pool.clear();
        assert_eq!(pool.parked(CellId::new(1)), 0);
    }
}
