//! One semantic channel of cells keyed by grid position.

use std::collections::{HashMap, HashSet};

use hexink_core::{AddCellError, CellId, GridPosition, LayerKind, RemoveCellError};
use tracing::{error, warn};

use crate::ground::GroundMap;
use crate::pool::CellPool;
use crate::scheduler::{Scheduler, Signal};
use crate::visual::CellHandle;

/// Typed collection of cell visuals sharing one gameplay role.
///
/// The `cells` map is the single ownership tracker for the layer: a position
/// either tracks exactly one handle or none. Removal detaches the handle
/// from the map synchronously; the visual itself is only returned to the pool
/// once its hide animation completes, so callers must not assume a removed
/// handle is immediately reusable.
#[derive(Debug)]
pub struct Layer {
    kind: LayerKind,
    ground: GroundMap,
    defaults: Vec<(GridPosition, CellId)>,
    cells: HashMap<GridPosition, CellHandle>,
    default_cells: HashSet<GridPosition>,
    player_cells: HashSet<GridPosition>,
}

impl Layer {
    /// Creates a layer with its ground map and the default cells placed at
    /// level load. Defaults materialize when the stage runs its setup.
    #[must_use]
    pub fn new(
        kind: LayerKind,
        ground: GroundMap,
        defaults: Vec<(GridPosition, CellId)>,
    ) -> Self {
        Self {
            kind,
            ground,
            defaults,
            cells: HashMap::new(),
            default_cells: HashSet::new(),
            player_cells: HashSet::new(),
        }
    }

    /// Gameplay role of this layer.
    #[must_use]
    pub const fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Ground map backing this layer.
    #[must_use]
    pub const fn ground(&self) -> &GroundMap {
        &self.ground
    }

    /// Number of currently tracked cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the layer tracks no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterator over every occupied position, in no particular order.
    pub fn positions(&self) -> impl Iterator<Item = GridPosition> + '_ {
        self.cells.keys().copied()
    }

    /// Reports whether `position` is paintable ground in this layer.
    #[must_use]
    pub fn contains_ground(&self, position: GridPosition) -> bool {
        self.ground.contains(position)
    }

    /// Reports whether a cell occupies `position`.
    #[must_use]
    pub fn contains_cell(&self, position: GridPosition) -> bool {
        self.cells.contains_key(&position)
    }

    /// Handle tracked at `position`, if any.
    #[must_use]
    pub fn cell(&self, position: GridPosition) -> Option<&CellHandle> {
        self.cells.get(&position)
    }

    /// Tears down any current occupancy and materializes the default cells.
    pub(crate) fn setup(&mut self, pool: &mut CellPool) {
        for (_, mut handle) in self.cells.drain() {
            let _ = handle.visual_mut().hide();
            pool.release(handle);
        }
        self.default_cells.clear();
        self.player_cells.clear();

        let defaults = self.defaults.clone();
        for (position, prototype) in defaults {
            if !self.ground.contains(position) {
                warn!(
                    layer = ?self.kind,
                    x = position.x(),
                    y = position.y(),
                    "default cell skipped, no ground"
                );
                continue;
            }
            if self.cells.contains_key(&position) {
                warn!(
                    layer = ?self.kind,
                    x = position.x(),
                    y = position.y(),
                    "duplicate default cell skipped"
                );
                continue;
            }
            if self.spawn(position, prototype, pool).is_ok() {
                let _ = self.default_cells.insert(position);
            }
        }
    }

    /// Adds a cell instantiated from `prototype` at `position`.
    pub(crate) fn add_cell(
        &mut self,
        position: GridPosition,
        prototype: CellId,
        pool: &mut CellPool,
    ) -> Result<(), AddCellError> {
        if self.cells.contains_key(&position) {
            error!(
                layer = ?self.kind,
                x = position.x(),
                y = position.y(),
                "add cell failed, position occupied"
            );
            return Err(AddCellError::Occupied(position));
        }
        if !self.ground.contains(position) {
            error!(
                layer = ?self.kind,
                x = position.x(),
                y = position.y(),
                "add cell failed, no ground"
            );
            return Err(AddCellError::NoGround(position));
        }
        self.spawn(position, prototype, pool)
    }

    fn spawn(
        &mut self,
        position: GridPosition,
        prototype: CellId,
        pool: &mut CellPool,
    ) -> Result<(), AddCellError> {
        let world = self.ground.world_position(position);
        let Some(mut handle) = pool.acquire(prototype, self.kind, position, world) else {
            return Err(AddCellError::UnknownPrototype(prototype));
        };
        let _ = handle.visual_mut().show();
        let _ = self.cells.insert(position, handle);
        Ok(())
    }

    /// Removes the cell at `position`. The map entry disappears immediately;
    /// the handle returns to the pool when its hide animation completes.
    pub(crate) fn remove_cell(
        &mut self,
        position: GridPosition,
        scheduler: &mut Scheduler,
        pool: &mut CellPool,
    ) -> Result<(), RemoveCellError> {
        let Some(mut handle) = self.cells.remove(&position) else {
            error!(
                layer = ?self.kind,
                x = position.x(),
                y = position.y(),
                "remove cell failed, position vacant"
            );
            return Err(RemoveCellError::Vacant(position));
        };
        match handle.visual_mut().hide() {
            None => pool.release(handle),
            Some(delay) => scheduler.schedule(delay, Signal::Release { handle }),
        }
        Ok(())
    }

    /// Marks `position` as player-introduced so restores keep it.
    pub(crate) fn mark_player(&mut self, position: GridPosition) {
        let _ = self.player_cells.insert(position);
    }

    /// Tears down every transient cell and resets the survivors.
    ///
    /// Transient means tracked at a position in neither the default nor the
    /// player set. Survivors get their visual state reset in place; handles
    /// are never recreated here.
    pub(crate) fn restore(&mut self, scheduler: &mut Scheduler, pool: &mut CellPool) {
        let positions: Vec<GridPosition> = self.cells.keys().copied().collect();
        for position in positions {
            if self.default_cells.contains(&position) || self.player_cells.contains(&position) {
                continue;
            }
            if let Some(mut handle) = self.cells.remove(&position) {
                match handle.visual_mut().hide() {
                    None => pool.release(handle),
                    Some(delay) => scheduler.schedule(delay, Signal::Release { handle }),
                }
            }
        }
        for handle in self.cells.values_mut() {
            let _ = handle.visual_mut().restore();
        }
    }
}
