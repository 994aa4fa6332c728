#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the hexink engine.
//!
//! This crate defines the pure vocabulary of the game: hex-grid coordinates
//! and neighbor math, layer kinds and their sample priority, cell identities,
//! the command surface that cell behaviors use to request stage mutations,
//! and the result summary produced at the end of a run. Nothing in here owns
//! mutable engine state; the authoritative stage lives in `hexink-stage` and
//! adapters consume both.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of neighbors surrounding every hex cell.
pub const NEIGHBOR_COUNT: usize = 6;

/// Offsets applied to positions on even rows, direction 0 pointing east and
/// winding clockwise through the south side first.
const EVEN_ROW_NEIGHBORS: [(i32, i32); NEIGHBOR_COUNT] = [
    (1, 0),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
];

/// Offsets applied to positions on odd rows. Odd rows are shifted half a
/// cell to the east, so four of the six entries differ from the even table.
const ODD_ROW_NEIGHBORS: [(i32, i32); NEIGHBOR_COUNT] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, 0),
    (0, 1),
    (1, 1),
];

/// Location of a single hex cell expressed in odd-row offset coordinates.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct GridPosition {
    x: i32,
    y: i32,
}

impl GridPosition {
    /// Creates a new grid position from column and row indices.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Column index of the position.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row index of the position.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the neighboring position one step along `direction`.
    ///
    /// Directions are reduced with a Euclidean remainder, so callers may pass
    /// unnormalized values such as `-1` or `7` and still land on one of the
    /// six canonical directions. The offset table depends on the parity of
    /// the row because odd rows are staggered half a cell.
    #[must_use]
    pub fn neighbor(self, direction: i32) -> Self {
        let table = if self.y & 1 == 0 {
            &EVEN_ROW_NEIGHBORS
        } else {
            &ODD_ROW_NEIGHBORS
        };
        let index = direction.rem_euclid(NEIGHBOR_COUNT as i32) as usize;
        let (dx, dy) = table[index];
        Self::new(self.x + dx, self.y + dy)
    }

    /// Returns a lazy iterator over the six neighbors of this position in
    /// fixed direction order. The iterator is `Clone`, so callers can restart
    /// the walk without recomputing anything, and it never allocates.
    #[must_use]
    pub const fn neighbors(self) -> Neighbors {
        Neighbors {
            position: self,
            direction: 0,
        }
    }
}

/// Iterator over the six neighbors of a hex position.
#[derive(Clone, Copy, Debug)]
pub struct Neighbors {
    position: GridPosition,
    direction: usize,
}

impl Iterator for Neighbors {
    type Item = GridPosition;

    fn next(&mut self) -> Option<GridPosition> {
        if self.direction >= NEIGHBOR_COUNT {
            return None;
        }
        let neighbor = self.position.neighbor(self.direction as i32);
        self.direction += 1;
        Some(neighbor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = NEIGHBOR_COUNT.saturating_sub(self.direction);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Neighbors {}

/// Point in world space produced by the grid-to-world transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct WorldPoint {
    x: f32,
    y: f32,
}

impl WorldPoint {
    /// Creates a new world point from explicit coordinates.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Horizontal world coordinate.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical world coordinate.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }
}

/// Semantic role of a layer within a stage.
///
/// The declaration order is total and fixed; it is the priority in which
/// layers are sampled within a wave. Condition cells must observe the ink
/// layer's state from before the current wave, so ink samples last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerKind {
    /// Mechanics that act on other layers, such as origins and swaps.
    Special,
    /// Pickups that trigger when ink reaches them.
    Collectible,
    /// Win and fail conditions evaluated against the ink layer.
    Condition,
    /// The spreading ink itself.
    Ink,
}

/// Order in which layers are sampled within a single wave.
pub const EXECUTION_ORDER: [LayerKind; 4] = [
    LayerKind::Special,
    LayerKind::Collectible,
    LayerKind::Condition,
    LayerKind::Ink,
];

/// Stable identity shared by a cell prototype and every visual instantiated
/// from it. Two handles are considered the same kind of cell when their ids
/// match, independent of which live instance backs them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(u32);

impl CellId {
    /// Creates a new cell identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Set of cell identities accepted by a matching rule, such as the ink kinds
/// a condition cell recognizes as its completion color.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRegistry {
    ids: Vec<CellId>,
}

impl CellRegistry {
    /// Creates a registry accepting the provided identifiers.
    #[must_use]
    pub fn new(ids: Vec<CellId>) -> Self {
        Self { ids }
    }

    /// Reports whether the registry accepts the provided identifier.
    #[must_use]
    pub fn contains(&self, id: CellId) -> bool {
        self.ids.contains(&id)
    }

    /// Iterator over the accepted identifiers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = CellId> + '_ {
        self.ids.iter().copied()
    }
}

/// Mutations a cell may request from the stage while it is being sampled.
///
/// Behaviors never touch layers directly; they emit commands and the stage
/// applies them immediately after the cell's sample logic runs. Positions
/// marked dirty here always land in the next wave, never the one in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellCommand {
    /// Requests a new cell instantiated from `prototype` at `position`.
    AddCell {
        /// Layer that should receive the cell.
        layer: LayerKind,
        /// Position the cell will occupy.
        position: GridPosition,
        /// Prototype identity to instantiate from the pool.
        prototype: CellId,
    },
    /// Requests removal of the cell at `position`.
    RemoveCell {
        /// Layer that currently tracks the cell.
        layer: LayerKind,
        /// Position to vacate.
        position: GridPosition,
    },
    /// Schedules `position` for the next sample wave.
    MarkDirty {
        /// Position to revisit.
        position: GridPosition,
    },
    /// Records a completed task outcome for the layer at `position`.
    CompleteTask {
        /// Layer the outcome is attributed to.
        layer: LayerKind,
        /// Position of the cell reporting the outcome.
        position: GridPosition,
    },
    /// Records a failed task outcome for the layer at `position`.
    FailTask {
        /// Layer the outcome is attributed to.
        layer: LayerKind,
        /// Position of the cell reporting the outcome.
        position: GridPosition,
    },
}

/// Reasons adding a cell to a layer may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum AddCellError {
    /// The stage has no layer of the requested kind.
    #[error("no layer of kind {0:?}")]
    MissingLayer(LayerKind),
    /// The pool catalog has no prototype with the requested identity.
    #[error("unknown cell prototype {}", .0.get())]
    UnknownPrototype(CellId),
    /// The layer has no ground tile at the position.
    #[error("position ({}, {}) has no ground", .0.x(), .0.y())]
    NoGround(GridPosition),
    /// Another cell already occupies the position.
    #[error("position ({}, {}) is already occupied", .0.x(), .0.y())]
    Occupied(GridPosition),
}

/// Reasons removing a cell from a layer may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum RemoveCellError {
    /// The stage has no layer of the requested kind.
    #[error("no layer of kind {0:?}")]
    MissingLayer(LayerKind),
    /// No cell occupies the position.
    #[error("position ({}, {}) is vacant", .0.x(), .0.y())]
    Vacant(GridPosition),
}

/// Reasons recording a layer outcome into a [`StageResult`] may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum ResultError {
    /// An outcome for the layer kind was already recorded.
    #[error("result for layer {0:?} already exists")]
    DuplicateLayer(LayerKind),
}

/// Progress and target counts recorded for a single layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct LayerOutcome {
    progress: usize,
    target: usize,
}

/// Immutable summary of a finished run, aggregating per-layer progress and
/// target counts in the order the stage's layers were configured.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    outcomes: HashMap<LayerKind, LayerOutcome>,
}

impl StageResult {
    /// Creates an empty result with no recorded layers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every recorded outcome.
    pub fn clear(&mut self) {
        self.outcomes.clear();
    }

    /// Records the outcome for a layer. Each layer kind may be recorded at
    /// most once; a second insert is rejected and leaves the existing entry
    /// in place.
    pub fn insert(
        &mut self,
        layer: LayerKind,
        progress: usize,
        target: usize,
    ) -> Result<(), ResultError> {
        if self.outcomes.contains_key(&layer) {
            return Err(ResultError::DuplicateLayer(layer));
        }
        let _ = self.outcomes.insert(layer, LayerOutcome { progress, target });
        Ok(())
    }

    /// Reports whether an outcome was recorded for the layer kind.
    #[must_use]
    pub fn contains(&self, layer: LayerKind) -> bool {
        self.outcomes.contains_key(&layer)
    }

    /// Progress recorded for the layer kind, zero when absent.
    #[must_use]
    pub fn progress(&self, layer: LayerKind) -> usize {
        self.outcomes
            .get(&layer)
            .map_or(0, |outcome| outcome.progress)
    }

    /// Target recorded for the layer kind, zero when absent.
    #[must_use]
    pub fn target(&self, layer: LayerKind) -> usize {
        self.outcomes.get(&layer).map_or(0, |outcome| outcome.target)
    }

    /// Iterator over recorded layer kinds with their progress and target
    /// counts, in sample priority order.
    pub fn iter(&self) -> impl Iterator<Item = (LayerKind, usize, usize)> + '_ {
        EXECUTION_ORDER.iter().filter_map(|kind| {
            self.outcomes
                .get(kind)
                .map(|outcome| (*kind, outcome.progress, outcome.target))
        })
    }
}
