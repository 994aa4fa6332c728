#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative stage state management for hexink.
//!
//! A stage owns an ordered set of layers, the dirty set of positions awaiting
//! the next sample wave, and the single-threaded machinery that drives a run:
//! a timer scheduler for deferred animation completions and an explicit wave
//! state machine advanced by [`Stage::tick`]. Each wave snapshots and clears
//! the dirty set, samples every layer in fixed priority order behind a strict
//! per-layer barrier, pauses for the configured sample rate, and loops until
//! no new positions were marked dirty. Cells marked dirty while a wave is in
//! flight always land in the next wave because the snapshot is taken before
//! any cell is sampled.

pub mod behavior;
pub mod ground;
pub mod layer;
pub mod pool;
mod scheduler;
pub mod visual;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use hexink_core::{
    AddCellError, CellCommand, CellId, GridPosition, LayerKind, RemoveCellError, StageResult,
    EXECUTION_ORDER,
};
use tracing::{debug, error, warn};

use crate::scheduler::{RunId, Scheduler, Signal};

pub use crate::behavior::CellBehavior;
pub use crate::ground::{GroundMap, HexLayout};
pub use crate::layer::Layer;
pub use crate::pool::{CellCatalog, CellPool, CellPrototype};
pub use crate::visual::{AnimationProfile, CellHandle, CellVisual, VisualState};

/// Tuning parameters for the wave loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageConfig {
    sample_rate: Duration,
}

impl StageConfig {
    /// Pause inserted between consecutive waves unless reconfigured.
    pub const DEFAULT_SAMPLE_RATE: Duration = Duration::from_millis(150);

    /// Creates a configuration with an explicit inter-wave pause. A zero
    /// pause makes the loop advance from wave to wave without waiting, which
    /// is useful for headless runs.
    #[must_use]
    pub const fn new(sample_rate: Duration) -> Self {
        Self { sample_rate }
    }

    /// Pause inserted between consecutive waves.
    #[must_use]
    pub const fn sample_rate(&self) -> Duration {
        self.sample_rate
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SAMPLE_RATE)
    }
}

type CompletionHandler = Box<dyn FnOnce(StageResult)>;

#[derive(Debug)]
enum RunPhase {
    Idle,
    Sampling {
        positions: Vec<GridPosition>,
        order_index: usize,
        pending: usize,
    },
    Paused {
        remaining: Duration,
    },
}

enum Step {
    Wait,
    SampleLayer(LayerKind, Vec<GridPosition>),
    WaveDone,
    PauseDone,
}

/// Orchestrator that advances layered cell state in discrete sample waves.
pub struct Stage {
    config: StageConfig,
    layers: Vec<Layer>,
    pool: CellPool,
    scheduler: Scheduler,
    dirty: BTreeSet<GridPosition>,
    phase: RunPhase,
    run: RunId,
    on_complete: Option<CompletionHandler>,
    completed: HashMap<LayerKind, BTreeSet<GridPosition>>,
    failed: HashMap<LayerKind, BTreeSet<GridPosition>>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("layer_count", &self.layers.len())
            .field("dirty_count", &self.dirty.len())
            .field("running", &!matches!(self.phase, RunPhase::Idle))
            .finish()
    }
}

impl Stage {
    /// Creates a stage from its layers, in execution-relevant declaration
    /// order, and the pool its cells are instantiated from.
    #[must_use]
    pub fn new(config: StageConfig, layers: Vec<Layer>, pool: CellPool) -> Self {
        Self {
            config,
            layers,
            pool,
            scheduler: Scheduler::new(),
            dirty: BTreeSet::new(),
            phase: RunPhase::Idle,
            run: RunId::first(),
            on_complete: None,
            completed: HashMap::new(),
            failed: HashMap::new(),
        }
    }

    /// Layer of the requested kind, if the stage has one.
    #[must_use]
    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.kind() == kind)
    }

    /// Iterator over the layers in their configured order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Rebuilds every layer's default occupancy and seeds the dirty set from
    /// every position that ended up occupied. Cancels any active run.
    pub fn setup(&mut self) {
        self.cancel_run();
        self.dirty.clear();
        self.completed.clear();
        self.failed.clear();
        for layer in &mut self.layers {
            layer.setup(&mut self.pool);
        }
        self.seed_dirty();
        debug!(positions = self.dirty.len(), "stage setup complete");
    }

    /// Starts the wave loop, cancelling any run already in flight first.
    ///
    /// The dirty set is consumed as-is; whatever setup or prior cell activity
    /// scheduled is what the first wave samples. When the loop drains the
    /// dirty set, `on_complete` receives the aggregated result exactly once.
    /// An execute on an empty dirty set performs zero waves and completes
    /// immediately. A cancelled run never signals.
    pub fn execute(&mut self, on_complete: impl FnOnce(StageResult) + 'static) {
        self.cancel_run();
        self.on_complete = Some(Box::new(on_complete));
        if self.dirty.is_empty() {
            debug!("execute with no dirty positions, completing immediately");
            self.finish_run();
            return;
        }
        self.snapshot_wave();
        self.advance_run();
    }

    /// Cancels any active run, resets every layer to its default and player
    /// cells, and reseeds the dirty set from the surviving occupancy. Safe to
    /// call at any time and idempotent.
    pub fn restore(&mut self) {
        self.cancel_run();
        self.dirty.clear();
        self.completed.clear();
        self.failed.clear();
        for layer in &mut self.layers {
            layer.restore(&mut self.scheduler, &mut self.pool);
        }
        self.seed_dirty();
        debug!(positions = self.dirty.len(), "stage restored");
    }

    /// Schedules `position` for the next wave. Idempotent.
    pub fn mark_dirty(&mut self, position: GridPosition) {
        let _ = self.dirty.insert(position);
    }

    /// Records a completed task outcome for `layer` at `position`.
    pub fn complete_task(&mut self, layer: LayerKind, position: GridPosition) {
        let _ = self.completed.entry(layer).or_default().insert(position);
    }

    /// Records a failed task outcome for `layer` at `position`.
    pub fn fail_task(&mut self, layer: LayerKind, position: GridPosition) {
        let _ = self.failed.entry(layer).or_default().insert(position);
    }

    /// Adds a cell instantiated from `prototype` at `position` on the layer
    /// of the requested kind.
    pub fn add_cell(
        &mut self,
        kind: LayerKind,
        position: GridPosition,
        prototype: CellId,
    ) -> Result<(), AddCellError> {
        let Some(layer) = self.layers.iter_mut().find(|layer| layer.kind() == kind) else {
            error!(?kind, "add cell failed, layer missing");
            return Err(AddCellError::MissingLayer(kind));
        };
        layer.add_cell(position, prototype, &mut self.pool)
    }

    /// Adds a cell like [`Stage::add_cell`] and marks it player-introduced,
    /// so restores keep it instead of tearing it down.
    pub fn add_player_cell(
        &mut self,
        kind: LayerKind,
        position: GridPosition,
        prototype: CellId,
    ) -> Result<(), AddCellError> {
        let Some(layer) = self.layers.iter_mut().find(|layer| layer.kind() == kind) else {
            error!(?kind, "add player cell failed, layer missing");
            return Err(AddCellError::MissingLayer(kind));
        };
        layer.add_cell(position, prototype, &mut self.pool)?;
        layer.mark_player(position);
        Ok(())
    }

    /// Removes the cell at `position` from the layer of the requested kind.
    pub fn remove_cell(
        &mut self,
        kind: LayerKind,
        position: GridPosition,
    ) -> Result<(), RemoveCellError> {
        let Some(layer) = self.layers.iter_mut().find(|layer| layer.kind() == kind) else {
            error!(?kind, "remove cell failed, layer missing");
            return Err(RemoveCellError::MissingLayer(kind));
        };
        layer.remove_cell(position, &mut self.scheduler, &mut self.pool)
    }

    /// Advances animation timers and the wave state machine by `dt`.
    ///
    /// This is the single suspension point of the engine: completions whose
    /// timers elapse are delivered in registration order, then the loop moves
    /// through any phases that became ready.
    pub fn tick(&mut self, dt: Duration) {
        for signal in self.scheduler.tick(dt) {
            match signal {
                Signal::Release { handle } => self.pool.release(handle),
                Signal::SampleFinished { run, layer } => {
                    if run != self.run {
                        debug!(?layer, "stale sample completion ignored");
                        continue;
                    }
                    if let RunPhase::Sampling { pending, .. } = &mut self.phase {
                        *pending = pending.saturating_sub(1);
                    }
                }
            }
        }
        if let RunPhase::Paused { remaining } = &mut self.phase {
            *remaining = remaining.saturating_sub(dt);
        }
        self.advance_run();
    }

    /// Drops every visual parked in the pool. Called at level-teardown
    /// boundaries.
    pub fn clear_pool(&mut self) {
        self.pool.clear();
    }

    fn seed_dirty(&mut self) {
        for layer in &self.layers {
            for position in layer.positions() {
                let _ = self.dirty.insert(position);
            }
        }
    }

    fn cancel_run(&mut self) {
        if !matches!(self.phase, RunPhase::Idle) {
            debug!("active run cancelled");
        }
        self.phase = RunPhase::Idle;
        self.on_complete = None;
        self.run = self.run.next();
    }

    fn snapshot_wave(&mut self) {
        let positions: Vec<GridPosition> = self.dirty.iter().copied().collect();
        self.dirty.clear();
        debug!(positions = positions.len(), "wave started");
        self.phase = RunPhase::Sampling {
            positions,
            order_index: 0,
            pending: 0,
        };
    }

    /// Moves the state machine through every phase that is ready without
    /// waiting. Stops at the first phase that needs a timer or a completion.
    fn advance_run(&mut self) {
        loop {
            let step = match &self.phase {
                RunPhase::Idle => Step::Wait,
                RunPhase::Paused { remaining } => {
                    if remaining.is_zero() {
                        Step::PauseDone
                    } else {
                        Step::Wait
                    }
                }
                RunPhase::Sampling {
                    positions,
                    order_index,
                    pending,
                } => {
                    if *pending > 0 {
                        Step::Wait
                    } else if *order_index < EXECUTION_ORDER.len() {
                        Step::SampleLayer(EXECUTION_ORDER[*order_index], positions.clone())
                    } else {
                        Step::WaveDone
                    }
                }
            };

            match step {
                Step::Wait => return,
                Step::SampleLayer(kind, positions) => {
                    if let RunPhase::Sampling { order_index, .. } = &mut self.phase {
                        *order_index += 1;
                    }
                    let pending = self.sample_layer(kind, &positions);
                    if let RunPhase::Sampling { pending: latch, .. } = &mut self.phase {
                        *latch = pending;
                    }
                }
                Step::WaveDone => {
                    let rate = self.config.sample_rate();
                    if rate.is_zero() {
                        if self.dirty.is_empty() {
                            self.finish_run();
                            return;
                        }
                        self.snapshot_wave();
                    } else {
                        self.phase = RunPhase::Paused { remaining: rate };
                        return;
                    }
                }
                Step::PauseDone => {
                    if self.dirty.is_empty() {
                        self.finish_run();
                        return;
                    }
                    self.snapshot_wave();
                }
            }
        }
    }

    /// Samples one layer's slice of the wave and returns how many cells are
    /// still animating. Positions without a live cell are already complete.
    fn sample_layer(&mut self, kind: LayerKind, positions: &[GridPosition]) -> usize {
        if self.layer(kind).is_none() {
            return 0;
        }
        let mut pending = 0;
        for &position in positions {
            let Some((behavior, delay)) = self.sample_target(kind, position) else {
                continue;
            };
            let outcome = behavior::sample(&behavior, kind, position, self);
            for command in outcome.commands {
                self.apply(command);
            }
            if outcome.animates {
                if let Some(delay) = delay {
                    self.scheduler.schedule(
                        delay,
                        Signal::SampleFinished {
                            run: self.run,
                            layer: kind,
                        },
                    );
                    pending += 1;
                }
            }
        }
        if pending > 0 {
            debug!(?kind, pending, "layer wave awaiting completions");
        }
        pending
    }

    fn sample_target(
        &self,
        kind: LayerKind,
        position: GridPosition,
    ) -> Option<(CellBehavior, Option<Duration>)> {
        let handle = self.layer(kind)?.cell(position)?;
        let visual = handle.visual();
        Some((visual.behavior().clone(), visual.sample_delay()))
    }

    fn apply(&mut self, command: CellCommand) {
        match command {
            CellCommand::AddCell {
                layer,
                position,
                prototype,
            } => {
                let _ = self.add_cell(layer, position, prototype);
            }
            CellCommand::RemoveCell { layer, position } => {
                let _ = self.remove_cell(layer, position);
            }
            CellCommand::MarkDirty { position } => self.mark_dirty(position),
            CellCommand::CompleteTask { layer, position } => self.complete_task(layer, position),
            CellCommand::FailTask { layer, position } => self.fail_task(layer, position),
        }
    }

    fn finish_run(&mut self) {
        self.phase = RunPhase::Idle;
        let mut result = StageResult::new();
        for layer in &self.layers {
            let progress = self.completed.get(&layer.kind()).map_or(0, BTreeSet::len);
            if let Err(err) = result.insert(layer.kind(), progress, layer.len()) {
                warn!(%err, "layer outcome skipped");
            }
        }
        debug!("run completed");
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(result);
        }
    }
}

/// Read-only access to the stage state.
pub mod query {
    use hexink_core::{CellId, GridPosition, LayerKind, WorldPoint};

    use super::{RunPhase, Stage};

    /// Reports whether a wave loop is currently active.
    #[must_use]
    pub fn is_running(stage: &Stage) -> bool {
        !matches!(stage.phase, RunPhase::Idle)
    }

    /// Reports whether the stage has a layer of the requested kind.
    #[must_use]
    pub fn contains_layer(stage: &Stage, kind: LayerKind) -> bool {
        stage.layer(kind).is_some()
    }

    /// Reports whether `position` is paintable ground on the layer.
    #[must_use]
    pub fn contains_ground(stage: &Stage, kind: LayerKind, position: GridPosition) -> bool {
        stage
            .layer(kind)
            .map_or(false, |layer| layer.contains_ground(position))
    }

    /// Reports whether a cell occupies `position` on the layer.
    #[must_use]
    pub fn contains_cell(stage: &Stage, kind: LayerKind, position: GridPosition) -> bool {
        stage
            .layer(kind)
            .map_or(false, |layer| layer.contains_cell(position))
    }

    /// Identity of the cell occupying `position` on the layer, if any.
    #[must_use]
    pub fn cell_id(stage: &Stage, kind: LayerKind, position: GridPosition) -> Option<CellId> {
        stage
            .layer(kind)?
            .cell(position)
            .map(super::CellHandle::id)
    }

    /// Number of cells currently tracked by the layer, zero when absent.
    #[must_use]
    pub fn layer_len(stage: &Stage, kind: LayerKind) -> usize {
        stage.layer(kind).map_or(0, super::Layer::len)
    }

    /// Positions scheduled for the next wave, in sorted order.
    #[must_use]
    pub fn dirty_positions(stage: &Stage) -> Vec<GridPosition> {
        stage.dirty.iter().copied().collect()
    }

    /// Occupied positions of the layer, in sorted order.
    #[must_use]
    pub fn occupied_positions(stage: &Stage, kind: LayerKind) -> Vec<GridPosition> {
        let mut positions: Vec<GridPosition> = stage
            .layer(kind)
            .map(|layer| layer.positions().collect())
            .unwrap_or_default();
        positions.sort();
        positions
    }

    /// Number of positions that reported a completed task for the layer.
    #[must_use]
    pub fn completed_tasks(stage: &Stage, kind: LayerKind) -> usize {
        stage.completed.get(&kind).map_or(0, |set| set.len())
    }

    /// Number of positions that reported a failed task for the layer.
    #[must_use]
    pub fn failed_tasks(stage: &Stage, kind: LayerKind) -> usize {
        stage.failed.get(&kind).map_or(0, |set| set.len())
    }

    /// World-space center of `position` on the layer's ground map.
    #[must_use]
    pub fn world_position(
        stage: &Stage,
        kind: LayerKind,
        position: GridPosition,
    ) -> Option<WorldPoint> {
        stage
            .layer(kind)
            .map(|layer| layer.ground().world_position(position))
    }

    /// Grid position whose center is closest to `point` on the layer.
    #[must_use]
    pub fn grid_position(stage: &Stage, kind: LayerKind, point: WorldPoint) -> Option<GridPosition> {
        stage.layer(kind).map(|layer| layer.ground().grid_position(point))
    }

    /// Number of visuals of the identity parked in the stage's pool.
    #[must_use]
    pub fn parked_visuals(stage: &Stage, id: CellId) -> usize {
        stage.pool.parked(id)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use hexink_core::{AddCellError, CellId, GridPosition, LayerKind, StageResult};

    use super::{query, Stage, StageConfig};
    use crate::behavior::CellBehavior;
    use crate::ground::{GroundMap, HexLayout};
    use crate::layer::Layer;
    use crate::pool::{CellCatalog, CellPool, CellPrototype};
    use crate::visual::AnimationProfile;

    const INK: CellId = CellId::new(1);

    fn ink_stage(positions: &[GridPosition]) -> Stage {
        let mut catalog = CellCatalog::new();
        assert!(catalog.register(CellPrototype::new(
            INK,
            CellBehavior::Ink { spawn: INK },
            AnimationProfile::instant(),
        )));
        let ground = GroundMap::new(HexLayout::default(), positions.iter().copied());
        let defaults = positions.iter().map(|&position| (position, INK)).collect();
        let layer = Layer::new(LayerKind::Ink, ground, defaults);
        Stage::new(StageConfig::default(), vec![layer], CellPool::new(catalog))
    }

    #[test]
    fn execute_with_empty_dirty_set_completes_immediately() {
        let mut stage = ink_stage(&[]);
        let result: Rc<RefCell<Vec<StageResult>>> = Rc::default();
        let sink = Rc::clone(&result);

        stage.execute(move |outcome| sink.borrow_mut().push(outcome));

        let results = result.borrow();
        assert_eq!(results.len(), 1, "completion must fire exactly once");
        assert_eq!(results[0].target(LayerKind::Ink), 0);
        assert!(!query::is_running(&stage));
    }

    #[test]
    fn mark_dirty_is_idempotent() {
        let mut stage = ink_stage(&[]);
        let position = GridPosition::new(2, 1);
        stage.mark_dirty(position);
        stage.mark_dirty(position);
        assert_eq!(query::dirty_positions(&stage), vec![position]);
    }

    #[test]
    fn add_cell_requires_a_layer_of_the_kind() {
        let mut stage = ink_stage(&[]);
        assert_eq!(
            stage.add_cell(LayerKind::Condition, GridPosition::new(0, 0), INK),
            Err(AddCellError::MissingLayer(LayerKind::Condition))
        );
    }

    #[test]
    fn setup_seeds_dirty_from_default_occupancy() {
        let positions = [
            GridPosition::new(0, 0),
            GridPosition::new(1, 0),
            GridPosition::new(0, 1),
        ];
        let mut stage = ink_stage(&positions);
        stage.setup();
        assert_eq!(query::dirty_positions(&stage).len(), positions.len());
        assert_eq!(query::layer_len(&stage, LayerKind::Ink), positions.len());
    }
}
