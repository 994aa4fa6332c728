//! Per-kind cell logic expressed as pure command emission.
//!
//! Behaviors never mutate the stage directly. Sampling a cell evaluates its
//! behavior against read-only stage queries and yields the commands the stage
//! should apply, plus whether the cell plays a sample animation. The stage
//! applies the commands immediately after each cell's evaluation, so cells
//! later in the same pass observe the side effects of earlier ones.

use hexink_core::{CellCommand, CellId, CellRegistry, GridPosition, LayerKind};

use crate::{query, Stage};

/// Gameplay role attached to a cell visual.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellBehavior {
    /// Ink that floods adjacent ground with more of the `spawn` kind.
    Ink {
        /// Prototype instantiated on each claimed neighbor.
        spawn: CellId,
    },
    /// Emitter on the special layer that seeds ink around itself.
    Origin {
        /// Prototype instantiated on each claimed neighbor.
        spawn: CellId,
    },
    /// Replaces the ink underneath it with a different ink kind.
    Swap {
        /// Prototype that takes the replaced cell's position.
        replacement: CellId,
    },
    /// Pickup that triggers once ink reaches its position.
    Collect,
    /// Terminal goal that matches the arriving ink against accepted kinds.
    Target {
        /// Ink identities that count as a completed outcome.
        accepted: CellRegistry,
    },
}

/// Everything sampling one cell asked of the stage.
#[derive(Debug, Default)]
pub(crate) struct SampleOutcome {
    /// Mutations to apply, in emission order.
    pub(crate) commands: Vec<CellCommand>,
    /// Whether the cell plays its sample animation for this wave.
    pub(crate) animates: bool,
}

/// Evaluates `behavior` for the cell at `position` on `layer`.
pub(crate) fn sample(
    behavior: &CellBehavior,
    layer: LayerKind,
    position: GridPosition,
    stage: &Stage,
) -> SampleOutcome {
    match behavior {
        CellBehavior::Ink { spawn } | CellBehavior::Origin { spawn } => spread(*spawn, position, stage),
        CellBehavior::Swap { replacement } => swap(*replacement, position, stage),
        CellBehavior::Collect => collect(layer, position, stage),
        CellBehavior::Target { accepted } => judge(accepted, layer, position, stage),
    }
}

/// Claims every adjacent ink-layer ground position that is still vacant and
/// schedules the claimed positions for the next wave.
fn spread(spawn: CellId, position: GridPosition, stage: &Stage) -> SampleOutcome {
    let mut commands = Vec::new();
    for neighbor in position.neighbors() {
        if !query::contains_ground(stage, LayerKind::Ink, neighbor) {
            continue;
        }
        if query::contains_cell(stage, LayerKind::Ink, neighbor) {
            continue;
        }
        commands.push(CellCommand::AddCell {
            layer: LayerKind::Ink,
            position: neighbor,
            prototype: spawn,
        });
        commands.push(CellCommand::MarkDirty { position: neighbor });
    }
    let animates = !commands.is_empty();
    SampleOutcome { commands, animates }
}

fn swap(replacement: CellId, position: GridPosition, stage: &Stage) -> SampleOutcome {
    if !query::contains_cell(stage, LayerKind::Ink, position) {
        return SampleOutcome::default();
    }
    SampleOutcome {
        commands: vec![
            CellCommand::RemoveCell {
                layer: LayerKind::Ink,
                position,
            },
            CellCommand::AddCell {
                layer: LayerKind::Ink,
                position,
                prototype: replacement,
            },
        ],
        animates: true,
    }
}

fn collect(layer: LayerKind, position: GridPosition, stage: &Stage) -> SampleOutcome {
    if !query::contains_cell(stage, LayerKind::Ink, position) {
        return SampleOutcome::default();
    }
    SampleOutcome {
        commands: vec![CellCommand::CompleteTask { layer, position }],
        animates: true,
    }
}

/// Records a terminal outcome for the wave: complete when the arriving ink is
/// an accepted kind, fail otherwise. No ink means nothing to judge yet.
fn judge(
    accepted: &CellRegistry,
    layer: LayerKind,
    position: GridPosition,
    stage: &Stage,
) -> SampleOutcome {
    let Some(id) = query::cell_id(stage, LayerKind::Ink, position) else {
        return SampleOutcome::default();
    };
    let command = if accepted.contains(id) {
        CellCommand::CompleteTask { layer, position }
    } else {
        CellCommand::FailTask { layer, position }
    };
    SampleOutcome {
        commands: vec![command],
        animates: true,
    }
}
