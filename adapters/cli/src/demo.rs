//! Demo level construction and terminal rendering.

use std::time::Duration;

use hexink_core::{CellId, CellRegistry, GridPosition, LayerKind};
use hexink_stage::{
    query, AnimationProfile, CellBehavior, CellCatalog, CellPool, CellPrototype, GroundMap,
    HexLayout, Layer, Stage, StageConfig,
};

/// Plain ink that floods the board.
pub(crate) const INK: CellId = CellId::new(1);
/// Origin emitter seeding the flood from the board center.
pub(crate) const ORIGIN: CellId = CellId::new(2);
/// Goal that accepts the demo ink.
pub(crate) const GOAL: CellId = CellId::new(3);
/// Pickup collected when ink reaches it.
pub(crate) const PICKUP: CellId = CellId::new(4);

/// Rectangular demo board driven by a single origin cell.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DemoBoard {
    pub(crate) columns: i32,
    pub(crate) rows: i32,
    pub(crate) sample_rate: Duration,
    pub(crate) animation: Duration,
}

impl DemoBoard {
    fn tiles(&self) -> Vec<GridPosition> {
        let mut tiles = Vec::new();
        for y in 0..self.rows {
            for x in 0..self.columns {
                tiles.push(GridPosition::new(x, y));
            }
        }
        tiles
    }

    fn center(&self) -> GridPosition {
        GridPosition::new(self.columns / 2, self.rows / 2)
    }

    fn goal_position(&self) -> GridPosition {
        GridPosition::new(self.columns - 1, self.rows - 1)
    }

    fn pickup_position(&self) -> GridPosition {
        GridPosition::new(self.columns - 1, 0)
    }
}

/// Builds the demo stage: an origin at the center of a rectangular board, a
/// goal in one corner, and a pickup in another.
pub(crate) fn build_stage(board: &DemoBoard) -> Stage {
    let profile = AnimationProfile::uniform(board.animation);

    let mut catalog = CellCatalog::new();
    let _ = catalog.register(CellPrototype::new(
        INK,
        CellBehavior::Ink { spawn: INK },
        profile,
    ));
    let _ = catalog.register(CellPrototype::new(
        ORIGIN,
        CellBehavior::Origin { spawn: INK },
        profile,
    ));
    let _ = catalog.register(CellPrototype::new(
        GOAL,
        CellBehavior::Target {
            accepted: CellRegistry::new(vec![INK]),
        },
        profile,
    ));
    let _ = catalog.register(CellPrototype::new(
        PICKUP,
        CellBehavior::Collect,
        profile,
    ));

    let tiles = board.tiles();
    let ground = || GroundMap::new(HexLayout::default(), tiles.iter().copied());

    let layers = vec![
        Layer::new(LayerKind::Special, ground(), vec![(board.center(), ORIGIN)]),
        Layer::new(
            LayerKind::Collectible,
            ground(),
            vec![(board.pickup_position(), PICKUP)],
        ),
        Layer::new(
            LayerKind::Condition,
            ground(),
            vec![(board.goal_position(), GOAL)],
        ),
        Layer::new(LayerKind::Ink, ground(), Vec::new()),
    ];

    Stage::new(
        StageConfig::new(board.sample_rate),
        layers,
        CellPool::new(catalog),
    )
}

/// Renders the board occupancy as one character per cell, with odd rows
/// indented to suggest the hex stagger.
pub(crate) fn render(stage: &Stage, board: &DemoBoard) -> String {
    let mut out = String::new();
    for y in 0..board.rows {
        if y & 1 == 1 {
            out.push(' ');
        }
        for x in 0..board.columns {
            let position = GridPosition::new(x, y);
            let glyph = if query::contains_cell(stage, LayerKind::Special, position) {
                'O'
            } else if query::contains_cell(stage, LayerKind::Collectible, position) {
                'C'
            } else if query::contains_cell(stage, LayerKind::Condition, position) {
                'T'
            } else if query::contains_cell(stage, LayerKind::Ink, position) {
                '#'
            } else {
                '.'
            };
            out.push(glyph);
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use hexink_core::{LayerKind, StageResult};
    use hexink_stage::query;

    use super::{build_stage, render, DemoBoard};

    fn headless_board() -> DemoBoard {
        DemoBoard {
            columns: 5,
            rows: 4,
            sample_rate: Duration::ZERO,
            animation: Duration::ZERO,
        }
    }

    #[test]
    fn demo_floods_the_whole_board() {
        let board = headless_board();
        let mut stage = build_stage(&board);
        stage.setup();

        let results: Rc<RefCell<Vec<StageResult>>> = Rc::default();
        let sink = Rc::clone(&results);
        stage.execute(move |result| sink.borrow_mut().push(result));

        let results = results.borrow();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(
            result.target(LayerKind::Ink),
            (board.columns * board.rows) as usize
        );
        assert_eq!(result.progress(LayerKind::Condition), 1);
        assert_eq!(result.progress(LayerKind::Collectible), 1);
    }

    #[test]
    fn render_marks_the_origin_and_ground() {
        let board = headless_board();
        let mut stage = build_stage(&board);
        stage.setup();

        let drawn = render(&stage, &board);
        assert_eq!(drawn.matches('O').count(), 1);
        assert_eq!(drawn.matches('T').count(), 1);
        assert_eq!(drawn.matches('C').count(), 1);
        assert!(drawn.contains('.'));
        assert!(!query::is_running(&stage));
    }
}
