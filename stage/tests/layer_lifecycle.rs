use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use hexink_core::{CellId, CellRegistry, GridPosition, LayerKind, StageResult};
use hexink_stage::{
    query, AnimationProfile, CellBehavior, CellCatalog, CellPool, CellPrototype, GroundMap,
    HexLayout, Layer, Stage, StageConfig,
};

const INK: CellId = CellId::new(1);
const GOLD: CellId = CellId::new(2);
const GOAL: CellId = CellId::new(3);
const PICKUP: CellId = CellId::new(4);
const SWAP: CellId = CellId::new(5);

const HIDE_ANIMATION: Duration = Duration::from_millis(40);

fn catalog(profile: AnimationProfile) -> CellCatalog {
    let mut catalog = CellCatalog::new();
    assert!(catalog.register(CellPrototype::new(
        INK,
        CellBehavior::Ink { spawn: INK },
        profile,
    )));
    assert!(catalog.register(CellPrototype::new(
        GOLD,
        CellBehavior::Ink { spawn: GOLD },
        profile,
    )));
    assert!(catalog.register(CellPrototype::new(
        GOAL,
        CellBehavior::Target {
            accepted: CellRegistry::new(vec![GOLD]),
        },
        profile,
    )));
    assert!(catalog.register(CellPrototype::new(
        PICKUP,
        CellBehavior::Collect,
        profile,
    )));
    assert!(catalog.register(CellPrototype::new(
        SWAP,
        CellBehavior::Swap { replacement: GOLD },
        profile,
    )));
    catalog
}

fn ground(positions: &[GridPosition]) -> GroundMap {
    GroundMap::new(HexLayout::default(), positions.iter().copied())
}

fn execute_to_completion(stage: &mut Stage) -> StageResult {
    let results: Rc<RefCell<Vec<StageResult>>> = Rc::default();
    let sink = Rc::clone(&results);
    stage.execute(move |result| sink.borrow_mut().push(result));
    assert!(!query::is_running(stage), "runs here resolve synchronously");
    let mut results = results.borrow_mut();
    assert_eq!(results.len(), 1, "completion must fire exactly once");
    results.remove(0)
}

#[test]
fn removed_positions_report_vacant_before_the_handle_is_released() {
    let position = GridPosition::new(0, 0);
    let profile = AnimationProfile::new(
        Duration::ZERO,
        HIDE_ANIMATION,
        Duration::ZERO,
        Duration::ZERO,
    );
    let layer = Layer::new(LayerKind::Ink, ground(&[position]), vec![(position, INK)]);
    let mut stage = Stage::new(
        StageConfig::default(),
        vec![layer],
        CellPool::new(catalog(profile)),
    );
    stage.setup();

    assert!(stage.remove_cell(LayerKind::Ink, position).is_ok());

    // Same synchronous turn: the map no longer tracks the cell even though
    // the hide animation still owns the handle.
    assert!(!query::contains_cell(&stage, LayerKind::Ink, position));
    assert_eq!(query::parked_visuals(&stage, INK), 0);

    stage.tick(HIDE_ANIMATION);
    assert_eq!(query::parked_visuals(&stage, INK), 1);

    // The parked visual backs the next add at the same position.
    assert!(stage.add_cell(LayerKind::Ink, position, INK).is_ok());
    assert_eq!(query::parked_visuals(&stage, INK), 0);
}

#[test]
fn restore_keeps_defaults_and_player_cells_and_drops_transients() {
    let a = GridPosition::new(0, 0);
    let b = GridPosition::new(2, 0);
    let c = GridPosition::new(4, 0);
    let layer = Layer::new(LayerKind::Ink, ground(&[a, b, c]), vec![(a, INK)]);
    let mut stage = Stage::new(
        StageConfig::default(),
        vec![layer],
        CellPool::new(catalog(AnimationProfile::instant())),
    );
    stage.setup();

    assert!(stage.add_player_cell(LayerKind::Ink, b, INK).is_ok());
    assert!(stage.add_cell(LayerKind::Ink, c, INK).is_ok());
    assert_eq!(query::layer_len(&stage, LayerKind::Ink), 3);

    stage.restore();
    assert_eq!(query::occupied_positions(&stage, LayerKind::Ink), vec![a, b]);

    // Idempotent: a second restore observes the same occupancy.
    stage.restore();
    assert_eq!(query::occupied_positions(&stage, LayerKind::Ink), vec![a, b]);
    assert_eq!(
        query::dirty_positions(&stage),
        vec![a, b],
        "restore reseeds the dirty set from surviving occupancy"
    );
}

#[test]
fn swap_replaces_the_ink_in_the_same_turn() {
    let position = GridPosition::new(0, 0);
    let ink_layer = Layer::new(LayerKind::Ink, ground(&[position]), vec![(position, INK)]);
    let special_layer = Layer::new(
        LayerKind::Special,
        ground(&[position]),
        vec![(position, SWAP)],
    );
    let mut stage = Stage::new(
        StageConfig::new(Duration::ZERO),
        vec![special_layer, ink_layer],
        CellPool::new(catalog(AnimationProfile::instant())),
    );
    stage.setup();

    let result = execute_to_completion(&mut stage);

    assert_eq!(
        query::cell_id(&stage, LayerKind::Ink, position),
        Some(GOLD),
        "the replacement claims the position vacated in the same turn"
    );
    assert_eq!(
        query::parked_visuals(&stage, INK),
        1,
        "the swapped-out visual returned to the pool"
    );
    assert_eq!(result.target(LayerKind::Ink), 1);
    assert_eq!(result.target(LayerKind::Special), 1);
}

#[test]
fn collect_cells_report_progress_once_ink_arrives() {
    let position = GridPosition::new(0, 0);
    let ink_layer = Layer::new(LayerKind::Ink, ground(&[position]), vec![(position, INK)]);
    let pickup_layer = Layer::new(
        LayerKind::Collectible,
        ground(&[position]),
        vec![(position, PICKUP)],
    );
    let mut stage = Stage::new(
        StageConfig::new(Duration::ZERO),
        vec![pickup_layer, ink_layer],
        CellPool::new(catalog(AnimationProfile::instant())),
    );
    stage.setup();

    let result = execute_to_completion(&mut stage);

    assert_eq!(result.progress(LayerKind::Collectible), 1);
    assert_eq!(result.target(LayerKind::Collectible), 1);
    assert_eq!(query::failed_tasks(&stage, LayerKind::Collectible), 0);
}

#[test]
fn target_cells_fail_on_unaccepted_ink() {
    let position = GridPosition::new(0, 0);
    // The goal accepts gold ink but plain ink arrives.
    let ink_layer = Layer::new(LayerKind::Ink, ground(&[position]), vec![(position, INK)]);
    let condition_layer = Layer::new(
        LayerKind::Condition,
        ground(&[position]),
        vec![(position, GOAL)],
    );
    let mut stage = Stage::new(
        StageConfig::new(Duration::ZERO),
        vec![condition_layer, ink_layer],
        CellPool::new(catalog(AnimationProfile::instant())),
    );
    stage.setup();

    let result = execute_to_completion(&mut stage);

    assert_eq!(result.progress(LayerKind::Condition), 0);
    assert_eq!(result.target(LayerKind::Condition), 1);
    assert_eq!(query::failed_tasks(&stage, LayerKind::Condition), 1);
    assert_eq!(query::completed_tasks(&stage, LayerKind::Condition), 0);
}

#[test]
fn clear_pool_drops_parked_visuals_at_teardown() {
    let position = GridPosition::new(0, 0);
    let layer = Layer::new(LayerKind::Ink, ground(&[position]), vec![(position, INK)]);
    let mut stage = Stage::new(
        StageConfig::default(),
        vec![layer],
        CellPool::new(catalog(AnimationProfile::instant())),
    );
    stage.setup();

    assert!(stage.remove_cell(LayerKind::Ink, position).is_ok());
    assert_eq!(query::parked_visuals(&stage, INK), 1);

    stage.clear_pool();
    assert_eq!(query::parked_visuals(&stage, INK), 0);
}
