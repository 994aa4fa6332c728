//! Ground lookup and the grid-to-world coordinate boundary.

use std::collections::HashSet;

use hexink_core::{GridPosition, WorldPoint};

/// Metrics of the odd-row offset, pointy-top hex layout.
///
/// Rows overlap vertically by a quarter cell, and odd rows are staggered half
/// a cell to the east. The same parity convention drives the neighbor tables
/// in `hexink-core`, so the two stay geometrically consistent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HexLayout {
    cell_width: f32,
    cell_height: f32,
}

impl HexLayout {
    /// Creates a layout with explicit cell metrics in world units.
    #[must_use]
    pub const fn new(cell_width: f32, cell_height: f32) -> Self {
        Self {
            cell_width,
            cell_height,
        }
    }

    /// Width of a single cell in world units.
    #[must_use]
    pub const fn cell_width(&self) -> f32 {
        self.cell_width
    }

    /// Height of a single cell in world units.
    #[must_use]
    pub const fn cell_height(&self) -> f32 {
        self.cell_height
    }

    fn row_shift(row: i32) -> f32 {
        if row & 1 == 0 {
            0.0
        } else {
            0.5
        }
    }

    /// Center of the cell at `position` in world space.
    #[must_use]
    pub fn world_position(&self, position: GridPosition) -> WorldPoint {
        let x = (position.x() as f32 + Self::row_shift(position.y())) * self.cell_width;
        let y = position.y() as f32 * self.cell_height * 0.75;
        WorldPoint::new(x, y)
    }

    /// Cell whose center is closest to `point`.
    ///
    /// Inverse of [`HexLayout::world_position`]; the two round-trip exactly
    /// for every cell center.
    #[must_use]
    pub fn grid_position(&self, point: WorldPoint) -> GridPosition {
        let row = (point.y() / (self.cell_height * 0.75)).round() as i32;
        let column = (point.x() / self.cell_width - Self::row_shift(row)).round() as i32;
        GridPosition::new(column, row)
    }
}

impl Default for HexLayout {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Paintable positions of one layer plus the transform into world space.
///
/// The ground map answers which positions may ever hold a cell; spreading
/// mechanics consult it before creating anything. It is built once per level
/// and never mutated by the wave loop.
#[derive(Clone, Debug, Default)]
pub struct GroundMap {
    layout: HexLayout,
    tiles: HashSet<GridPosition>,
}

impl GroundMap {
    /// Creates a ground map from a layout and the set of paintable positions.
    #[must_use]
    pub fn new(layout: HexLayout, tiles: impl IntoIterator<Item = GridPosition>) -> Self {
        Self {
            layout,
            tiles: tiles.into_iter().collect(),
        }
    }

    /// Reports whether `position` is paintable ground.
    #[must_use]
    pub fn contains(&self, position: GridPosition) -> bool {
        self.tiles.contains(&position)
    }

    /// Number of paintable positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Reports whether the map has no paintable positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Iterator over every paintable position, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = GridPosition> + '_ {
        self.tiles.iter().copied()
    }

    /// Center of the cell at `position` in world space.
    #[must_use]
    pub fn world_position(&self, position: GridPosition) -> WorldPoint {
        self.layout.world_position(position)
    }

    /// Cell whose center is closest to `point`.
    #[must_use]
    pub fn grid_position(&self, point: WorldPoint) -> GridPosition {
        self.layout.grid_position(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_and_grid_positions_round_trip() {
        let layout = HexLayout::new(2.0, 3.0);
        for y in -4..=4 {
            for x in -4..=4 {
                let position = GridPosition::new(x, y);
                let world = layout.world_position(position);
                assert_eq!(layout.grid_position(world), position);
            }
        }
    }

    #[test]
    fn odd_rows_are_staggered_east() {
        let layout = HexLayout::new(1.0, 1.0);
        let even = layout.world_position(GridPosition::new(0, 0));
        let odd = layout.world_position(GridPosition::new(0, 1));
        assert!(odd.x() > even.x());
    }

    #[test]
    fn ground_map_reports_membership() {
        let map = GroundMap::new(
            HexLayout::default(),
            [GridPosition::new(0, 0), GridPosition::new(1, 0)],
        );
        assert!(map.contains(GridPosition::new(1, 0)));
        assert!(!map.contains(GridPosition::new(2, 0)));
        assert_eq!(map.len(), 2);
    }
}
