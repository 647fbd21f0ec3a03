use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::formula::eval::CellLookup;
use crate::geom::{Point, Rect, Size};
use crate::value::Scalar;

/// Sparse cell storage plus the tracked sheet extent.
///
/// The extent is the smallest rectangle that has held every touched cell:
/// it grows whenever a cell is written at or beyond the current edge and
/// shrinks only when structural deletes remove outer rows or columns.
/// Clearing a cell's content never shrinks it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grid {
    cells: FxHashMap<Point, Cell>,
    extent: Size,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> Size {
        self.extent
    }

    /// Number of occupied cells, spill members included.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, p: Point) -> Option<&Cell> {
        self.cells.get(&p)
    }

    pub fn get_mut(&mut self, p: Point) -> Option<&mut Cell> {
        self.cells.get_mut(&p)
    }

    /// Store a cell, growing the extent to cover it.
    pub fn insert(&mut self, p: Point, cell: Cell) {
        debug_assert!(p.is_valid());
        self.cells.insert(p, cell);
        self.expand_to_include(p);
    }

    /// Remove a cell's content. The extent is unchanged.
    pub fn remove(&mut self, p: Point) -> Option<Cell> {
        self.cells.remove(&p)
    }

    /// Grow the extent so that `p` lies inside it.
    pub fn expand_to_include(&mut self, p: Point) {
        self.extent.width = self.extent.width.max(p.x + 1);
        self.extent.height = self.extent.height.max(p.y + 1);
    }

    /// Force the extent. Used by structural deletes, the one place the
    /// sheet is allowed to get smaller.
    pub(crate) fn set_size(&mut self, size: Size) {
        self.extent = size;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Point, &Cell)> {
        self.cells.iter().map(|(p, c)| (*p, c))
    }

    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.cells.keys().copied()
    }

    /// Occupied points inside `rect`, unordered.
    pub fn points_in(&self, rect: Rect) -> Vec<Point> {
        self.cells
            .keys()
            .copied()
            .filter(|p| rect.contains(*p))
            .collect()
    }

    /// Drain every stored cell, resetting the extent.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.extent = Size::default();
    }

    /// Remove and return all cells for which `pred` holds. Extent is left
    /// to the caller.
    pub(crate) fn extract_if(&mut self, mut pred: impl FnMut(Point) -> bool) -> Vec<(Point, Cell)> {
        let taken: Vec<Point> = self.cells.keys().copied().filter(|p| pred(*p)).collect();
        taken
            .into_iter()
            .filter_map(|p| self.cells.remove(&p).map(|c| (p, c)))
            .collect()
    }
}

impl CellLookup for Grid {
    fn value_at(&self, p: Point) -> Scalar {
        self.get(p).map(Cell::local_value).unwrap_or_default()
    }

    fn occupied_in(&self, rect: Rect) -> Vec<(Point, Scalar)> {
        self.cells
            .iter()
            .filter(|(p, _)| rect.contains(**p))
            .map(|(p, c)| (*p, c.local_value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_grows_on_insert() {
        let mut g = Grid::new();
        assert_eq!(g.size(), Size::new(0, 0));
        g.insert(Point::new(2, 5), Cell::Value(Scalar::Number(1.0)));
        assert_eq!(g.size(), Size::new(3, 6));
        g.insert(Point::new(0, 0), Cell::Value(Scalar::Number(2.0)));
        assert_eq!(g.size(), Size::new(3, 6));
    }

    #[test]
    fn remove_keeps_extent() {
        let mut g = Grid::new();
        g.insert(Point::new(4, 4), Cell::Value(Scalar::Number(1.0)));
        g.remove(Point::new(4, 4));
        assert_eq!(g.size(), Size::new(5, 5));
        assert_eq!(g.cell_count(), 0);
    }

    #[test]
    fn points_in_filters_by_rect() {
        let mut g = Grid::new();
        g.insert(Point::new(0, 0), Cell::Value(Scalar::Number(1.0)));
        g.insert(Point::new(1, 1), Cell::Value(Scalar::Number(2.0)));
        g.insert(Point::new(9, 9), Cell::Value(Scalar::Number(3.0)));
        let mut inside = g.points_in(Rect::new(Point::new(0, 0), Size::new(2, 2)));
        inside.sort();
        assert_eq!(inside, vec![Point::new(0, 0), Point::new(1, 1)]);
    }

    #[test]
    fn extract_if_removes_matching_cells() {
        let mut g = Grid::new();
        g.insert(Point::new(0, 0), Cell::Value(Scalar::Number(1.0)));
        g.insert(Point::new(0, 5), Cell::Value(Scalar::Number(2.0)));
        let taken = g.extract_if(|p| p.y >= 3);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].0, Point::new(0, 5));
        assert_eq!(g.cell_count(), 1);
    }
}
