//! Structural edits: row/column insertion and deletion, block copy and
//! precedent-tracking move.
//!
//! Each operation validates fully before mutating, rewrites every stored
//! formula tree, shifts cell content and metadata, and rebuilds the
//! dependency graph from the rewritten trees.

use crate::cell::{Cell, Formula};
use crate::error::{EngineError, Result};
use crate::formula::parser::Expr;
use crate::formula::refs;
use crate::geom::{Axis, Point, Rect, Size};
use crate::metadata::MetadataStore;
use crate::sheet::{check_point, check_span, Sheet};

impl Sheet {
    // =========================================================================
    // Insert / delete
    // =========================================================================

    pub fn insert_rows(&mut self, start: u32, count: u32) -> Result<()> {
        self.insert_span(Axis::Rows, start, count)
    }

    pub fn insert_columns(&mut self, start: u32, count: u32) -> Result<()> {
        self.insert_span(Axis::Columns, start, count)
    }

    pub fn delete_rows(&mut self, start: u32, count: u32) -> Result<()> {
        self.delete_span(Axis::Rows, start, count)
    }

    pub fn delete_columns(&mut self, start: u32, count: u32) -> Result<()> {
        self.delete_span(Axis::Columns, start, count)
    }

    fn insert_span(&mut self, axis: Axis, start: u32, count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        check_span(axis, start, count)?;
        let limit = axis.limit();
        // every shifted cell must land on a valid index
        let overflow = self.grid.points().any(|p| {
            let c = coord(p, axis);
            c >= start && u64::from(c) + u64::from(count) >= u64::from(limit)
        });
        if overflow {
            return Err(EngineError::ExtentOverflow(axis));
        }

        self.drop_spill_markers();
        self.rewrite_formulas(|ast| refs::adjust_for_insert(ast, axis, start, count));

        let moved = self.grid.extract_if(|p| coord(p, axis) >= start);
        for (p, cell) in moved {
            self.grid.insert(with_coord(p, axis, coord(p, axis) + count), cell);
        }

        let cur = axis_len(self.grid.size(), axis);
        let grown = if start < cur {
            (u64::from(cur) + u64::from(count)).min(u64::from(limit)) as u32
        } else {
            start + count
        };
        self.set_axis_extent(axis, grown);

        self.meta_mut(axis).insert_indices(start, count);
        self.rebuild_deps();
        self.touch();
        Ok(())
    }

    fn delete_span(&mut self, axis: Axis, start: u32, count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let limit = axis.limit();
        if start >= limit {
            return Err(EngineError::SpanOutOfRange { axis, start, count });
        }
        let count = count.min(limit - start);
        let band_end = u64::from(start) + u64::from(count);

        self.drop_spill_markers();
        self.rewrite_formulas(|ast| refs::adjust_for_erase(ast, axis, start, count));

        let taken = self.grid.extract_if(|p| coord(p, axis) >= start);
        for (p, cell) in taken {
            let c = u64::from(coord(p, axis));
            if c >= band_end {
                self.grid.insert(with_coord(p, axis, (c - u64::from(count)) as u32), cell);
            }
        }

        let cur = axis_len(self.grid.size(), axis);
        let shrunk = if start >= cur {
            cur
        } else {
            cur - count.min(cur - start)
        };
        self.set_axis_extent(axis, shrunk);

        self.meta_mut(axis).erase_indices(start, count);
        self.rebuild_deps();
        self.touch();
        Ok(())
    }

    // =========================================================================
    // Copy
    // =========================================================================

    /// Replicate the cell at `src` into every cell of `dst`. Relative
    /// references shift by each destination's offset from the source;
    /// `$`-anchored axes stay put; references pushed off the sheet become
    /// `#REF!`.
    pub fn copy_cell(&mut self, src: Point, dst: Rect) -> Result<()> {
        check_point(src)?;
        if dst.size.is_empty() {
            return Ok(());
        }
        if !dst.fits_in_sheet() {
            return Err(EngineError::AreaOutOfRange(dst));
        }
        let source = self.grid.get(src).cloned();
        for d in dst.points() {
            if d != src {
                self.paste(source.as_ref(), src, d);
            }
        }
        self.rebuild_deps();
        self.touch();
        Ok(())
    }

    /// Block paste: `src` lands with its top-left at `dst`, shape
    /// preserved, with the same per-cell reference adjustment as
    /// [`Sheet::copy_cell`].
    pub fn copy_cells(&mut self, src: Rect, dst: Point) -> Result<()> {
        if src.size.is_empty() {
            return Ok(());
        }
        if !src.fits_in_sheet() {
            return Err(EngineError::AreaOutOfRange(src));
        }
        let dst_rect = Rect::new(dst, src.size);
        if !dst_rect.fits_in_sheet() {
            return Err(EngineError::AreaOutOfRange(dst_rect));
        }
        let dx = i64::from(dst.x) - i64::from(src.origin.x);
        let dy = i64::from(dst.y) - i64::from(src.origin.y);
        if dx == 0 && dy == 0 {
            return Ok(());
        }

        let snapshot: Vec<(Point, Cell)> = self
            .grid
            .points_in(src)
            .into_iter()
            .filter_map(|p| self.grid.get(p).cloned().map(|c| (p, c)))
            .collect();
        // paste overwrites the whole destination block
        for p in self.grid.points_in(dst_rect) {
            self.grid.remove(p);
        }
        for (p, cell) in snapshot {
            let d = offset(p, dx, dy);
            self.paste(Some(&cell), p, d);
        }
        self.rebuild_deps();
        self.touch();
        Ok(())
    }

    fn paste(&mut self, source: Option<&Cell>, src: Point, d: Point) {
        match source {
            None | Some(Cell::Spill { .. }) => {
                self.grid.remove(d);
            }
            Some(Cell::Value(v)) => {
                self.grid.insert(d, Cell::Value(v.clone()));
            }
            Some(Cell::Formula(f)) => {
                let cell = match &f.ast {
                    Some(ast) => {
                        let dx = i64::from(d.x) - i64::from(src.x);
                        let dy = i64::from(d.y) - i64::from(src.y);
                        Cell::Formula(Formula::from_expr(refs::adjust_for_copy(ast, dx, dy)))
                    }
                    None => Cell::Formula(f.clone()),
                };
                self.grid.insert(d, cell);
            }
        }
    }

    // =========================================================================
    // Move
    // =========================================================================

    pub fn move_cell(&mut self, src: Point, dst: Point) -> Result<()> {
        check_point(src)?;
        check_point(dst)?;
        self.move_cells(Rect::cell(src), dst)
    }

    /// Relocate a block. Moved formulas keep their targets; every formula
    /// elsewhere that referenced a moved coordinate is rewritten to follow
    /// it. Destination content is overwritten, the source is left empty.
    pub fn move_cells(&mut self, src: Rect, dst: Point) -> Result<()> {
        if src.size.is_empty() {
            return Ok(());
        }
        if !src.fits_in_sheet() {
            return Err(EngineError::AreaOutOfRange(src));
        }
        let dst_rect = Rect::new(dst, src.size);
        if !dst_rect.fits_in_sheet() {
            return Err(EngineError::AreaOutOfRange(dst_rect));
        }
        let dx = i64::from(dst.x) - i64::from(src.origin.x);
        let dy = i64::from(dst.y) - i64::from(src.origin.y);
        if dx == 0 && dy == 0 {
            return Ok(());
        }

        self.drop_spill_markers();
        self.rewrite_formulas(|ast| refs::adjust_for_move(ast, src, dx, dy));

        let moving = self.grid.extract_if(|p| src.contains(p));
        for p in self.grid.points_in(dst_rect) {
            self.grid.remove(p);
        }
        for (p, cell) in moving {
            self.grid.insert(offset(p, dx, dy), cell);
        }
        self.rebuild_deps();
        self.touch();
        Ok(())
    }

    // =========================================================================
    // Shared plumbing
    // =========================================================================

    fn rewrite_formulas(&mut self, adjust: impl Fn(&Expr) -> (Expr, bool)) {
        let points: Vec<Point> = self
            .grid
            .iter()
            .filter(|(_, c)| c.as_formula().is_some_and(|f| f.ast.is_some()))
            .map(|(p, _)| p)
            .collect();
        for p in points {
            let ast = match self.grid.get(p).and_then(Cell::as_formula) {
                Some(f) => f.ast.clone(),
                None => None,
            };
            if let Some(ast) = ast {
                let (rewritten, changed) = adjust(&ast);
                if changed {
                    if let Some(f) = self.grid.get_mut(p).and_then(Cell::as_formula_mut) {
                        f.replace_ast(rewritten);
                    }
                }
            }
        }
    }

    fn meta_mut(&mut self, axis: Axis) -> &mut MetadataStore {
        match axis {
            Axis::Columns => &mut self.col_meta,
            Axis::Rows => &mut self.row_meta,
        }
    }

    fn set_axis_extent(&mut self, axis: Axis, len: u32) {
        let mut size = self.grid.size();
        match axis {
            Axis::Columns => size.width = len,
            Axis::Rows => size.height = len,
        }
        self.grid.set_size(size);
    }
}

fn coord(p: Point, axis: Axis) -> u32 {
    match axis {
        Axis::Columns => p.x,
        Axis::Rows => p.y,
    }
}

fn with_coord(p: Point, axis: Axis, c: u32) -> Point {
    match axis {
        Axis::Columns => Point::new(c, p.y),
        Axis::Rows => Point::new(p.x, c),
    }
}

fn axis_len(size: Size, axis: Axis) -> u32 {
    match axis {
        Axis::Columns => size.width,
        Axis::Rows => size.height,
    }
}

fn offset(p: Point, dx: i64, dy: i64) -> Point {
    Point::new(
        (i64::from(p.x) + dx) as u32,
        (i64::from(p.y) + dy) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{area, at, sheet_with};
    use crate::metadata::LengthInfo;
    use crate::value::{ErrorValue, Scalar};

    fn formula_text(s: &Sheet, name: &str) -> String {
        s.get_edit_info(at(name)).unwrap().unwrap().text
    }

    #[test]
    fn delete_rows_rewrites_references_past_the_band() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("A1"), "A20 + 3").unwrap();
        s.delete_rows(4, 4).unwrap();
        assert_eq!(formula_text(&s, "A1"), "A16 + 3");
        assert_eq!(s.size(), Size::new(1, 1));
    }

    #[test]
    fn delete_columns_rewrites_references_past_the_band() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("A1"), "T1 + 3").unwrap();
        s.delete_columns(4, 4).unwrap();
        assert_eq!(formula_text(&s, "A1"), "P1 + 3");
    }

    #[test]
    fn delete_rows_kills_references_inside_the_band() {
        let mut s = sheet_with(&[("A5", "7")]);
        s.set_formula_cell(at("B1"), "A5 + 1").unwrap();
        s.delete_rows(3, 4).unwrap();
        assert_eq!(formula_text(&s, "B1"), "#REF! + 1");
        assert_eq!(
            s.get_value(at("B1")).unwrap(),
            Scalar::Error(ErrorValue::INVALID_REFERENCE)
        );
    }

    #[test]
    fn delete_all_rows_leaves_zero_height() {
        let mut s = Sheet::new();
        let bottom = at("A2147483647");
        s.set_formula_cell(bottom, "B2147483647 + 3").unwrap();
        assert_eq!(s.size(), Size::new(1, 2_147_483_647));
        s.delete_rows(0, 2_147_483_647).unwrap();
        assert_eq!(s.size(), Size::new(1, 0));
        assert_eq!(s.non_null_cell_count(), 0);
    }

    #[test]
    fn delete_almost_all_rows_pulls_formula_to_the_top() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("A2147483647"), "B2147483647 + 3").unwrap();
        s.delete_rows(0, 2_147_483_646).unwrap();
        assert_eq!(formula_text(&s, "A1"), "B1 + 3");
        assert_eq!(s.get_value(at("A1")).unwrap(), Scalar::Number(3.0));
        assert_eq!(s.size(), Size::new(1, 1));
    }

    #[test]
    fn delete_clamps_range_endpoints_to_the_band() {
        let mut s = sheet_with(&[("A2", "1"), ("A9", "2")]);
        s.set_formula_cell(at("B1"), "SUM(A2:A10)").unwrap();
        s.delete_rows(3, 4).unwrap();
        assert_eq!(formula_text(&s, "B1"), "SUM(A2:A6)");
        // A9 shifted to A5, still inside the sum
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(3.0));
    }

    #[test]
    fn delete_on_an_empty_sheet_is_a_noop() {
        let mut s = Sheet::new();
        s.delete_rows(100, 50).unwrap();
        assert_eq!(s.size(), Size::new(0, 0));
    }

    #[test]
    fn delete_shifts_metadata_runs() {
        let mut s = Sheet::new();
        s.set_rows_height(8, 2, 9).unwrap();
        s.delete_rows(3, 4).unwrap();
        assert_eq!(s.get_row_height(4).unwrap(), LengthInfo {
            length: Some(9),
            hidden: false
        });
        assert_eq!(s.get_row_height(8).unwrap(), LengthInfo::default());
    }

    #[test]
    fn insert_rows_shifts_cells_and_references() {
        let mut s = sheet_with(&[("A5", "7")]);
        s.set_formula_cell(at("B1"), "A5 + 1").unwrap();
        s.insert_rows(2, 3).unwrap();
        assert_eq!(formula_text(&s, "B1"), "A8 + 1");
        assert_eq!(s.get_value(at("A8")).unwrap(), Scalar::Number(7.0));
        assert_eq!(s.get_value(at("A5")).unwrap(), Scalar::Blank);
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(8.0));
    }

    #[test]
    fn insert_on_empty_sheet_grows_only_the_extent() {
        let mut s = Sheet::new();
        s.insert_rows(5, 3).unwrap();
        assert_eq!(s.size(), Size::new(0, 8));
        assert_eq!(s.non_null_cell_count(), 0);
    }

    #[test]
    fn insert_bounds() {
        let mut s = Sheet::new();
        assert!(s.insert_rows(2_147_483_647, 1).is_err());
        assert!(s.insert_rows(2_147_483_646, 1).is_ok());
        assert_eq!(s.size(), Size::new(0, 2_147_483_647));
        assert!(s.insert_columns(65_535, 1).is_err());
        assert!(s.insert_columns(65_534, 1).is_ok());
    }

    #[test]
    fn insert_fails_when_content_would_fall_off_the_edge() {
        let mut s = Sheet::new();
        s.set_value_cell(at("A2147483647"), 1.0).unwrap();
        assert!(matches!(
            s.insert_rows(0, 1),
            Err(EngineError::ExtentOverflow(Axis::Rows))
        ));
        // content above the insertion point is fine
        assert!(s.insert_rows(2_147_483_646, 1).is_err());
        s.delete_rows(2_147_483_646, 1).unwrap();
        s.set_value_cell(at("A5"), 1.0).unwrap();
        assert!(s.insert_rows(2_147_483_000, 100).is_ok());
    }

    #[test]
    fn insert_turns_overflowing_references_into_ref_errors() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("A1"), "B2147483647 + 3").unwrap();
        s.insert_rows(5, 10).unwrap();
        assert_eq!(formula_text(&s, "A1"), "#REF! + 3");
    }

    #[test]
    fn copy_cell_adjusts_relative_references() {
        let mut s = sheet_with(&[("A1", "10"), ("A2", "20")]);
        s.set_formula_cell(at("B1"), "A1 * 2").unwrap();
        s.copy_cell(at("B1"), area("B2")).unwrap();
        assert_eq!(formula_text(&s, "B2"), "A2 * 2");
        assert_eq!(s.get_value(at("B2")).unwrap(), Scalar::Number(40.0));
    }

    #[test]
    fn copy_cell_fills_a_block() {
        let mut s = sheet_with(&[("A1", "1"), ("A2", "2"), ("A3", "3")]);
        s.set_formula_cell(at("B1"), "A1 + 100").unwrap();
        s.copy_cell(at("B1"), area("B2:B3")).unwrap();
        assert_eq!(s.get_value(at("B2")).unwrap(), Scalar::Number(102.0));
        assert_eq!(s.get_value(at("B3")).unwrap(), Scalar::Number(103.0));
    }

    #[test]
    fn copy_respects_absolute_anchors() {
        let mut s = sheet_with(&[("A1", "10")]);
        s.set_formula_cell(at("B1"), "$A$1 + A1").unwrap();
        s.copy_cell(at("B1"), area("C4")).unwrap();
        assert_eq!(formula_text(&s, "C4"), "$A$1 + B4");
    }

    #[test]
    fn copy_off_sheet_becomes_ref_error() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("B2"), "A1 + 1").unwrap();
        // one row up: the relative A1 would leave the sheet
        s.copy_cell(at("B2"), area("B1")).unwrap();
        assert_eq!(formula_text(&s, "B1"), "#REF! + 1");
    }

    #[test]
    fn copy_cells_pastes_a_block() {
        let mut s = sheet_with(&[("A1", "1"), ("B1", "2")]);
        s.set_formula_cell(at("A2"), "A1 * 10").unwrap();
        s.set_formula_cell(at("B2"), "B1 * 10").unwrap();
        s.copy_cells(area("A1:B2"), at("D5")).unwrap();
        assert_eq!(s.get_value(at("D5")).unwrap(), Scalar::Number(1.0));
        assert_eq!(s.get_value(at("E5")).unwrap(), Scalar::Number(2.0));
        assert_eq!(formula_text(&s, "D6"), "D5 * 10");
        assert_eq!(s.get_value(at("E6")).unwrap(), Scalar::Number(20.0));
        // source block untouched
        assert_eq!(s.get_value(at("A2")).unwrap(), Scalar::Number(10.0));
    }

    #[test]
    fn copy_cells_out_of_bounds_is_rejected() {
        let mut s = sheet_with(&[("A1", "1")]);
        let err = s.copy_cells(area("A1:B2"), at("CRXN2147483647"));
        assert!(matches!(err, Err(EngineError::AreaOutOfRange(_))));
        assert_eq!(s.non_null_cell_count(), 1);
    }

    #[test]
    fn move_cell_retargets_external_references() {
        let mut s = sheet_with(&[("A1", "5")]);
        s.set_formula_cell(at("B1"), "A1 + 1").unwrap();
        s.move_cell(at("A1"), at("C5")).unwrap();
        assert_eq!(formula_text(&s, "B1"), "C5 + 1");
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(6.0));
        assert_eq!(s.get_value(at("A1")).unwrap(), Scalar::Blank);
        assert_eq!(s.get_value(at("C5")).unwrap(), Scalar::Number(5.0));
    }

    #[test]
    fn moved_formulas_keep_their_targets() {
        let mut s = sheet_with(&[("A1", "5")]);
        s.set_formula_cell(at("B1"), "A1 + 1").unwrap();
        s.move_cell(at("B1"), at("D4")).unwrap();
        assert_eq!(formula_text(&s, "D4"), "A1 + 1");
        assert_eq!(s.get_value(at("D4")).unwrap(), Scalar::Number(6.0));
        assert!(s.get_edit_info(at("B1")).unwrap().is_none());
    }

    #[test]
    fn move_block_preserves_internal_references() {
        let mut s = sheet_with(&[("A1", "5")]);
        s.set_formula_cell(at("A2"), "A1 * 2").unwrap();
        s.move_cells(area("A1:A2"), at("C3")).unwrap();
        // the internal reference followed the move
        assert_eq!(formula_text(&s, "C4"), "C3 * 2");
        assert_eq!(s.get_value(at("C4")).unwrap(), Scalar::Number(10.0));
    }

    #[test]
    fn move_overwrites_the_destination() {
        let mut s = sheet_with(&[("A1", "5"), ("C3", "99")]);
        s.move_cell(at("A1"), at("C3")).unwrap();
        assert_eq!(s.get_value(at("C3")).unwrap(), Scalar::Number(5.0));
        assert_eq!(s.non_null_cell_count(), 1);
    }

    #[test]
    fn move_whole_range_moves_range_references() {
        let mut s = sheet_with(&[("A1", "1"), ("A2", "2")]);
        s.set_formula_cell(at("C1"), "SUM(A1:A2)").unwrap();
        s.move_cells(area("A1:A2"), at("E1")).unwrap();
        assert_eq!(formula_text(&s, "C1"), "SUM(E1:E2)");
        assert_eq!(s.get_value(at("C1")).unwrap(), Scalar::Number(3.0));
    }

    #[test]
    fn structural_edits_respect_suspension() {
        let mut s = sheet_with(&[("A5", "7")]);
        s.set_formula_cell(at("B1"), "A5 + 1").unwrap();
        s.suspend_recalc();
        s.insert_rows(2, 3).unwrap();
        // text rewritten eagerly, value still stale
        assert_eq!(formula_text(&s, "B1"), "A8 + 1");
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(8.0));
        s.set_value_cell(at("A8"), 100.0).unwrap();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(8.0));
        s.resume_recalc();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(101.0));
    }
}
