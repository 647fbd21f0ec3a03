//! The sheet facade: one object owning the cell store, the dependency
//! graph, per-axis metadata and the recalculation controller.
//!
//! Mutators validate their arguments before touching any state, so a
//! failed call leaves every component unchanged. Recomputation is a full
//! ordered pass over the formula set; it runs after every edit unless the
//! controller is suspended, in which case the final resume catches up.

use rustc_hash::FxHashMap;

use crate::cell::{Cell, Formula, FormulaInfo};
use crate::dep_graph::DepGraph;
use crate::error::{EngineError, Result};
use crate::formula::eval::{self, Computed};
use crate::formula::refs;
use crate::geom::{Axis, Point, Rect, Size, MAX_SIZE};
use crate::grid::Grid;
use crate::metadata::{LengthInfo, MetaRun, MetadataStore};
use crate::recalc::{CycleReport, RecalcController, RecalcReport};
use crate::value::{ErrorValue, Scalar};

#[derive(Debug, Clone)]
pub struct Sheet {
    pub(crate) grid: Grid,
    pub(crate) deps: DepGraph,
    pub(crate) row_meta: MetadataStore,
    pub(crate) col_meta: MetadataStore,
    pub(crate) controller: RecalcController,
    last_report: RecalcReport,
    last_cycles: Option<CycleReport>,
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self {
            grid: Grid::new(),
            deps: DepGraph::new(),
            row_meta: MetadataStore::new(Axis::Rows.limit()),
            col_meta: MetadataStore::new(Axis::Columns.limit()),
            controller: RecalcController::new(),
            last_report: RecalcReport::default(),
            last_cycles: None,
        }
    }

    /// The tracked occupied extent. `(0, 0)` for a fresh sheet.
    pub fn size(&self) -> Size {
        self.grid.size()
    }

    pub fn max_size(&self) -> Size {
        MAX_SIZE
    }

    /// Occupied cells, spilled cells counted individually.
    pub fn non_null_cell_count(&self) -> usize {
        self.grid.cell_count()
    }

    // =========================================================================
    // Cell content
    // =========================================================================

    /// Store a literal value. `Blank` clears the cell instead, but the
    /// address still counts as touched and grows the tracked extent.
    pub fn set_value_cell(&mut self, p: Point, value: impl Into<Scalar>) -> Result<()> {
        check_point(p)?;
        self.retract_spill_at(p);
        self.deps.clear_cell(p);
        let v = value.into();
        if v.is_blank() {
            self.grid.remove(p);
            self.grid.expand_to_include(p);
        } else {
            self.grid.insert(p, Cell::Value(v));
        }
        self.touch();
        Ok(())
    }

    /// Store a formula. Text that does not parse (the empty string
    /// included) is kept verbatim with an `#ERROR!` result; the call still
    /// succeeds.
    pub fn set_formula_cell(&mut self, p: Point, text: &str) -> Result<()> {
        check_point(p)?;
        self.retract_spill_at(p);
        let f = Formula::parse(text);
        match &f.ast {
            Some(ast) => self.deps.set_edges(p, &refs::extract_refs(ast)),
            None => self.deps.clear_cell(p),
        }
        self.grid.insert(p, Cell::Formula(f));
        self.touch();
        Ok(())
    }

    /// Clear a cell's content. Clearing touches the address, so the
    /// tracked extent can only grow here, never shrink.
    pub fn clear_cell(&mut self, p: Point) -> Result<()> {
        check_point(p)?;
        self.retract_spill_at(p);
        self.deps.clear_cell(p);
        self.grid.remove(p);
        self.grid.expand_to_include(p);
        self.touch();
        Ok(())
    }

    /// The value shown at `p`: a stored scalar, a cached formula result,
    /// or the element of a spill covering the cell. `Blank` when empty.
    pub fn get_value(&self, p: Point) -> Result<Scalar> {
        check_point(p)?;
        Ok(self.grid.get(p).map(Cell::local_value).unwrap_or_default())
    }

    /// Formula text and spill extent, for anchor cells only.
    pub fn get_edit_info(&self, p: Point) -> Result<Option<FormulaInfo>> {
        check_point(p)?;
        Ok(self.grid.get(p).and_then(Cell::as_formula).map(|f| FormulaInfo {
            text: f.text.clone(),
            extent: f.extent,
        }))
    }

    // =========================================================================
    // Row / column metadata
    // =========================================================================

    pub fn set_rows_height(&mut self, start: u32, count: u32, height: u32) -> Result<()> {
        check_span(Axis::Rows, start, count)?;
        self.row_meta.set_length(start, count, height);
        Ok(())
    }

    pub fn clear_rows_height(&mut self, start: u32, count: u32) -> Result<()> {
        check_span(Axis::Rows, start, count)?;
        self.row_meta.clear_length(start, count);
        Ok(())
    }

    pub fn hide_rows(&mut self, start: u32, count: u32, hidden: bool) -> Result<()> {
        check_span(Axis::Rows, start, count)?;
        self.row_meta.set_hidden(start, count, hidden);
        Ok(())
    }

    pub fn get_row_height(&self, y: u32) -> Result<LengthInfo> {
        check_span(Axis::Rows, y, 1)?;
        Ok(self.row_meta.get_info(y))
    }

    pub fn row_height_ranges(&self, start: u32, count: u32) -> Result<Vec<MetaRun>> {
        check_span(Axis::Rows, start, count)?;
        Ok(self.row_meta.ranges(start, count))
    }

    pub fn set_columns_width(&mut self, start: u32, count: u32, width: u32) -> Result<()> {
        check_span(Axis::Columns, start, count)?;
        self.col_meta.set_length(start, count, width);
        Ok(())
    }

    pub fn clear_columns_width(&mut self, start: u32, count: u32) -> Result<()> {
        check_span(Axis::Columns, start, count)?;
        self.col_meta.clear_length(start, count);
        Ok(())
    }

    pub fn hide_columns(&mut self, start: u32, count: u32, hidden: bool) -> Result<()> {
        check_span(Axis::Columns, start, count)?;
        self.col_meta.set_hidden(start, count, hidden);
        Ok(())
    }

    pub fn get_column_width(&self, x: u32) -> Result<LengthInfo> {
        check_span(Axis::Columns, x, 1)?;
        Ok(self.col_meta.get_info(x))
    }

    pub fn column_width_ranges(&self, start: u32, count: u32) -> Result<Vec<MetaRun>> {
        check_span(Axis::Columns, start, count)?;
        Ok(self.col_meta.ranges(start, count))
    }

    // =========================================================================
    // Recalculation control
    // =========================================================================

    pub fn suspend_recalc(&mut self) {
        self.controller.suspend();
    }

    pub fn resume_recalc(&mut self) {
        if self.controller.resume() {
            self.recompute();
        }
    }

    /// Recompute now, whether or not recalculation is suspended. The
    /// suspension counter is untouched.
    pub fn recalculate(&mut self) {
        self.recompute();
    }

    pub fn last_recalc_report(&self) -> &RecalcReport {
        &self.last_report
    }

    /// The circular reference found by the last recompute, if any.
    pub fn last_cycle_report(&self) -> Option<&CycleReport> {
        self.last_cycles.as_ref()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Run after every mutation: recompute immediately, or record the
    /// pending work if suspended.
    pub(crate) fn touch(&mut self) {
        if self.controller.note_edit() {
            self.recompute();
        }
    }

    /// Drop the spill cells owned by the formula at `anchor`, if any.
    fn retract_spill_at(&mut self, anchor: Point) {
        let extent = match self.grid.get(anchor).and_then(Cell::as_formula) {
            Some(f) if f.extent != Size::unit() => f.extent,
            _ => return,
        };
        for q in self.grid.points_in(Rect::new(anchor, extent)) {
            if q == anchor {
                continue;
            }
            let ours = matches!(
                self.grid.get(q),
                Some(Cell::Spill { anchor: a, .. }) if *a == anchor
            );
            if ours {
                self.grid.remove(q);
            }
        }
    }

    /// Re-register every formula's reads from its current tree. Used
    /// after structural edits move formulas and rewrite their references.
    pub(crate) fn rebuild_deps(&mut self) {
        self.deps.clear();
        let formulas: Vec<(Point, refs::RefSet, Size)> = self
            .grid
            .iter()
            .filter_map(|(p, c)| {
                let f = c.as_formula()?;
                let ast = f.ast.as_ref()?;
                Some((p, refs::extract_refs(ast), f.extent))
            })
            .collect();
        for (p, set, extent) in formulas {
            self.deps.set_edges(p, &set);
            if extent != Size::unit() {
                self.deps.set_extent(p, Rect::new(p, extent));
            }
        }
    }

    /// Spill cells are derived state; they are dropped wholesale before a
    /// recompute or a structural shift and re-placed by evaluation.
    pub(crate) fn drop_spill_markers(&mut self) {
        let markers: Vec<Point> = self
            .grid
            .iter()
            .filter(|(_, c)| matches!(c, Cell::Spill { .. }))
            .map(|(p, _)| p)
            .collect();
        for p in markers {
            self.grid.remove(p);
        }
    }

    /// Full ordered recompute: clear derived spill cells, mark cycle
    /// members, then evaluate every formula in dependency order.
    fn recompute(&mut self) {
        self.drop_spill_markers();

        let (order, cyclic) = self.deps.evaluation_order();
        let mut report = RecalcReport {
            cycle_cells: cyclic.len(),
            ..Default::default()
        };

        let mut cyclic_sorted: Vec<Point> = cyclic.into_iter().collect();
        cyclic_sorted.sort();
        self.last_cycles = if cyclic_sorted.is_empty() {
            None
        } else {
            Some(CycleReport::new(cyclic_sorted.clone()))
        };
        for p in cyclic_sorted {
            if let Some(f) = self.grid.get_mut(p).and_then(Cell::as_formula_mut) {
                f.cached = Scalar::Error(ErrorValue::INVALID_REFERENCE);
                f.extent = Size::unit();
            }
            self.deps.set_extent(p, Rect::cell(p));
        }

        let mut depth: FxHashMap<Point, usize> = FxHashMap::default();
        for p in order {
            let ast = match self.grid.get(p).and_then(Cell::as_formula) {
                Some(f) => match &f.ast {
                    Some(ast) => ast.clone(),
                    None => continue,
                },
                None => continue,
            };
            let d = 1 + self
                .deps
                .pred_formulas(p)
                .iter()
                .filter_map(|q| depth.get(q))
                .copied()
                .max()
                .unwrap_or(0);
            depth.insert(p, d);
            report.cells_recomputed += 1;
            report.max_depth = report.max_depth.max(d);

            let computed = eval::evaluate(&ast, &self.grid);
            self.place_result(p, computed);
        }
        self.last_report = report;
    }

    /// Write a formula's result back: cache the scalar, or lay out the
    /// spill. A blocked spill leaves the anchor at `#SPILL!` and touches
    /// nothing else.
    fn place_result(&mut self, p: Point, computed: Computed) {
        match computed {
            Computed::Scalar(s) => {
                if let Some(f) = self.grid.get_mut(p).and_then(Cell::as_formula_mut) {
                    f.cached = s;
                    f.extent = Size::unit();
                }
                self.deps.set_extent(p, Rect::cell(p));
            }
            Computed::Array(a) => {
                // clipped to the sheet edge without error
                let size = Size::new(
                    a.size().width.min(MAX_SIZE.width - p.x),
                    a.size().height.min(MAX_SIZE.height - p.y),
                );
                let rect = Rect::new(p, size);
                let blocked = self.grid.points_in(rect).into_iter().any(|q| q != p);
                if blocked {
                    if let Some(f) = self.grid.get_mut(p).and_then(Cell::as_formula_mut) {
                        f.cached = Scalar::Error(ErrorValue::SPILL);
                        f.extent = Size::unit();
                    }
                    self.deps.set_extent(p, Rect::cell(p));
                    return;
                }
                for q in rect.points() {
                    if q != p {
                        self.grid.insert(
                            q,
                            Cell::Spill {
                                anchor: p,
                                value: a.get(q.x - p.x, q.y - p.y).clone(),
                            },
                        );
                    }
                }
                if let Some(f) = self.grid.get_mut(p).and_then(Cell::as_formula_mut) {
                    f.cached = a.top_left();
                    f.extent = size;
                }
                self.deps.set_extent(p, rect);
            }
        }
    }
}

pub(crate) fn check_point(p: Point) -> Result<()> {
    if p.is_valid() {
        Ok(())
    } else {
        Err(EngineError::PointOutOfRange(p))
    }
}

pub(crate) fn check_span(axis: Axis, start: u32, count: u32) -> Result<()> {
    let limit = axis.limit();
    if start < limit && u64::from(start) + u64::from(count) <= u64::from(limit) {
        Ok(())
    } else {
        Err(EngineError::SpanOutOfRange { axis, start, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{at, sheet_with};
    use crate::metadata::LengthInfo;

    #[test]
    fn value_round_trips() {
        let mut s = Sheet::new();
        let p = at("B2");
        s.set_value_cell(p, 4.25).unwrap();
        assert_eq!(s.get_value(p).unwrap(), Scalar::Number(4.25));
        s.set_value_cell(p, true).unwrap();
        assert_eq!(s.get_value(p).unwrap(), Scalar::Bool(true));
        s.set_value_cell(p, "hello").unwrap();
        assert_eq!(s.get_value(p).unwrap(), Scalar::Text("hello".into()));
        s.set_value_cell(p, ErrorValue::NULL_RANGE).unwrap();
        assert_eq!(
            s.get_value(p).unwrap(),
            Scalar::Error(ErrorValue::NULL_RANGE)
        );
    }

    #[test]
    fn blank_clears_and_keeps_count_zero() {
        let mut s = Sheet::new();
        s.set_value_cell(at("A1"), Scalar::Blank).unwrap();
        assert_eq!(s.non_null_cell_count(), 0);
        s.set_value_cell(at("A1"), 1.0).unwrap();
        assert_eq!(s.non_null_cell_count(), 1);
        s.clear_cell(at("A1")).unwrap();
        assert_eq!(s.get_value(at("A1")).unwrap(), Scalar::Blank);
        assert_eq!(s.non_null_cell_count(), 0);
    }

    #[test]
    fn blank_and_clear_still_grow_the_tracked_extent() {
        let mut s = Sheet::new();
        s.set_value_cell(at("A100"), Scalar::Blank).unwrap();
        assert_eq!(s.size(), Size::new(1, 100));
        assert_eq!(s.non_null_cell_count(), 0);
        s.clear_cell(at("C1")).unwrap();
        assert_eq!(s.size(), Size::new(3, 100));
    }

    #[test]
    fn non_finite_numbers_store_num_error() {
        let mut s = Sheet::new();
        s.set_value_cell(at("A1"), f64::INFINITY).unwrap();
        assert_eq!(
            s.get_value(at("A1")).unwrap(),
            Scalar::Error(ErrorValue::NOT_A_NUMBER)
        );
    }

    #[test]
    fn out_of_range_point_is_rejected_without_mutation() {
        let mut s = Sheet::new();
        let bad = Point::new(65_535, 0);
        assert!(s.set_value_cell(bad, 1.0).is_err());
        assert!(s.get_value(bad).is_err());
        assert_eq!(s.size(), Size::new(0, 0));
        // the last valid cell works
        let corner = Point::new(65_534, 2_147_483_646);
        s.set_value_cell(corner, 1.0).unwrap();
        assert_eq!(s.size(), Size::new(65_535, 2_147_483_647));
    }

    #[test]
    fn simple_formula_evaluates() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("A1"), "1 + 3").unwrap();
        assert_eq!(s.get_value(at("A1")).unwrap(), Scalar::Number(4.0));
        let info = s.get_edit_info(at("A1")).unwrap().unwrap();
        assert_eq!(info.text, "1 + 3");
        assert_eq!(info.extent, Size::unit());
    }

    #[test]
    fn empty_formula_is_stored_as_error() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("A1"), "").unwrap();
        assert_eq!(
            s.get_value(at("A1")).unwrap(),
            Scalar::Error(ErrorValue::INVALID_FORMULA)
        );
        let info = s.get_edit_info(at("A1")).unwrap().unwrap();
        assert_eq!(info.text, "");
        assert_eq!(s.non_null_cell_count(), 1);
    }

    #[test]
    fn formula_chain_recomputes_on_edit() {
        let mut s = sheet_with(&[("A1", "10")]);
        s.set_formula_cell(at("A2"), "A1 * 2").unwrap();
        s.set_formula_cell(at("A3"), "A2 + 1").unwrap();
        assert_eq!(s.get_value(at("A3")).unwrap(), Scalar::Number(21.0));
        s.set_value_cell(at("A1"), 5.0).unwrap();
        assert_eq!(s.get_value(at("A2")).unwrap(), Scalar::Number(10.0));
        assert_eq!(s.get_value(at("A3")).unwrap(), Scalar::Number(11.0));
        assert_eq!(s.last_recalc_report().cells_recomputed, 2);
        assert_eq!(s.last_recalc_report().max_depth, 2);
    }

    #[test]
    fn aggregate_tracks_range_edits() {
        let mut s = sheet_with(&[("A1", "1"), ("A2", "2")]);
        s.set_formula_cell(at("B1"), "SUM(A1:A10)").unwrap();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(3.0));
        s.set_value_cell(at("A7"), 10.0).unwrap();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(13.0));
    }

    #[test]
    fn cycle_resolves_to_ref_error() {
        let mut s = Sheet::new();
        s.suspend_recalc();
        s.set_formula_cell(at("A1"), "A2 + 1").unwrap();
        s.set_formula_cell(at("A2"), "A1 + 1").unwrap();
        s.resume_recalc();
        assert_eq!(
            s.get_value(at("A1")).unwrap(),
            Scalar::Error(ErrorValue::INVALID_REFERENCE)
        );
        assert_eq!(
            s.get_value(at("A2")).unwrap(),
            Scalar::Error(ErrorValue::INVALID_REFERENCE)
        );
        assert!(s.last_recalc_report().had_cycles());
        assert_eq!(s.last_recalc_report().cycle_cells, 2);
    }

    #[test]
    fn cycle_report_names_the_cells_and_clears_when_fixed() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("A1"), "A2 + 1").unwrap();
        assert!(s.last_cycle_report().is_none());
        s.set_formula_cell(at("A2"), "A1 + 1").unwrap();
        let report = s.last_cycle_report().unwrap();
        assert_eq!(report.cells, vec![at("A1"), at("A2")]);
        assert_eq!(report.to_string(), "circular reference: A1 -> A2");
        s.set_formula_cell(at("A2"), "10").unwrap();
        assert!(s.last_cycle_report().is_none());
    }

    #[test]
    fn self_reference_resolves_to_ref_error() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("A1"), "A1 + 1").unwrap();
        assert_eq!(
            s.get_value(at("A1")).unwrap(),
            Scalar::Error(ErrorValue::INVALID_REFERENCE)
        );
    }

    #[test]
    fn range_formula_spills() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("F1"), "C1:D2 + 3").unwrap();
        assert_eq!(s.get_value(at("F1")).unwrap(), Scalar::Number(3.0));
        assert_eq!(s.get_value(at("G1")).unwrap(), Scalar::Number(3.0));
        assert_eq!(s.get_value(at("F2")).unwrap(), Scalar::Number(3.0));
        assert_eq!(s.get_value(at("G2")).unwrap(), Scalar::Number(3.0));
        assert_eq!(s.non_null_cell_count(), 4);
        let info = s.get_edit_info(at("F1")).unwrap().unwrap();
        assert_eq!(info.extent, Size::new(2, 2));
        // members are not anchors
        assert!(s.get_edit_info(at("G2")).unwrap().is_none());
    }

    #[test]
    fn spill_clips_at_sheet_corner() {
        let mut s = Sheet::new();
        let corner = at("CRXO2147483647");
        s.set_formula_cell(corner, "C1:D2 + 3").unwrap();
        assert_eq!(s.get_value(corner).unwrap(), Scalar::Number(3.0));
        assert_eq!(s.non_null_cell_count(), 1);
        let info = s.get_edit_info(corner).unwrap().unwrap();
        assert_eq!(info.extent, Size::unit());
    }

    #[test]
    fn blocked_spill_is_spill_error() {
        let mut s = sheet_with(&[("G2", "99")]);
        s.set_formula_cell(at("F1"), "C1:D2 + 3").unwrap();
        assert_eq!(
            s.get_value(at("F1")).unwrap(),
            Scalar::Error(ErrorValue::SPILL)
        );
        // the blocking cell is untouched and no members were written
        assert_eq!(s.get_value(at("G2")).unwrap(), Scalar::Number(99.0));
        assert_eq!(s.get_value(at("G1")).unwrap(), Scalar::Blank);
        assert_eq!(s.non_null_cell_count(), 2);
        assert_eq!(
            s.get_edit_info(at("F1")).unwrap().unwrap().extent,
            Size::unit()
        );
    }

    #[test]
    fn writing_into_a_spill_retracts_it() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("F1"), "C1:D2 + 3").unwrap();
        assert_eq!(s.non_null_cell_count(), 4);
        s.set_value_cell(at("G2"), 1.0).unwrap();
        assert_eq!(
            s.get_value(at("F1")).unwrap(),
            Scalar::Error(ErrorValue::SPILL)
        );
        assert_eq!(s.get_value(at("G1")).unwrap(), Scalar::Blank);
        assert_eq!(s.non_null_cell_count(), 2);
    }

    #[test]
    fn clearing_the_blocker_respills() {
        let mut s = sheet_with(&[("G2", "99")]);
        s.set_formula_cell(at("F1"), "C1:D2 + 3").unwrap();
        s.clear_cell(at("G2")).unwrap();
        assert_eq!(s.get_value(at("F1")).unwrap(), Scalar::Number(3.0));
        assert_eq!(s.get_value(at("G2")).unwrap(), Scalar::Number(3.0));
        assert_eq!(s.non_null_cell_count(), 4);
    }

    #[test]
    fn formula_can_read_a_spilled_cell() {
        let mut s = sheet_with(&[("A1", "1"), ("A2", "2")]);
        s.set_formula_cell(at("C1"), "A1:A2 * 10").unwrap();
        s.set_formula_cell(at("E1"), "C2 + 1").unwrap();
        assert_eq!(s.get_value(at("E1")).unwrap(), Scalar::Number(21.0));
        s.set_value_cell(at("A2"), 5.0).unwrap();
        assert_eq!(s.get_value(at("E1")).unwrap(), Scalar::Number(51.0));
    }

    #[test]
    fn suspend_batches_recomputation() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("B1"), "A1 + 1").unwrap();
        s.suspend_recalc();
        s.set_value_cell(at("A1"), 10.0).unwrap();
        // stale while suspended
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(1.0));
        s.resume_recalc();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(11.0));
    }

    #[test]
    fn nested_suspend_needs_matching_resumes() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("B1"), "A1 + 1").unwrap();
        s.suspend_recalc();
        s.suspend_recalc();
        s.set_value_cell(at("A1"), 10.0).unwrap();
        s.resume_recalc();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(1.0));
        s.resume_recalc();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(11.0));
    }

    #[test]
    fn recalculate_works_under_suspension() {
        let mut s = Sheet::new();
        s.set_formula_cell(at("B1"), "A1 + 1").unwrap();
        s.suspend_recalc();
        s.set_value_cell(at("A1"), 10.0).unwrap();
        s.recalculate();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(11.0));
        // counter still held
        s.set_value_cell(at("A1"), 20.0).unwrap();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(11.0));
        s.resume_recalc();
        assert_eq!(s.get_value(at("B1")).unwrap(), Scalar::Number(21.0));
    }

    #[test]
    fn metadata_runs_merge_and_split() {
        let mut s = Sheet::new();
        s.set_rows_height(3, 1, 22).unwrap();
        s.set_rows_height(4, 2, 13).unwrap();
        s.hide_rows(4, 1, true).unwrap();
        let runs = s.row_height_ranges(0, 7).unwrap();
        let expect = |start, count, length, hidden| MetaRun {
            start,
            count,
            info: LengthInfo { length, hidden },
        };
        assert_eq!(
            runs,
            vec![
                expect(0, 3, None, false),
                expect(3, 1, Some(22), false),
                expect(4, 1, Some(13), true),
                expect(5, 1, Some(13), false),
                expect(6, 1, None, false),
            ]
        );
        // a second query sees the same state
        assert_eq!(s.row_height_ranges(0, 7).unwrap(), runs);
        assert_eq!(s.get_row_height(4).unwrap(), LengthInfo {
            length: Some(13),
            hidden: true
        });
    }

    #[test]
    fn column_metadata_is_independent_of_rows() {
        let mut s = Sheet::new();
        s.set_columns_width(2, 3, 40).unwrap();
        s.hide_columns(3, 1, true).unwrap();
        assert_eq!(s.get_column_width(3).unwrap(), LengthInfo {
            length: Some(40),
            hidden: true
        });
        assert_eq!(s.get_row_height(3).unwrap(), LengthInfo::default());
        // clearing width preserves hidden
        s.clear_columns_width(0, 10).unwrap();
        assert_eq!(s.get_column_width(3).unwrap(), LengthInfo {
            length: None,
            hidden: true
        });
    }

    #[test]
    fn metadata_span_validation() {
        let mut s = Sheet::new();
        assert!(s.set_rows_height(2_147_483_647, 1, 10).is_err());
        assert!(s.set_rows_height(2_147_483_646, 1, 10).is_ok());
        assert!(s.set_columns_width(65_535, 1, 10).is_err());
        assert!(s.set_columns_width(65_534, 1, 10).is_ok());
    }
}
