//! Recalculation control and reporting.
//!
//! The controller holds the suspend counter and the dirty flag; the sheet
//! drives the actual recompute loop.

use crate::geom::Point;
use crate::names;

/// Gate for automatic recalculation.
///
/// Suspension nests: each `suspend` must be matched by a `resume` before
/// automatic recalculation runs again. Edits made while suspended set the
/// dirty flag so the final `resume` can catch up.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecalcController {
    suspend_depth: u32,
    dirty: bool,
}

impl RecalcController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend_depth > 0
    }

    pub fn suspend(&mut self) {
        self.suspend_depth += 1;
    }

    /// Drop one level of suspension. Returns true when this was the
    /// outermost level and pending edits now need a recompute. Resuming a
    /// controller that is not suspended is a no-op.
    pub fn resume(&mut self) -> bool {
        if self.suspend_depth == 0 {
            return false;
        }
        self.suspend_depth -= 1;
        self.suspend_depth == 0 && std::mem::take(&mut self.dirty)
    }

    /// Record an edit. Returns true when recalculation should run now.
    pub fn note_edit(&mut self) -> bool {
        if self.is_suspended() {
            self.dirty = true;
            false
        } else {
            true
        }
    }
}

/// Summary of one recompute pass.
#[derive(Debug, Clone, Default)]
pub struct RecalcReport {
    /// Number of formula cells recomputed.
    pub cells_recomputed: usize,
    /// Longest formula-to-formula chain evaluated. A formula with no
    /// formula precedents has depth 1.
    pub max_depth: usize,
    /// Number of cells sitting on reference cycles.
    pub cycle_cells: usize,
}

impl RecalcReport {
    pub fn had_cycles(&self) -> bool {
        self.cycle_cells > 0
    }

    /// One-line summary for logging.
    pub fn log_line(&self) -> String {
        format!(
            "[recalc] {} cells  depth={}  cycles={}",
            self.cells_recomputed, self.max_depth, self.cycle_cells
        )
    }
}

/// A circular reference found during recompute.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Cells participating in the cycle, in address order.
    pub cells: Vec<Point>,
}

impl CycleReport {
    pub fn new(mut cells: Vec<Point>) -> Self {
        cells.sort();
        Self { cells }
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = |p: &Point| match (names::index_to_column(p.x), names::index_to_row(p.y)) {
            (Ok(col), Ok(row)) => format!("{}{}", col, row),
            _ => format!("({},{})", p.x, p.y),
        };
        match self.cells.as_slice() {
            [only] => write!(f, "cell {} references itself", name(only)),
            cells if cells.len() <= 5 => {
                let list: Vec<String> = cells.iter().map(name).collect();
                write!(f, "circular reference: {}", list.join(" -> "))
            }
            cells => write!(
                f,
                "circular reference involving {} cells starting at {}",
                cells.len(),
                name(&cells[0])
            ),
        }
    }
}

impl std::error::Error for CycleReport {}
