//! Dependency tracking between formula cells.
//!
//! Each formula records the individual cells it reads and the range
//! rectangles it reads. Ranges are kept as rectangles rather than being
//! expanded per cell, so `SUM(A1:A2147483647)` costs one entry. Range
//! membership is resolved by containment tests against formula anchors
//! when the graph is walked.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::formula::refs::RefSet;
use crate::geom::{Point, Rect};

#[derive(Debug, Clone, Default)]
struct Deps {
    cells: FxHashSet<Point>,
    ranges: Vec<Rect>,
}

impl Deps {
    fn covers_rect(&self, rect: Rect) -> bool {
        self.cells.iter().any(|c| rect.contains(*c))
            || self.ranges.iter().any(|r| r.intersects(rect))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    /// formula anchor -> what it reads
    preds: FxHashMap<Point, Deps>,
    /// formula anchor -> its output footprint from the last evaluation.
    /// Larger than one cell only for spilled arrays; a formula reading any
    /// cell of a spill must order after the spilling formula.
    extents: FxHashMap<Point, Rect>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the recorded reads of the formula at `formula`. The
    /// recorded footprint resets to a single cell until the next
    /// evaluation.
    pub fn set_edges(&mut self, formula: Point, refs: &RefSet) {
        self.extents.remove(&formula);
        self.preds.insert(
            formula,
            Deps {
                cells: refs.cells.clone(),
                ranges: refs.ranges.clone(),
            },
        );
    }

    /// Record the output footprint of the formula at `formula`.
    /// `Rect::cell(formula)` for scalar results.
    pub fn set_extent(&mut self, formula: Point, rect: Rect) {
        debug_assert!(rect.contains(formula));
        self.extents.insert(formula, rect);
    }

    fn extent_of(&self, formula: Point) -> Rect {
        self.extents
            .get(&formula)
            .copied()
            .unwrap_or(Rect::cell(formula))
    }

    /// Remove the formula at `p` from the graph. A no-op for non-formula
    /// cells.
    pub fn clear_cell(&mut self, p: Point) {
        self.preds.remove(&p);
        self.extents.remove(&p);
    }

    pub fn clear(&mut self) {
        self.preds.clear();
        self.extents.clear();
    }

    pub fn is_formula(&self, p: Point) -> bool {
        self.preds.contains_key(&p)
    }

    pub fn formulas(&self) -> impl Iterator<Item = Point> + '_ {
        self.preds.keys().copied()
    }

    /// The formulas that the formula at `f` reads: directly, through a
    /// range, or through another formula's spill footprint.
    pub(crate) fn pred_formulas(&self, f: Point) -> Vec<Point> {
        let deps = match self.preds.get(&f) {
            Some(d) => d,
            None => return Vec::new(),
        };
        let mut out: Vec<Point> = self
            .preds
            .keys()
            .copied()
            .filter(|&g| deps.covers_rect(self.extent_of(g)))
            .collect();
        out.sort();
        out
    }

    /// All formulas in evaluation order: a formula appears after every
    /// formula it reads. Formulas on cycles are left out of the order and
    /// returned separately.
    pub fn evaluation_order(&self) -> (Vec<Point>, FxHashSet<Point>) {
        let cyclic = self.find_cycle_members();

        // Kahn's algorithm over the acyclic remainder, with the ready set
        // kept sorted so the order is deterministic.
        let mut in_degree: FxHashMap<Point, usize> = FxHashMap::default();
        let mut succs: FxHashMap<Point, Vec<Point>> = FxHashMap::default();
        for f in self.formulas().filter(|f| !cyclic.contains(f)) {
            let preds: Vec<Point> = self
                .pred_formulas(f)
                .into_iter()
                .filter(|p| !cyclic.contains(p))
                .collect();
            in_degree.insert(f, preds.len());
            for p in preds {
                succs.entry(p).or_default().push(f);
            }
        }

        let mut ready: Vec<Point> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(p, _)| *p)
            .collect();
        // descending so popping from the end yields ascending order
        ready.sort_by(|a, b| b.cmp(a));

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(f) = ready.pop() {
            order.push(f);
            if let Some(next) = succs.get(&f) {
                for &g in next {
                    let d = in_degree.get_mut(&g).map(|d| {
                        *d -= 1;
                        *d
                    });
                    if d == Some(0) {
                        let pos = ready.binary_search_by(|x| g.cmp(x)).unwrap_or_else(|e| e);
                        ready.insert(pos, g);
                    }
                }
            }
        }
        debug_assert_eq!(order.len(), in_degree.len());
        (order, cyclic)
    }

    /// Formula cells that sit on a reference cycle, self-references
    /// included. Tarjan's strongly connected components, iterative so deep
    /// chains cannot overflow the stack.
    pub fn find_cycle_members(&self) -> FxHashSet<Point> {
        struct State {
            index: FxHashMap<Point, usize>,
            lowlink: FxHashMap<Point, usize>,
            on_stack: FxHashSet<Point>,
            stack: Vec<Point>,
            next_index: usize,
            members: FxHashSet<Point>,
        }

        struct DfsFrame {
            cell: Point,
            neighbours: Vec<Point>,
            next: usize,
        }

        let mut st = State {
            index: FxHashMap::default(),
            lowlink: FxHashMap::default(),
            on_stack: FxHashSet::default(),
            stack: Vec::new(),
            next_index: 0,
            members: FxHashSet::default(),
        };

        let mut roots: Vec<Point> = self.formulas().collect();
        roots.sort();

        for root in roots {
            if st.index.contains_key(&root) {
                continue;
            }
            let mut dfs: Vec<DfsFrame> = vec![DfsFrame {
                cell: root,
                neighbours: self.pred_formulas(root),
                next: 0,
            }];
            st.index.insert(root, st.next_index);
            st.lowlink.insert(root, st.next_index);
            st.next_index += 1;
            st.stack.push(root);
            st.on_stack.insert(root);

            while let Some(frame) = dfs.last_mut() {
                if frame.next < frame.neighbours.len() {
                    let n = frame.neighbours[frame.next];
                    frame.next += 1;
                    if !st.index.contains_key(&n) {
                        st.index.insert(n, st.next_index);
                        st.lowlink.insert(n, st.next_index);
                        st.next_index += 1;
                        st.stack.push(n);
                        st.on_stack.insert(n);
                        dfs.push(DfsFrame {
                            cell: n,
                            neighbours: self.pred_formulas(n),
                            next: 0,
                        });
                    } else if st.on_stack.contains(&n) {
                        let nl = st.index[&n];
                        if let Some(l) = st.lowlink.get_mut(&frame.cell) {
                            *l = (*l).min(nl);
                        }
                    }
                } else {
                    let Some(frame) = dfs.pop() else { break };
                    let cell = frame.cell;
                    if st.lowlink[&cell] == st.index[&cell] {
                        // pop the component rooted here
                        let mut component = Vec::new();
                        while let Some(top) = st.stack.pop() {
                            st.on_stack.remove(&top);
                            component.push(top);
                            if top == cell {
                                break;
                            }
                        }
                        let self_loop = component.len() == 1
                            && self
                                .preds
                                .get(&component[0])
                                .is_some_and(|d| d.covers_rect(self.extent_of(component[0])));
                        if component.len() > 1 || self_loop {
                            st.members.extend(component);
                        }
                    }
                    if let Some(parent) = dfs.last() {
                        let child_low = st.lowlink[&cell];
                        if let Some(l) = st.lowlink.get_mut(&parent.cell) {
                            *l = (*l).min(child_low);
                        }
                    }
                }
            }
        }
        st.members
    }

}
