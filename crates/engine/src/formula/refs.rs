//! Reference extraction and rewriting.
//!
//! Extraction feeds the dependency graph; rewriting keeps formulas tracking
//! their targets across structural edits. A reference whose target is
//! destroyed (deleted band, shifted past the sheet edge, copied out of the
//! sheet) collapses to [`Expr::RefError`] and evaluates to `#REF!`.

use rustc_hash::FxHashSet;

use crate::geom::{Axis, Point, Rect, Size, MAX_SIZE};

use super::parser::{CellRef, Expr, RangeRef};

/// The cells and ranges an expression reads.
#[derive(Debug, Default, Clone)]
pub struct RefSet {
    pub cells: FxHashSet<Point>,
    pub ranges: Vec<Rect>,
}

impl RefSet {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.ranges.is_empty()
    }
}

/// Collect every reference in `expr`.
pub fn extract_refs(expr: &Expr) -> RefSet {
    let mut refs = RefSet::default();
    collect_refs(expr, &mut refs);
    refs
}

fn collect_refs(expr: &Expr, refs: &mut RefSet) {
    match expr {
        Expr::Cell(r) => {
            refs.cells.insert(Point::new(r.x, r.y));
        }
        Expr::Range(r) => {
            refs.ranges.push(range_rect(r));
        }
        Expr::Function { args, .. } => {
            for arg in args {
                collect_refs(arg, refs);
            }
        }
        Expr::Negate(inner) | Expr::Percent(inner) => collect_refs(inner, refs),
        Expr::BinaryOp { left, right, .. } => {
            collect_refs(left, refs);
            collect_refs(right, refs);
        }
        Expr::Number(_) | Expr::Text(_) | Expr::Boolean(_) | Expr::RefError | Expr::Empty => {}
    }
}

pub fn range_rect(r: &RangeRef) -> Rect {
    Rect::new(
        Point::new(r.left(), r.top()),
        Size::new(r.width(), r.height()),
    )
}

/// Rewrite every reference node through `f`, leaving the rest of the tree
/// untouched.
fn map_ref_nodes(expr: &Expr, f: &mut impl FnMut(&Expr) -> Expr) -> Expr {
    match expr {
        Expr::Cell(_) | Expr::Range(_) => f(expr),
        Expr::Function { name, args } => Expr::Function {
            name: name.clone(),
            args: args.iter().map(|a| map_ref_nodes(a, f)).collect(),
        },
        Expr::Negate(inner) => Expr::Negate(Box::new(map_ref_nodes(inner, f))),
        Expr::Percent(inner) => Expr::Percent(Box::new(map_ref_nodes(inner, f))),
        Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
            op: *op,
            left: Box::new(map_ref_nodes(left, f)),
            right: Box::new(map_ref_nodes(right, f)),
        },
        other => other.clone(),
    }
}

fn coord(r: &CellRef, axis: Axis) -> u32 {
    match axis {
        Axis::Columns => r.x,
        Axis::Rows => r.y,
    }
}

fn with_coord(mut r: CellRef, axis: Axis, v: u32) -> CellRef {
    match axis {
        Axis::Columns => r.x = v,
        Axis::Rows => r.y = v,
    }
    r
}

/// Rewrite references for a deletion of `[start, start + count)` on `axis`.
///
/// Cell references inside the band die; references past it shift back.
/// Range endpoints clamp to the band edges, and a range swallowed whole
/// becomes a `#REF!`.
pub fn adjust_for_erase(expr: &Expr, axis: Axis, start: u32, count: u32) -> (Expr, bool) {
    let mut changed = false;
    let out = map_ref_nodes(expr, &mut |node| match node {
        Expr::Cell(r) => match erase_point(coord(r, axis), start, count) {
            Some(v) if v == coord(r, axis) => node.clone(),
            Some(v) => {
                changed = true;
                Expr::Cell(with_coord(*r, axis, v))
            }
            None => {
                changed = true;
                Expr::RefError
            }
        },
        Expr::Range(r) => {
            let s = coord(&r.start, axis);
            let e = coord(&r.end, axis);
            let new_s = erase_clamp_start(s, start, count);
            match erase_clamp_end(e, start, count) {
                Some(new_e) if new_s <= new_e => {
                    if new_s == s && new_e == e {
                        node.clone()
                    } else {
                        changed = true;
                        Expr::Range(RangeRef::new(
                            with_coord(r.start, axis, new_s),
                            with_coord(r.end, axis, new_e),
                        ))
                    }
                }
                _ => {
                    changed = true;
                    Expr::RefError
                }
            }
        }
        _ => node.clone(),
    });
    (out, changed)
}

fn erase_point(v: u32, start: u32, count: u32) -> Option<u32> {
    if v < start {
        Some(v)
    } else if v - start < count {
        None
    } else {
        Some(v - count)
    }
}

fn erase_clamp_start(v: u32, start: u32, count: u32) -> u32 {
    if v < start {
        v
    } else if v - start < count {
        start
    } else {
        v - count
    }
}

fn erase_clamp_end(v: u32, start: u32, count: u32) -> Option<u32> {
    if v < start {
        Some(v)
    } else if v - start < count {
        start.checked_sub(1)
    } else {
        Some(v - count)
    }
}

/// Rewrite references for an insertion of `count` indices at `start` on
/// `axis`. A reference pushed past the sheet edge becomes `#REF!`; a range
/// whose far endpoint is pushed out clips to the edge.
pub fn adjust_for_insert(expr: &Expr, axis: Axis, start: u32, count: u32) -> (Expr, bool) {
    let limit = axis.limit();
    let mut changed = false;
    let out = map_ref_nodes(expr, &mut |node| match node {
        Expr::Cell(r) => match insert_point(coord(r, axis), start, count, limit) {
            Some(v) if v == coord(r, axis) => node.clone(),
            Some(v) => {
                changed = true;
                Expr::Cell(with_coord(*r, axis, v))
            }
            None => {
                changed = true;
                Expr::RefError
            }
        },
        Expr::Range(r) => {
            let s = coord(&r.start, axis);
            let e = coord(&r.end, axis);
            match insert_point(s, start, count, limit) {
                None => {
                    changed = true;
                    Expr::RefError
                }
                Some(new_s) => {
                    let new_e = insert_point(e, start, count, limit).unwrap_or(limit - 1);
                    if new_s == s && new_e == e {
                        node.clone()
                    } else {
                        changed = true;
                        Expr::Range(RangeRef::new(
                            with_coord(r.start, axis, new_s),
                            with_coord(r.end, axis, new_e),
                        ))
                    }
                }
            }
        }
        _ => node.clone(),
    });
    (out, changed)
}

fn insert_point(v: u32, start: u32, count: u32, limit: u32) -> Option<u32> {
    if v < start {
        return Some(v);
    }
    let shifted = u64::from(v) + u64::from(count);
    if shifted < u64::from(limit) {
        Some(shifted as u32)
    } else {
        None
    }
}

/// Rewrite references for a copy whose destination is offset `(dx, dy)`
/// from the source. Only relative axes move; a relative reference carried
/// off the sheet becomes `#REF!`.
pub fn adjust_for_copy(expr: &Expr, dx: i64, dy: i64) -> Expr {
    map_ref_nodes(expr, &mut |node| match node {
        Expr::Cell(r) => match offset_ref(r, dx, dy) {
            Some(r) => Expr::Cell(r),
            None => Expr::RefError,
        },
        Expr::Range(r) => match (offset_ref(&r.start, dx, dy), offset_ref(&r.end, dx, dy)) {
            (Some(s), Some(e)) => Expr::Range(RangeRef::new(s, e)),
            _ => Expr::RefError,
        },
        _ => node.clone(),
    })
}

fn offset_ref(r: &CellRef, dx: i64, dy: i64) -> Option<CellRef> {
    let x = if r.x_abs {
        i64::from(r.x)
    } else {
        i64::from(r.x) + dx
    };
    let y = if r.y_abs {
        i64::from(r.y)
    } else {
        i64::from(r.y) + dy
    };
    if x < 0 || x >= i64::from(MAX_SIZE.width) || y < 0 || y >= i64::from(MAX_SIZE.height) {
        return None;
    }
    Some(CellRef {
        x: x as u32,
        y: y as u32,
        x_abs: r.x_abs,
        y_abs: r.y_abs,
    })
}

/// Rewrite references after content moved from `src` by `(dx, dy)`.
///
/// References into the moved block follow it to the new location; a range
/// follows only when it lies entirely inside the block. The caller has
/// already validated that the destination fits the sheet.
pub fn adjust_for_move(expr: &Expr, src: Rect, dx: i64, dy: i64) -> (Expr, bool) {
    let mut changed = false;
    let shift = |r: &CellRef| -> CellRef {
        CellRef {
            x: (i64::from(r.x) + dx) as u32,
            y: (i64::from(r.y) + dy) as u32,
            x_abs: r.x_abs,
            y_abs: r.y_abs,
        }
    };
    let out = map_ref_nodes(expr, &mut |node| match node {
        Expr::Cell(r) => {
            if src.contains(Point::new(r.x, r.y)) {
                changed = true;
                Expr::Cell(shift(r))
            } else {
                node.clone()
            }
        }
        Expr::Range(r) => {
            let start_in = src.contains(Point::new(r.start.x, r.start.y));
            let end_in = src.contains(Point::new(r.end.x, r.end.y));
            if start_in && end_in {
                changed = true;
                Expr::Range(RangeRef::new(shift(&r.start), shift(&r.end)))
            } else {
                node.clone()
            }
        }
        _ => node.clone(),
    });
    (out, changed)
}
