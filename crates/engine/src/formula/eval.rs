// Formula evaluator - walks the AST against a cell lookup, producing a
// scalar or a rectangular array (the spill source).

use ordered_float::OrderedFloat;

use crate::geom::{Point, Rect, Size};
use crate::value::{ErrorValue, Scalar};

use super::parser::{Expr, Op};
use super::refs::range_rect;

/// Largest array an expression may materialize (1024 x 1024). Elementwise
/// work on anything bigger could never spill into a real sheet anyway;
/// aggregates stream ranges and are not subject to this bound.
const MAX_ARRAY_CELLS: u64 = 1 << 20;

/// Read access the evaluator needs. The sheet implements this; tests use a
/// plain map.
pub trait CellLookup {
    fn value_at(&self, p: Point) -> Scalar;

    /// The non-empty cells inside `rect`, in any order. Lets aggregates
    /// walk sparse ranges without touching every addressable coordinate.
    fn occupied_in(&self, rect: Rect) -> Vec<(Point, Scalar)>;
}

/// A dense row-major block of scalars produced by an array expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    size: Size,
    values: Vec<Scalar>,
}

impl Array {
    pub fn new(size: Size, values: Vec<Scalar>) -> Self {
        debug_assert_eq!(size.cell_count(), values.len() as u64);
        Self { size, values }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn get(&self, x: u32, y: u32) -> &Scalar {
        &self.values[(y as usize) * (self.size.width as usize) + x as usize]
    }

    pub fn top_left(&self) -> Scalar {
        self.values.first().cloned().unwrap_or_default()
    }
}

/// Evaluation result: a single scalar, or an array to spill.
#[derive(Debug, Clone, PartialEq)]
pub enum Computed {
    Scalar(Scalar),
    Array(Array),
}

impl Computed {
    fn error(e: ErrorValue) -> Self {
        Computed::Scalar(Scalar::Error(e))
    }

    /// The value reported at the anchor cell.
    pub fn anchor_value(&self) -> Scalar {
        match self {
            Computed::Scalar(s) => s.clone(),
            Computed::Array(a) => a.top_left(),
        }
    }
}

/// Evaluate an expression. Spreadsheet-level failures come back as
/// `Error(...)` scalars, never as a Rust error.
pub fn evaluate(expr: &Expr, lookup: &impl CellLookup) -> Computed {
    match expr {
        Expr::Number(n) => Computed::Scalar(Scalar::number(*n)),
        Expr::Text(s) => Computed::Scalar(Scalar::Text(s.clone())),
        Expr::Boolean(b) => Computed::Scalar(Scalar::Bool(*b)),
        Expr::Empty => Computed::Scalar(Scalar::Blank),
        Expr::RefError => Computed::error(ErrorValue::INVALID_REFERENCE),
        Expr::Cell(r) => Computed::Scalar(lookup.value_at(Point::new(r.x, r.y))),
        Expr::Range(r) => materialize_range(range_rect(r), lookup),
        Expr::Negate(inner) => map_unary(evaluate(inner, lookup), |s| {
            to_number(s).map_or_else(Scalar::Error, |n| Scalar::number(-n))
        }),
        Expr::Percent(inner) => map_unary(evaluate(inner, lookup), |s| {
            to_number(s).map_or_else(Scalar::Error, |n| Scalar::number(n / 100.0))
        }),
        Expr::BinaryOp { op, left, right } => {
            let l = evaluate(left, lookup);
            let r = evaluate(right, lookup);
            broadcast_binary(l, r, |a, b| apply_op(*op, a, b))
        }
        Expr::Function { name, args } => call_function(name, args, lookup),
    }
}

fn materialize_range(rect: Rect, lookup: &impl CellLookup) -> Computed {
    if rect.size.cell_count() > MAX_ARRAY_CELLS {
        return Computed::error(ErrorValue::INVALID_VALUE);
    }
    let values = rect.points().map(|p| lookup.value_at(p)).collect();
    Computed::Array(Array::new(rect.size, values))
}

fn map_unary(v: Computed, f: impl Fn(&Scalar) -> Scalar) -> Computed {
    match v {
        Computed::Scalar(s) => Computed::Scalar(f(&s)),
        Computed::Array(a) => {
            let values = a.values.iter().map(&f).collect();
            Computed::Array(Array::new(a.size, values))
        }
    }
}

/// Elementwise combination with spreadsheet broadcasting: a dimension of 1
/// stretches to match; positions outside a smaller operand yield `#N/A`.
fn broadcast_binary(l: Computed, r: Computed, f: impl Fn(&Scalar, &Scalar) -> Scalar) -> Computed {
    match (l, r) {
        (Computed::Scalar(a), Computed::Scalar(b)) => Computed::Scalar(f(&a, &b)),
        (l, r) => {
            let (lw, lh) = computed_dims(&l);
            let (rw, rh) = computed_dims(&r);
            let width = lw.max(rw);
            let height = lh.max(rh);
            let size = Size::new(width, height);
            if size.cell_count() > MAX_ARRAY_CELLS {
                return Computed::error(ErrorValue::INVALID_VALUE);
            }
            let mut values = Vec::with_capacity(size.cell_count() as usize);
            for y in 0..height {
                for x in 0..width {
                    let a = computed_element(&l, x, y);
                    let b = computed_element(&r, x, y);
                    values.push(match (a, b) {
                        (Some(a), Some(b)) => f(a, b),
                        _ => Scalar::Error(ErrorValue::INVALID_ARGS),
                    });
                }
            }
            Computed::Array(Array::new(size, values))
        }
    }
}

fn computed_dims(v: &Computed) -> (u32, u32) {
    match v {
        Computed::Scalar(_) => (1, 1),
        Computed::Array(a) => (a.size.width, a.size.height),
    }
}

fn computed_element(v: &Computed, x: u32, y: u32) -> Option<&Scalar> {
    match v {
        Computed::Scalar(s) => Some(s),
        Computed::Array(a) => {
            let ax = if a.size.width == 1 { 0 } else { x };
            let ay = if a.size.height == 1 { 0 } else { y };
            if ax < a.size.width && ay < a.size.height {
                Some(a.get(ax, ay))
            } else {
                None
            }
        }
    }
}

// =============================================================================
// Scalar operator semantics
// =============================================================================

fn to_number(s: &Scalar) -> Result<f64, ErrorValue> {
    match s {
        Scalar::Number(n) => Ok(*n),
        Scalar::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Scalar::Blank => Ok(0.0),
        Scalar::Text(t) if t.is_empty() => Ok(0.0),
        Scalar::Text(t) => t.trim().parse().map_err(|_| ErrorValue::INVALID_VALUE),
        Scalar::Error(e) => Err(*e),
    }
}

fn to_text(s: &Scalar) -> Result<String, ErrorValue> {
    match s {
        Scalar::Text(t) => Ok(t.clone()),
        Scalar::Number(n) => Ok(super::parser::format_number(*n)),
        Scalar::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Scalar::Blank => Ok(String::new()),
        Scalar::Error(e) => Err(*e),
    }
}

fn to_bool(s: &Scalar) -> Result<bool, ErrorValue> {
    match s {
        Scalar::Bool(b) => Ok(*b),
        Scalar::Number(n) => Ok(*n != 0.0),
        Scalar::Blank => Ok(false),
        Scalar::Text(t) => match t.to_uppercase().as_str() {
            "TRUE" => Ok(true),
            "FALSE" => Ok(false),
            _ => Err(ErrorValue::INVALID_VALUE),
        },
        Scalar::Error(e) => Err(*e),
    }
}

fn apply_op(op: Op, a: &Scalar, b: &Scalar) -> Scalar {
    match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => arithmetic(op, a, b),
        Op::Concat => match (to_text(a), to_text(b)) {
            (Ok(x), Ok(y)) => Scalar::Text(x + &y),
            (Err(e), _) | (_, Err(e)) => Scalar::Error(e),
        },
        Op::Lt | Op::Gt | Op::Eq | Op::LtEq | Op::GtEq | Op::NotEq => compare(op, a, b),
    }
}

fn arithmetic(op: Op, a: &Scalar, b: &Scalar) -> Scalar {
    let (x, y) = match (to_number(a), to_number(b)) {
        (Ok(x), Ok(y)) => (x, y),
        (Err(e), _) | (_, Err(e)) => return Scalar::Error(e),
    };
    match op {
        Op::Add => Scalar::number(x + y),
        Op::Sub => Scalar::number(x - y),
        Op::Mul => Scalar::number(x * y),
        Op::Div => {
            if y == 0.0 {
                Scalar::Error(ErrorValue::DIVISION_BY_ZERO)
            } else {
                Scalar::number(x / y)
            }
        }
        Op::Pow => Scalar::number(x.powf(y)),
        _ => unreachable!("arithmetic called with non-arithmetic op"),
    }
}

fn compare(op: Op, a: &Scalar, b: &Scalar) -> Scalar {
    use std::cmp::Ordering;

    if let Scalar::Error(e) = a {
        return Scalar::Error(*e);
    }
    if let Scalar::Error(e) = b {
        return Scalar::Error(*e);
    }

    // Blank coerces to the other operand's zero value; across types the
    // order is number < text < boolean, as spreadsheets sort them.
    let ord = match (a, b) {
        (Scalar::Number(x), Scalar::Number(y)) => {
            OrderedFloat(*x).cmp(&OrderedFloat(*y))
        }
        (Scalar::Text(x), Scalar::Text(y)) => x.to_uppercase().cmp(&y.to_uppercase()),
        (Scalar::Bool(x), Scalar::Bool(y)) => x.cmp(y),
        (Scalar::Blank, Scalar::Blank) => Ordering::Equal,
        (Scalar::Blank, other) => return compare(op, &zero_of(other), other),
        (other, Scalar::Blank) => return compare(op, other, &zero_of(other)),
        _ => type_rank(a).cmp(&type_rank(b)),
    };

    let result = match op {
        Op::Lt => ord == Ordering::Less,
        Op::Gt => ord == Ordering::Greater,
        Op::Eq => ord == Ordering::Equal,
        Op::LtEq => ord != Ordering::Greater,
        Op::GtEq => ord != Ordering::Less,
        Op::NotEq => ord != Ordering::Equal,
        _ => unreachable!("compare called with non-comparison op"),
    };
    Scalar::Bool(result)
}

fn zero_of(s: &Scalar) -> Scalar {
    match s {
        Scalar::Text(_) => Scalar::Text(String::new()),
        Scalar::Bool(_) => Scalar::Bool(false),
        _ => Scalar::Number(0.0),
    }
}

fn type_rank(s: &Scalar) -> u8 {
    match s {
        Scalar::Blank | Scalar::Number(_) => 0,
        Scalar::Text(_) => 1,
        Scalar::Bool(_) => 2,
        Scalar::Error(_) => 3,
    }
}

// =============================================================================
// Functions
// =============================================================================

fn call_function(name: &str, args: &[Expr], lookup: &impl CellLookup) -> Computed {
    match name {
        "SUM" => fold_numbers(args, lookup, |nums| {
            Scalar::number(nums.iter().sum())
        }),
        "COUNT" => fold_numbers(args, lookup, |nums| Scalar::number(nums.len() as f64)),
        "AVERAGE" => fold_numbers(args, lookup, |nums| {
            if nums.is_empty() {
                Scalar::Error(ErrorValue::DIVISION_BY_ZERO)
            } else {
                Scalar::number(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }),
        "MIN" => fold_numbers(args, lookup, |nums| {
            nums.iter()
                .copied()
                .min_by_key(|&n| OrderedFloat(n))
                .map_or(Scalar::Number(0.0), Scalar::number)
        }),
        "MAX" => fold_numbers(args, lookup, |nums| {
            nums.iter()
                .copied()
                .max_by_key(|&n| OrderedFloat(n))
                .map_or(Scalar::Number(0.0), Scalar::number)
        }),
        "IF" => eval_if(args, lookup),
        "ABS" => one_number_arg(args, lookup, |n| Scalar::number(n.abs())),
        "ROUND" => eval_round(args, lookup),
        _ => Computed::error(ErrorValue::INVALID_NAME),
    }
}

/// Gather the numeric values of aggregate arguments.
///
/// Range and array arguments contribute their numeric elements and skip
/// text, booleans and blanks; direct scalar arguments are coerced. Any
/// error value aborts the fold.
fn fold_numbers(
    args: &[Expr],
    lookup: &impl CellLookup,
    f: impl FnOnce(Vec<f64>) -> Scalar,
) -> Computed {
    let mut nums = Vec::new();
    for arg in args {
        match arg {
            Expr::Empty => {}
            Expr::Range(r) => {
                for (_, v) in lookup.occupied_in(range_rect(r)) {
                    match v {
                        Scalar::Number(n) => nums.push(n),
                        Scalar::Error(e) => return Computed::error(e),
                        _ => {}
                    }
                }
            }
            _ => match evaluate(arg, lookup) {
                Computed::Scalar(s) => match s {
                    Scalar::Blank => {}
                    Scalar::Error(e) => return Computed::error(e),
                    other => match to_number(&other) {
                        Ok(n) => nums.push(n),
                        Err(e) => return Computed::error(e),
                    },
                },
                Computed::Array(a) => {
                    for v in &a.values {
                        match v {
                            Scalar::Number(n) => nums.push(*n),
                            Scalar::Error(e) => return Computed::error(*e),
                            _ => {}
                        }
                    }
                }
            },
        }
    }
    Computed::Scalar(f(nums))
}

fn eval_if(args: &[Expr], lookup: &impl CellLookup) -> Computed {
    if args.len() < 2 || args.len() > 3 {
        return Computed::error(ErrorValue::INVALID_ARGS);
    }
    let cond = match evaluate(&args[0], lookup).anchor_value() {
        Scalar::Error(e) => return Computed::error(e),
        s => match to_bool(&s) {
            Ok(b) => b,
            Err(e) => return Computed::error(e),
        },
    };
    if cond {
        evaluate(&args[1], lookup)
    } else if let Some(else_arg) = args.get(2) {
        evaluate(else_arg, lookup)
    } else {
        Computed::Scalar(Scalar::Bool(false))
    }
}

fn one_number_arg(
    args: &[Expr],
    lookup: &impl CellLookup,
    f: impl Fn(f64) -> Scalar,
) -> Computed {
    if args.len() != 1 {
        return Computed::error(ErrorValue::INVALID_ARGS);
    }
    map_unary(evaluate(&args[0], lookup), |s| {
        to_number(s).map_or_else(Scalar::Error, &f)
    })
}

fn eval_round(args: &[Expr], lookup: &impl CellLookup) -> Computed {
    if args.is_empty() || args.len() > 2 {
        return Computed::error(ErrorValue::INVALID_ARGS);
    }
    let digits = match args.get(1) {
        None => 0.0,
        Some(arg) => match to_number(&evaluate(arg, lookup).anchor_value()) {
            Ok(n) => n.trunc(),
            Err(e) => return Computed::error(e),
        },
    };
    let factor = 10f64.powf(digits);
    map_unary(evaluate(&args[0], lookup), |s| {
        to_number(s).map_or_else(Scalar::Error, |n| {
            // round half away from zero
            Scalar::number((n * factor).abs().round().copysign(n) / factor)
        })
    })
}
