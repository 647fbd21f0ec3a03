use serde::{Deserialize, Serialize};

use crate::formula::parser::{self, Expr};
use crate::geom::{Point, Size};
use crate::value::{ErrorValue, Scalar};

/// A stored formula. `text` is the canonical rendering of the expression
/// (no leading `=`); it is regenerated whenever structural edits rewrite
/// the tree, so the two never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    pub text: String,
    #[serde(skip)]
    pub ast: Option<Expr>,
    #[serde(skip)]
    pub cached: Scalar,
    /// Footprint of the last result, anchor included. `(1, 1)` for a
    /// scalar result, larger when the formula spilled.
    #[serde(skip, default = "Size::unit")]
    pub extent: Size,
}

impl Formula {
    /// Parse `text` into a formula. Unparseable input (including the empty
    /// string) is kept verbatim with no tree and an `#ERROR!` result.
    pub fn parse(text: &str) -> Self {
        match parser::parse(text) {
            Ok(expr) => Self {
                text: parser::format_expr(&expr),
                ast: Some(expr),
                cached: Scalar::Blank,
                extent: Size::unit(),
            },
            Err(_) => Self {
                text: text.to_string(),
                ast: None,
                cached: Scalar::Error(ErrorValue::INVALID_FORMULA),
                extent: Size::unit(),
            },
        }
    }

    /// Replace the tree after a structural rewrite, re-rendering the text.
    pub fn replace_ast(&mut self, expr: Expr) {
        self.text = parser::format_expr(&expr);
        self.ast = Some(expr);
    }

    /// Wrap an already-built tree, as copy produces.
    pub fn from_expr(expr: Expr) -> Self {
        Self {
            text: parser::format_expr(&expr),
            ast: Some(expr),
            cached: Scalar::Blank,
            extent: Size::unit(),
        }
    }
}

/// What a cell holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Cell {
    /// A literal entered value.
    Value(Scalar),
    /// A formula and its cached result.
    Formula(Formula),
    /// A cell covered by another formula's spill; `anchor` owns the
    /// formula, `value` is this cell's element of the array.
    Spill { anchor: Point, value: Scalar },
}

impl Cell {
    pub fn formula(text: &str) -> Self {
        Cell::Formula(Formula::parse(text))
    }

    /// The value this cell shows.
    pub fn local_value(&self) -> Scalar {
        match self {
            Cell::Value(v) => v.clone(),
            Cell::Formula(f) => f.cached.clone(),
            Cell::Spill { value, .. } => value.clone(),
        }
    }

    pub fn as_formula(&self) -> Option<&Formula> {
        match self {
            Cell::Formula(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_formula_mut(&mut self) -> Option<&mut Formula> {
        match self {
            Cell::Formula(f) => Some(f),
            _ => None,
        }
    }
}

/// Editing view of a formula cell: its canonical text and spill footprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaInfo {
    pub text: String,
    pub extent: Size,
}
