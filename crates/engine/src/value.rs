//! Cell scalar values and spreadsheet error values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A spreadsheet error value, identified by a small integer code.
///
/// Equality and hashing are by code, so two constructions with the same
/// code are the same logical value. Codes outside the well-known table are
/// representable and display generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorValue(u32);

impl ErrorValue {
    pub const NULL_RANGE: ErrorValue = ErrorValue(1);
    pub const DIVISION_BY_ZERO: ErrorValue = ErrorValue(2);
    pub const INVALID_VALUE: ErrorValue = ErrorValue(3);
    pub const INVALID_REFERENCE: ErrorValue = ErrorValue(4);
    pub const INVALID_NAME: ErrorValue = ErrorValue(5);
    pub const NOT_A_NUMBER: ErrorValue = ErrorValue(6);
    pub const INVALID_ARGS: ErrorValue = ErrorValue(7);
    pub const GETTING_DATA: ErrorValue = ErrorValue(8);
    pub const SPILL: ErrorValue = ErrorValue(9);
    pub const INVALID_FORMULA: ErrorValue = ErrorValue(10);

    pub const fn from_code(code: u32) -> Self {
        Self(code)
    }

    pub const fn code(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NULL_RANGE => write!(f, "#NULL!"),
            Self::DIVISION_BY_ZERO => write!(f, "#DIV/0!"),
            Self::INVALID_VALUE => write!(f, "#VALUE!"),
            Self::INVALID_REFERENCE => write!(f, "#REF!"),
            Self::INVALID_NAME => write!(f, "#NAME?"),
            Self::NOT_A_NUMBER => write!(f, "#NUM!"),
            Self::INVALID_ARGS => write!(f, "#N/A"),
            Self::GETTING_DATA => write!(f, "#GETTING_DATA"),
            Self::SPILL => write!(f, "#SPILL!"),
            Self::INVALID_FORMULA => write!(f, "#ERROR!"),
            ErrorValue(code) => write!(f, "Unknown error: <{}>", code),
        }
    }
}

/// The value a cell holds or a formula produces.
///
/// `Blank` is the content of an unset cell; it is distinct from the number
/// zero and the empty string, though evaluation coerces it as needed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    #[default]
    Blank,
    Bool(bool),
    Number(f64),
    Text(String),
    Error(ErrorValue),
}

impl Scalar {
    /// Wrap a raw f64, mapping non-finite input to `#NUM!`.
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            Scalar::Number(n)
        } else {
            Scalar::Error(ErrorValue::NOT_A_NUMBER)
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Blank)
    }

    pub fn as_error(&self) -> Option<ErrorValue> {
        match self {
            Scalar::Error(e) => Some(*e),
            _ => None,
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::number(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<ErrorValue> for Scalar {
    fn from(e: ErrorValue) -> Self {
        Scalar::Error(e)
    }
}
