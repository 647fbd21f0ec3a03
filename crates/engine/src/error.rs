//! Engine-level call failures.
//!
//! These cover caller misuse only (coordinates or spans outside the valid
//! domain, shifts that would push content off the sheet). Spreadsheet-level
//! failures such as `#DIV/0!` are [`crate::value::ErrorValue`] scalars and
//! never surface here. A failed call performs no mutation.

use std::fmt;

use crate::geom::{Axis, Point, Rect};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A cell coordinate lies outside the sheet's addressable space.
    PointOutOfRange(Point),
    /// An area extends outside the sheet's addressable space.
    AreaOutOfRange(Rect),
    /// An index span `[start, start + count)` exceeds the axis limit.
    SpanOutOfRange { axis: Axis, start: u32, count: u32 },
    /// An insertion would shift existing content past the axis limit.
    ExtentOverflow(Axis),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::PointOutOfRange(p) => {
                write!(f, "cell ({}, {}) is outside the sheet", p.x, p.y)
            }
            EngineError::AreaOutOfRange(r) => write!(
                f,
                "area ({}, {}, {}, {}) extends outside the sheet",
                r.origin.x, r.origin.y, r.size.width, r.size.height
            ),
            EngineError::SpanOutOfRange { axis, start, count } => {
                let noun = match axis {
                    Axis::Columns => "columns",
                    Axis::Rows => "rows",
                };
                write!(f, "{} [{}, {}+{}) are outside the sheet", noun, start, start, count)
            }
            EngineError::ExtentOverflow(axis) => {
                let noun = match axis {
                    Axis::Columns => "columns",
                    Axis::Rows => "rows",
                };
                write!(f, "insertion would shift {} past the sheet edge", noun)
            }
        }
    }
}

impl std::error::Error for EngineError {}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Size;

    #[test]
    fn display_messages() {
        let e = EngineError::PointOutOfRange(Point::new(65_535, 0));
        assert_eq!(e.to_string(), "cell (65535, 0) is outside the sheet");

        let e = EngineError::AreaOutOfRange(Rect::new(Point::new(65_534, 0), Size::new(2, 2)));
        assert_eq!(e.to_string(), "area (65534, 0, 2, 2) extends outside the sheet");

        let e = EngineError::ExtentOverflow(Axis::Rows);
        assert_eq!(e.to_string(), "insertion would shift rows past the sheet edge");
    }
}
