pub mod cell;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod geom;
pub mod grid;
pub mod metadata;
pub mod names;
pub mod recalc;
pub mod sheet;
pub mod structural;
pub mod value;

#[cfg(test)]
pub mod harness;

pub use cell::FormulaInfo;
pub use error::{EngineError, Result};
pub use geom::{Axis, Point, Rect, Size, MAX_SIZE};
pub use metadata::{LengthInfo, MetaRun};
pub use sheet::Sheet;
pub use value::{ErrorValue, Scalar};
