//! Shared test fixtures.

use crate::geom::{Point, Rect};
use crate::names;
use crate::sheet::Sheet;

/// Parse a cell address like `"B2"`. Panics on bad input, which is what a
/// test wants.
pub fn at(name: &str) -> Point {
    names::parse_point(name).unwrap_or_else(|| panic!("bad cell address {:?}", name))
}

/// Parse an area like `"A1:C3"` (or a single cell).
pub fn area(name: &str) -> Rect {
    names::parse_area(name).unwrap_or_else(|| panic!("bad area {:?}", name))
}

/// Build a sheet seeded with literal cells. Values that parse as numbers
/// are stored numeric, everything else as text.
pub fn sheet_with(cells: &[(&str, &str)]) -> Sheet {
    let mut sheet = Sheet::new();
    for (name, raw) in cells {
        let p = at(name);
        match raw.parse::<f64>() {
            Ok(n) => sheet.set_value_cell(p, n).unwrap(),
            Err(_) => sheet.set_value_cell(p, *raw).unwrap(),
        }
    }
    sheet
}
