//! Conversion between cell indices and their display names.
//!
//! Columns use base-26 letters (A = 0, Z = 25, AA = 26), rows use 1-based
//! decimal. Formatting fails with a range error for out-of-domain indices;
//! parsing is total and reports malformed or out-of-domain text as `None`,
//! so callers can distinguish "not a reference" from "bad argument".

use crate::error::{EngineError, Result};
use crate::geom::{Axis, Point, Rect, Size, MAX_SIZE};

/// Render a zero-based column index as letters ("A", "Z", "AA", ...).
pub fn index_to_column(x: u32) -> Result<String> {
    if x >= MAX_SIZE.width {
        return Err(EngineError::SpanOutOfRange {
            axis: Axis::Columns,
            start: x,
            count: 1,
        });
    }
    let mut n = x + 1;
    let mut buf = [0u8; 7];
    let mut len = 0;
    while n > 0 {
        n -= 1;
        buf[len] = b'A' + (n % 26) as u8;
        len += 1;
        n /= 26;
    }
    buf[..len].reverse();
    // buf holds ASCII letters only
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

/// Render a zero-based row index as its 1-based decimal name.
pub fn index_to_row(y: u32) -> Result<String> {
    if y >= MAX_SIZE.height {
        return Err(EngineError::SpanOutOfRange {
            axis: Axis::Rows,
            start: y,
            count: 1,
        });
    }
    Ok((u64::from(y) + 1).to_string())
}

/// Parse a column name to its zero-based index.
///
/// Returns `None` for empty input, non-letter characters, or names past the
/// last addressable column.
pub fn parse_column(text: &str) -> Option<u32> {
    let (col, rest) = scan_column(text.as_bytes())?;
    rest.is_empty().then_some(col)
}

/// Parse a 1-based row name to its zero-based index.
///
/// Leading zeroes and values past the last addressable row are `None`.
pub fn parse_row(text: &str) -> Option<u32> {
    let (row, rest) = scan_row(text.as_bytes())?;
    rest.is_empty().then_some(row)
}

/// Parse a `"<col><row>"` cell name such as `"AA100"`.
pub fn parse_point(text: &str) -> Option<Point> {
    let (x, rest) = scan_column(text.as_bytes())?;
    let (y, rest) = scan_row(rest)?;
    rest.is_empty().then_some(Point::new(x, y))
}

/// Parse a cell or area name: `"A1"` or `"A1:B2"`.
///
/// A single cell parses to a `(1,1)` rectangle; corners normalize so the
/// origin is the top-left.
pub fn parse_area(text: &str) -> Option<Rect> {
    match text.split_once(':') {
        None => parse_point(text).map(Rect::cell),
        Some((first, second)) => {
            let a = parse_point(first)?;
            let b = parse_point(second)?;
            let left = a.x.min(b.x);
            let top = a.y.min(b.y);
            let right = a.x.max(b.x);
            let bottom = a.y.max(b.y);
            Some(Rect::new(
                Point::new(left, top),
                Size::new(right - left + 1, bottom - top + 1),
            ))
        }
    }
}

/// Consume a leading letter run; returns the column index and the rest.
fn scan_column(bytes: &[u8]) -> Option<(u32, &[u8])> {
    let mut col: u32 = 0;
    let mut used = 0;
    for &b in bytes {
        if !b.is_ascii_uppercase() {
            break;
        }
        col = col.checked_mul(26)?.checked_add(u32::from(b - b'A') + 1)?;
        if col > MAX_SIZE.width {
            return None;
        }
        used += 1;
    }
    if used == 0 {
        return None;
    }
    Some((col - 1, &bytes[used..]))
}

/// Consume a leading digit run; returns the zero-based row and the rest.
fn scan_row(bytes: &[u8]) -> Option<(u32, &[u8])> {
    let mut row: u64 = 0;
    let mut used = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            break;
        }
        if used == 0 && b == b'0' {
            return None;
        }
        row = row * 10 + u64::from(b - b'0');
        if row > u64::from(MAX_SIZE.height) {
            return None;
        }
        used += 1;
    }
    if used == 0 {
        return None;
    }
    Some(((row - 1) as u32, &bytes[used..]))
}
