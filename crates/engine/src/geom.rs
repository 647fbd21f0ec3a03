//! Sheet geometry: points, sizes and rectangular areas.
//!
//! Coordinates are zero-based with `x` as the column axis and `y` as the
//! row axis. The addressable space is bounded by [`MAX_SIZE`]; every public
//! entry point validates against it before touching any state.

use serde::{Deserialize, Serialize};

/// Maximum sheet extent: 65535 columns by 2147483647 rows.
pub const MAX_SIZE: Size = Size {
    width: 65_535,
    height: 2_147_483_647,
};

/// One of the two sheet axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Columns,
    Rows,
}

impl Axis {
    /// Number of addressable indices along this axis.
    pub fn limit(self) -> u32 {
        match self {
            Axis::Columns => MAX_SIZE.width,
            Axis::Rows => MAX_SIZE.height,
        }
    }
}

/// A cell coordinate. `x` is the column, `y` is the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// True if the point addresses a cell inside [`MAX_SIZE`].
    pub fn is_valid(self) -> bool {
        self.x < MAX_SIZE.width && self.y < MAX_SIZE.height
    }
}

/// A width/height pair. Either dimension may be zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The 1x1 size of a single cell.
    pub const fn unit() -> Self {
        Self::new(1, 1)
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn cell_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A rectangular area: origin plus size, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// The single-cell rectangle at `p`.
    pub const fn cell(p: Point) -> Self {
        Self {
            origin: p,
            size: Size::new(1, 1),
        }
    }

    /// One past the last column covered.
    pub fn right(self) -> u64 {
        u64::from(self.origin.x) + u64::from(self.size.width)
    }

    /// One past the last row covered.
    pub fn bottom(self) -> u64 {
        u64::from(self.origin.y) + u64::from(self.size.height)
    }

    pub fn contains(self, p: Point) -> bool {
        u64::from(p.x) >= u64::from(self.origin.x)
            && u64::from(p.x) < self.right()
            && u64::from(p.y) >= u64::from(self.origin.y)
            && u64::from(p.y) < self.bottom()
    }

    pub fn intersects(self, other: Rect) -> bool {
        u64::from(self.origin.x) < other.right()
            && u64::from(other.origin.x) < self.right()
            && u64::from(self.origin.y) < other.bottom()
            && u64::from(other.origin.y) < self.bottom()
    }

    /// True if every covered cell lies inside [`MAX_SIZE`].
    pub fn fits_in_sheet(self) -> bool {
        self.origin.is_valid()
            && self.right() <= u64::from(MAX_SIZE.width)
            && self.bottom() <= u64::from(MAX_SIZE.height)
    }

    /// Iterate covered points in row-major order.
    pub fn points(self) -> impl Iterator<Item = Point> {
        let Rect { origin, size } = self;
        (origin.y..origin.y.saturating_add(size.height)).flat_map(move |y| {
            (origin.x..origin.x.saturating_add(size.width)).map(move |x| Point::new(x, y))
        })
    }
}
