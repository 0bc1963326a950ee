//! Integer geometry used by the toolkit binding.
//!
//! [`Region`] is a list of non-overlapping rectangles, enough to express damage regions,
//! window clip paths and the results of subtracting one from the other.

use std::fmt;

/// A point in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    /// Horizontal coordinate
    pub x: i32,
    /// Vertical coordinate
    pub y: i32,
}

impl Point {
    /// Creates a point
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    /// Sum of the absolute coordinates
    #[must_use]
    pub fn manhattan_length(&self) -> i32 {
        self.x.abs() + self.y.abs()
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A size in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

impl Size {
    /// Creates a size
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Size { width, height }
    }

    /// Returns true if either dimension is not positive
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

impl Rect {
    /// Creates a rectangle
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle at `origin` with `size`
    #[must_use]
    pub const fn from_size(origin: Point, size: Size) -> Self {
        Rect::new(origin.x, origin.y, size.width, size.height)
    }

    /// Top left corner
    #[must_use]
    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Size of the rectangle
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Exclusive right edge
    #[must_use]
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    #[must_use]
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Returns true if the rectangle covers no pixel
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }

    /// Returns true if `point` lies inside
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Overlap of both rectangles, if any
    #[must_use]
    pub fn intersected(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let rect = Rect::new(x, y, right - x, bottom - y);
        (!rect.is_empty()).then_some(rect)
    }

    /// Parts of `self` not covered by `other`, as up to four rectangles
    fn subtracted(&self, other: &Rect) -> Vec<Rect> {
        let Some(hole) = self.intersected(other) else {
            return vec![*self];
        };

        let mut parts = Vec::with_capacity(4);
        // Full-width bands above and below the hole, then the sides next to it
        parts.push(Rect::new(self.x, self.y, self.width, hole.y - self.y));
        parts.push(Rect::new(self.x, hole.bottom(), self.width, self.bottom() - hole.bottom()));
        parts.push(Rect::new(self.x, hole.y, hole.x - self.x, hole.height));
        parts.push(Rect::new(hole.right(), hole.y, self.right() - hole.right(), hole.height));
        parts.retain(|r| !r.is_empty());
        parts
    }

    /// The rectangle with every coordinate multiplied by `factor` and rounded
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Rect {
        let scale = |v: i32| (f64::from(v) * factor).round() as i32;
        let x = scale(self.x);
        let y = scale(self.y);
        Rect::new(x, y, scale(self.right()) - x, scale(self.bottom()) - y)
    }
}

/// A set of pixels, stored as non-overlapping rectangles
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// The empty region
    #[must_use]
    pub fn new() -> Self {
        Region::default()
    }

    /// Rectangles making up the region
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Returns true if the region covers no pixel
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Number of covered pixels
    #[must_use]
    pub fn area(&self) -> i64 {
        self.rects
            .iter()
            .map(|r| i64::from(r.width) * i64::from(r.height))
            .sum()
    }

    /// Returns true if `point` is covered
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        self.rects.iter().any(|r| r.contains(point))
    }

    /// Smallest rectangle covering the whole region
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        let mut iter = self.rects.iter();
        let Some(first) = iter.next() else {
            return Rect::default();
        };
        let (mut x, mut y, mut right, mut bottom) = (first.x, first.y, first.right(), first.bottom());
        for r in iter {
            x = x.min(r.x);
            y = y.min(r.y);
            right = right.max(r.right());
            bottom = bottom.max(r.bottom());
        }
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Adds `rect` to the region
    #[must_use]
    pub fn united(&self, rect: Rect) -> Region {
        let mut rects = self.rects.clone();
        let mut pending = vec![rect];
        // Keep the stored rectangles disjoint by adding only the uncovered parts
        for existing in &self.rects {
            pending = pending.iter().flat_map(|p| p.subtracted(existing)).collect();
        }
        rects.extend(pending.into_iter().filter(|r| !r.is_empty()));
        Region { rects }
    }

    /// Removes every pixel of `other` from the region
    #[must_use]
    pub fn subtracted(&self, other: &Region) -> Region {
        let mut rects = self.rects.clone();
        for hole in &other.rects {
            rects = rects.iter().flat_map(|r| r.subtracted(hole)).collect();
        }
        Region { rects }
    }

    /// Region with every rectangle scaled by `factor`
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Region {
        self.rects
            .iter()
            .fold(Region::new(), |region, r| region.united(r.scaled(factor)))
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Region::new().united(rect)
    }
}
