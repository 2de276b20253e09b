//! Pixel-space rectangles and the chunk partitioner.
//!
//! Rectangles are half-open on both axes: a rectangle covers the pixels
//! `left_top.x..right_bottom.x` by `left_top.y..right_bottom.y`.

use ndarray::Array2;

use crate::error::{Result, TifgridError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

impl Point {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A non-empty axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rectangle {
    left_top: Point,
    right_bottom: Point,
}

impl Rectangle {
    pub fn new(left_top: Point, right_bottom: Point) -> Result<Self> {
        if left_top.x >= right_bottom.x || left_top.y >= right_bottom.y {
            return Err(TifgridError::InvalidRectangle {
                left_top: (left_top.x, left_top.y),
                right_bottom: (right_bottom.x, right_bottom.y),
            });
        }
        Ok(Self {
            left_top,
            right_bottom,
        })
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Result<Self> {
        Self::new(
            origin,
            Point::new(origin.x + size.width, origin.y + size.height),
        )
    }

    /// The rectangle `[0, 0]..[width, height]`.
    pub fn from_size(size: Size) -> Result<Self> {
        Self::from_origin_size(Point::default(), size)
    }

    pub fn left_top(&self) -> Point {
        self.left_top
    }

    pub fn right_bottom(&self) -> Point {
        self.right_bottom
    }

    pub fn width(&self) -> usize {
        self.right_bottom.x - self.left_top.x
    }

    pub fn height(&self) -> usize {
        self.right_bottom.y - self.left_top.y
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn area(&self) -> usize {
        self.size().area()
    }

    /// Whether `other` lies completely inside this rectangle.
    pub fn contains(&self, other: &Rectangle) -> bool {
        other.left_top.x >= self.left_top.x
            && other.left_top.y >= self.left_top.y
            && other.right_bottom.x <= self.right_bottom.x
            && other.right_bottom.y <= self.right_bottom.y
    }

    /// Express this rectangle relative to `origin`, which must not lie to
    /// the right of or below `left_top`.
    pub fn relative_to(&self, origin: Point) -> Rectangle {
        Rectangle {
            left_top: Point::new(self.left_top.x - origin.x, self.left_top.y - origin.y),
            right_bottom: Point::new(
                self.right_bottom.x - origin.x,
                self.right_bottom.y - origin.y,
            ),
        }
    }
}

/// Overlap of two rectangles, `None` unless they share interior area.
pub fn intersect(first: &Rectangle, second: &Rectangle) -> Option<Rectangle> {
    let left_top = Point::new(
        first.left_top.x.max(second.left_top.x),
        first.left_top.y.max(second.left_top.y),
    );
    let right_bottom = Point::new(
        first.right_bottom.x.min(second.right_bottom.x),
        first.right_bottom.y.min(second.right_bottom.y),
    );
    Rectangle::new(left_top, right_bottom).ok()
}

/// One cell produced by [`partition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Absolute position of the chunk footprint, overlap included.
    pub offset: Point,
    pub size: Size,
    /// `(i, j)` position in the chunk grid, `i` along x.
    pub grid_index: (usize, usize),
}

impl Chunk {
    pub fn rect(&self) -> Rectangle {
        Rectangle {
            left_top: self.offset,
            right_bottom: Point::new(
                self.offset.x + self.size.width,
                self.offset.y + self.size.height,
            ),
        }
    }
}

/// Split `rect` into `grid.0 × grid.1` chunks indexed `[i, j]`.
///
/// Without overlap the chunks tile `rect` exactly; the first `size % n`
/// chunks on each axis are one pixel larger. With `overlap > 0` every
/// footprint grows by `overlap / 2` towards the origin and by the rest
/// away from it, clamped to `rect`. Grids with more cells than pixels on
/// an axis are rejected, as they would produce empty chunks.
pub fn partition(rect: &Rectangle, grid: (usize, usize), overlap: usize) -> Result<Array2<Chunk>> {
    let (nx, ny) = grid;
    let size = rect.size();
    if nx < 1
        || ny < 1
        || nx > size.width
        || ny > size.height
        || overlap > size.width
        || overlap > size.height
    {
        return Err(TifgridError::CannotPartition {
            size,
            grid,
            overlap,
        });
    }

    let columns = axis_spans(rect.left_top.x, size.width, nx, overlap);
    let rows = axis_spans(rect.left_top.y, size.height, ny, overlap);

    Ok(Array2::from_shape_fn((nx, ny), |(i, j)| {
        let (x, width) = columns[i];
        let (y, height) = rows[j];
        Chunk {
            offset: Point::new(x, y),
            size: Size::new(width, height),
            grid_index: (i, j),
        }
    }))
}

/// `(start, length)` of each of `count` spans over `start..start + length`.
fn axis_spans(start: usize, length: usize, count: usize, overlap: usize) -> Vec<(usize, usize)> {
    let base = length / count;
    let remainder = length % count;
    let end = start + length;
    let before = overlap / 2;
    let after = overlap - before;

    (0..count)
        .map(|k| {
            let span_start = start + k * base + k.min(remainder);
            let span_end = span_start + base + usize::from(k < remainder);
            let grown_start = span_start.saturating_sub(before).max(start);
            let grown_end = (span_end + after).min(end);
            (grown_start, grown_end - grown_start)
        })
        .collect()
}
