use crate::{Cell, Columns, Point, RasterSize, Rows};

/// A rectangle in fractional pixel coordinates of a source raster, produced by
/// the raster coordinate transformer. `ul` is the north-west corner in pixel
/// space (smallest row and column), `lr` the south-east corner.
/// Pixels that fall outside the projected area are represented as
/// `Option::<SourceArea>::None` by the producers, so a `SourceArea` value is
/// always a valid non-empty rectangle: `ul.x() <= lr.x()` and `ul.y() <= lr.y()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceArea {
    pub ul: Point,
    pub lr: Point,
}

impl SourceArea {
    pub fn from_points(p1: Point, p2: Point) -> Self {
        SourceArea {
            ul: Point::new(p1.x().min(p2.x()), p1.y().min(p2.y())),
            lr: Point::new(p1.x().max(p2.x()), p1.y().max(p2.y())),
        }
    }

    /// Smallest area containing both operands.
    pub fn envelope(&self, other: &SourceArea) -> SourceArea {
        SourceArea {
            ul: Point::new(self.ul.x().min(other.ul.x()), self.ul.y().min(other.ul.y())),
            lr: Point::new(self.lr.x().max(other.lr.x()), self.lr.y().max(other.lr.y())),
        }
    }
}

/// A pixel aligned rectangle within a raster: the unit of work distribution
/// and of windowed raster I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub ul: Cell,
    pub size: RasterSize,
}

impl Window {
    pub const fn new(ul: Cell, size: RasterSize) -> Self {
        Window { ul, size }
    }

    /// Construct from inclusive corner cells.
    pub fn from_corners(ul: Cell, lr: Cell) -> Self {
        Window {
            ul,
            size: RasterSize::with_rows_cols(Rows(lr.row - ul.row + 1), Columns(lr.col - ul.col + 1)),
        }
    }

    pub fn rows(&self) -> i32 {
        self.size.rows.count()
    }

    pub fn cols(&self) -> i32 {
        self.size.cols.count()
    }

    /// Inclusive south-east corner.
    pub fn lr(&self) -> Cell {
        Cell::from_row_col(self.ul.row + self.rows() - 1, self.ul.col + self.cols() - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.size.cell_count()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row >= self.ul.row && cell.col >= self.ul.col && cell.row <= self.lr().row && cell.col <= self.lr().col
    }

    pub fn intersects(&self, other: &Window) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.ul.row <= other.lr().row
            && self.lr().row >= other.ul.row
            && self.ul.col <= other.lr().col
            && self.lr().col >= other.ul.col
    }

    /// Intersection of both windows, the empty window when they do not overlap.
    pub fn intersection(&self, other: &Window) -> Window {
        if !self.intersects(other) {
            return Window::new(Cell::default(), RasterSize::empty());
        }

        let ul = Cell::from_row_col(self.ul.row.max(other.ul.row), self.ul.col.max(other.ul.col));
        let lr = Cell::from_row_col(self.lr().row.min(other.lr().row), self.lr().col.min(other.lr().col));
        Window::from_corners(ul, lr)
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}]", self.ul, self.size)
    }
}
