use std::sync::Arc;

use crate::projection::{Projection, ProjectionRef};
use crate::{Cell, Point, RasterSize, Window};

/// Immutable description of a georeferenced raster: dimensions, placement in
/// the world and pixel storage properties.
///
/// Pixels are square with edge length `pixel_size` in world units. The world
/// y axis increases northward while pixel rows increase southward; the
/// conversion `world_y = top_left.y - row * pixel_size` is encoded here and
/// nowhere else.
#[derive(Debug, Clone)]
pub struct GeoReference {
    projection: ProjectionRef,
    size: RasterSize,
    top_left: Point,
    pixel_size: f64,
    nodata: Option<f64>,
    band_count: usize,
    data_type: crate::PixelType,
}

impl GeoReference {
    pub fn new(
        projection: Projection,
        size: RasterSize,
        top_left: Point,
        pixel_size: f64,
        nodata: Option<f64>,
        band_count: usize,
        data_type: crate::PixelType,
    ) -> Self {
        GeoReference {
            projection: Arc::new(projection),
            size,
            top_left,
            pixel_size,
            nodata,
            band_count,
            data_type,
        }
    }

    /// Same placement and storage properties, different projection and location.
    pub fn warped_to(&self, projection: Projection, size: RasterSize, top_left: Point, pixel_size: f64) -> Self {
        GeoReference {
            projection: Arc::new(projection),
            size,
            top_left,
            pixel_size,
            nodata: self.nodata,
            band_count: self.band_count,
            data_type: self.data_type,
        }
    }

    pub fn projection(&self) -> &ProjectionRef {
        &self.projection
    }

    pub fn raster_size(&self) -> RasterSize {
        self.size
    }

    pub fn rows(&self) -> i32 {
        self.size.rows.count()
    }

    pub fn columns(&self) -> i32 {
        self.size.cols.count()
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    pub fn data_type(&self) -> crate::PixelType {
        self.data_type
    }

    /// World coordinate of the north-west corner of a pixel.
    pub fn cell_corner(&self, cell: Cell) -> Point {
        Point::new(
            self.top_left.x() + cell.col as f64 * self.pixel_size,
            self.top_left.y() - cell.row as f64 * self.pixel_size,
        )
    }

    /// The window covering the entire raster.
    pub fn full_window(&self) -> Window {
        Window::new(Cell::from_row_col(0, 0), self.size)
    }

    /// Whether the window lies fully within this raster.
    pub fn contains_window(&self, window: &Window) -> bool {
        window.ul.is_valid() && window.lr().row < self.rows() && window.lr().col < self.columns()
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.band_count * self.data_type.bytes_per_sample()
    }
}
