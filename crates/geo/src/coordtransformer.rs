//! Maps destination raster pixels to the source raster area they cover.

use crate::projection::ProjectionRef;
use crate::{Cell, GeoReference, Point, SourceArea};

/// Tolerance in projected units for the forward/inverse round trip check that
/// rejects spurious mappings on the far side of global projections.
const ROUND_TRIP_TOLERANCE: f64 = 1e-4;

/// Transforms pixels of a destination grid to the area of source pixels that
/// contribute to them. Both grids are described by their projection, the world
/// coordinate of their upper-left pixel corner and their pixel size.
pub struct RasterCoordTransformer {
    dst_projection: ProjectionRef,
    dst_ul: Point,
    dst_pixel_size: f64,
    src_projection: ProjectionRef,
    src_ul: Point,
    src_pixel_size: f64,
    same_projection: bool,
}

impl RasterCoordTransformer {
    pub fn new(
        dst_projection: ProjectionRef,
        dst_ul: Point,
        dst_pixel_size: f64,
        src_projection: ProjectionRef,
        src_ul: Point,
        src_pixel_size: f64,
    ) -> Self {
        let same_projection = dst_projection.eq_definition(&src_projection);
        RasterCoordTransformer {
            dst_projection,
            dst_ul,
            dst_pixel_size,
            src_projection,
            src_ul,
            src_pixel_size,
            same_projection,
        }
    }

    /// Transformer between two full rasters, destination first.
    pub fn from_references(dst: &GeoReference, src: &GeoReference) -> Self {
        Self::new(
            dst.projection().clone(),
            dst.top_left(),
            dst.pixel_size(),
            src.projection().clone(),
            src.top_left(),
            src.pixel_size(),
        )
    }

    /// Maps a destination pixel to the source area covered by its footprint.
    ///
    /// The pixel is taken by its edges: the world coordinates of its
    /// upper-left and lower-right corners are sent through the destination
    /// inverse and the source forward transform, and the resulting source
    /// world coordinates are scaled to fractional source pixel coordinates.
    ///
    /// Returns `None` when the pixel lies outside the projected area of
    /// either system, which callers must treat as "write the fill value".
    pub fn transform(&self, dest_pixel: Cell) -> Option<SourceArea> {
        let col = dest_pixel.col as f64;
        let row = dest_pixel.row as f64;

        let ul_world = Point::new(
            col * self.dst_pixel_size + self.dst_ul.x(),
            self.dst_ul.y() - row * self.dst_pixel_size,
        );
        let lr_world = Point::new(
            (col + 1.0) * self.dst_pixel_size + self.dst_ul.x(),
            self.dst_ul.y() - (row + 1.0) * self.dst_pixel_size,
        );

        if !self.same_projection && !self.round_trip_is_stable(ul_world) {
            return None;
        }

        let ul_src = self.to_source_world(ul_world)?;
        let lr_src = self.to_source_world(lr_world)?;

        Some(SourceArea::from_points(
            self.source_world_to_pixel(ul_src),
            self.source_world_to_pixel(lr_src),
        ))
    }

    fn to_source_world(&self, world: Point) -> Option<Point> {
        if self.same_projection {
            return Some(world);
        }

        self.dst_projection.transform_point_to(&self.src_projection, world).ok()
    }

    fn source_world_to_pixel(&self, world: Point) -> Point {
        Point::new(
            (world.x() - self.src_ul.x()) / self.src_pixel_size,
            (self.src_ul.y() - world.y()) / self.src_pixel_size,
        )
    }

    /// Projecting the destination point to geographic coordinates and back
    /// must reproduce the point. Global projections fold coordinates beyond
    /// their domain onto valid locations, which this check filters out.
    fn round_trip_is_stable(&self, world: Point) -> bool {
        let Ok((lon, lat)) = self.dst_projection.inverse(world.x(), world.y()) else {
            return false;
        };
        let Ok(round_trip) = self.dst_projection.forward(lon, lat) else {
            return false;
        };

        (world.x() - round_trip.x()).abs() <= ROUND_TRIP_TOLERANCE && (world.y() - round_trip.y()).abs() <= ROUND_TRIP_TOLERANCE
    }
}
