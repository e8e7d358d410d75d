//! Footprint bounding box computation under a different projection.

use crate::coordtransformer::RasterCoordTransformer;
use crate::projection::Projection;
use crate::{Cell, Columns, Error, GeoReference, Point, RasterSize, Result, Rows, SourceArea, Window};

struct Extrema {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Extrema {
    fn new() -> Self {
        Extrema {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    fn update(&mut self, point: Point) {
        if !point.x().is_finite() || !point.y().is_finite() {
            return;
        }

        self.min_x = self.min_x.min(point.x());
        self.max_x = self.max_x.max(point.x());
        self.min_y = self.min_y.min(point.y());
        self.max_y = self.max_y.max(point.y());
    }

    fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }
}

/// Computes the axis-aligned bounding box of the source raster footprint in
/// the destination reference system and derives the destination raster from
/// it: the returned georeference has the destination projection, an
/// upper-left corner at the box's north-west corner and as many whole pixels
/// of `dst_pixel_size` as fit inside the box.
///
/// The four edges of the source footprint are walked at single pixel
/// resolution. Projections are non-linear, so corners alone would clip the
/// box on curved edges. Every sample is transformed along two paths: directly
/// from source to destination world coordinates, and through geographic
/// coordinates interpolated between the footprint corners. One path may fail
/// near the projection domain boundary where the other still succeeds; failed
/// samples are skipped.
pub fn projected_minbox(src: &GeoReference, dst_projection: Projection, dst_pixel_size: f64) -> Result<GeoReference> {
    let src_projection = src.projection();
    let rows = src.rows();
    let cols = src.columns();
    let pixel_size = src.pixel_size();
    let ul = src.top_left();

    if rows <= 0 || cols <= 0 {
        return Err(Error::EmptyFootprint);
    }

    // Identical reference systems keep the exact source extent; pushing the
    // coordinates through the transform engine would jitter the grid origin
    // by the round trip error.
    if src_projection.eq_definition(&dst_projection) {
        return Ok(src.warped_to(
            dst_projection,
            RasterSize::with_rows_cols(
                Rows(((rows as f64 * pixel_size) / dst_pixel_size).floor() as i32),
                Columns(((cols as f64 * pixel_size) / dst_pixel_size).floor() as i32),
            ),
            ul,
            dst_pixel_size,
        ));
    }

    // Geographic corners for the interpolated sampling path. When a corner
    // cannot be unprojected the interpolated path is skipped entirely.
    let geographic_corners = || -> Result<(f64, f64, f64, f64)> {
        let (ul_lon, ul_lat) = src_projection.inverse(ul.x(), ul.y())?;
        let (lr_lon, lr_lat) = src_projection.inverse(ul.x() + cols as f64 * pixel_size, ul.y() - rows as f64 * pixel_size)?;
        Ok((ul_lon, ul_lat, lr_lon, lr_lat))
    };
    let geographic = geographic_corners().ok();
    let (delta_east, delta_north) = match geographic {
        Some((ul_lon, ul_lat, lr_lon, lr_lat)) => ((lr_lon - ul_lon) / cols as f64, (ul_lat - lr_lat) / rows as f64),
        None => (0.0, 0.0),
    };

    let mut extrema = Extrema::new();

    let mut sample = |x: i32, y: i32| {
        let world = Point::new(ul.x() + x as f64 * pixel_size, ul.y() - y as f64 * pixel_size);
        if let Ok(projected) = src_projection.transform_point_to(&dst_projection, world) {
            extrema.update(projected);
        }

        if let Some((ul_lon, ul_lat, _, _)) = geographic {
            let lon = ul_lon + x as f64 * delta_east;
            let lat = ul_lat - y as f64 * delta_north;
            if let Ok(projected) = dst_projection.forward(lon, lat) {
                extrema.update(projected);
            }
        }
    };

    for x in 0..=cols {
        sample(x, 0); // top edge
        sample(x, rows); // bottom edge
    }

    for y in 0..=rows {
        sample(0, y); // left edge
        sample(cols, y); // right edge
    }

    if !extrema.is_valid() {
        return Err(Error::EmptyFootprint);
    }

    let dst_rows = ((extrema.max_y - extrema.min_y) / dst_pixel_size).floor() as i64;
    let dst_cols = ((extrema.max_x - extrema.min_x) / dst_pixel_size).floor() as i64;
    if dst_rows <= 0 || dst_cols <= 0 || dst_rows > i32::MAX as i64 || dst_cols > i32::MAX as i64 {
        return Err(Error::EmptyFootprint);
    }

    Ok(src.warped_to(
        dst_projection,
        RasterSize::with_rows_cols(Rows(dst_rows as i32), Columns(dst_cols as i32)),
        Point::new(extrema.min_x, extrema.max_y),
        dst_pixel_size,
    ))
}

/// Destination raster for a reprojection preview: same footprint as
/// [`projected_minbox`] but with the pixel size scaled up until neither
/// dimension exceeds `max_dimension` pixels.
pub fn preview_minbox(src: &GeoReference, dst_projection: Projection, max_dimension: i32) -> Result<GeoReference> {
    if max_dimension <= 0 {
        return Err(Error::InvalidArgument("Preview dimension must be positive".into()));
    }

    let full = projected_minbox(src, dst_projection.clone(), src.pixel_size())?;
    let largest = full.rows().max(full.columns());
    if largest <= max_dimension {
        return Ok(full);
    }

    let scale = largest as f64 / max_dimension as f64;
    projected_minbox(src, dst_projection, src.pixel_size() * scale)
}

/// Range the fractional source pixel coordinates can sensibly take before
/// clipping; keeps far-outside mappings well clear of i32 overflow.
const PIXEL_COORD_LIMIT: f64 = (i32::MAX / 4) as f64;

/// Computes the source window needed to fill one destination work unit.
///
/// Runs the coordinate transformer over every boundary pixel of the window
/// (corners alone under-cover on curved projections), envelopes the resulting
/// source areas and pads the integer window by one pixel of slack on every
/// side. The result is not clipped to the source extent; callers intersect it
/// with the input raster and treat an empty intersection as "all fill".
///
/// Returns `None` when no boundary pixel maps into the projected area.
pub fn raster_minbox(output: &GeoReference, input: &GeoReference, window: &Window) -> Option<Window> {
    let transformer = RasterCoordTransformer::from_references(output, input);

    let mut envelope: Option<SourceArea> = None;
    let mut update = |cell: Cell| {
        if let Some(area) = transformer.transform(cell) {
            envelope = Some(match envelope {
                Some(env) => env.envelope(&area),
                None => area,
            });
        }
    };

    let lr = window.lr();
    for col in window.ul.col..=lr.col {
        update(Cell::from_row_col(window.ul.row, col));
        update(Cell::from_row_col(lr.row, col));
    }
    for row in window.ul.row..=lr.row {
        update(Cell::from_row_col(row, window.ul.col));
        update(Cell::from_row_col(row, lr.col));
    }

    let env = envelope?;

    let clamp = |v: f64| v.clamp(-PIXEL_COORD_LIMIT, PIXEL_COORD_LIMIT);
    let ul = Cell::from_row_col(
        clamp(env.ul.y().floor()) as i32 - 1,
        clamp(env.ul.x().floor()) as i32 - 1,
    );
    let lr = Cell::from_row_col(clamp(env.lr.y().ceil()) as i32 + 1, clamp(env.lr.x().ceil()) as i32 + 1);

    Some(Window::from_corners(ul, lr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelType;
    use approx::assert_relative_eq;

    fn eqc_reference(top_left: Point, pixel_size: f64, rows: i32, cols: i32) -> GeoReference {
        GeoReference::new(
            Projection::from_proj("+proj=eqc +R=6370997").unwrap(),
            RasterSize::with_rows_cols(Rows(rows), Columns(cols)),
            top_left,
            pixel_size,
            Some(0.0),
            1,
            PixelType::Uint8,
        )
    }

    #[test]
    fn minbox_of_identical_projection_is_exact() -> Result {
        let src = eqc_reference(Point::new(100_000.0, 800_000.0), 1000.0, 300, 200);
        let out = projected_minbox(&src, Projection::from_proj("+proj=eqc +R=6370997")?, 1000.0)?;

        assert_eq!(out.top_left(), src.top_left());
        assert_eq!(out.raster_size(), src.raster_size());
        Ok(())
    }

    #[test]
    fn minbox_of_equivalent_projection_matches_extent() -> Result {
        // A cylindrical equidistant source over a limited region. The
        // destination system is written differently, so the box comes from
        // edge sampling; it must still reproduce the source extent to within
        // one pixel.
        let src = eqc_reference(Point::new(100_000.0, 800_000.0), 1000.0, 300, 200);
        let out = projected_minbox(&src, Projection::from_proj("+proj=eqc +R=6370997 +lon_0=0")?, 1000.0)?;

        assert_relative_eq!(out.top_left().x(), src.top_left().x(), epsilon = src.pixel_size());
        assert_relative_eq!(out.top_left().y(), src.top_left().y(), epsilon = src.pixel_size());
        assert!((out.rows() - src.rows()).abs() <= 1);
        assert!((out.columns() - src.columns()).abs() <= 1);
        Ok(())
    }

    #[test]
    fn minbox_carries_storage_properties() -> Result {
        let src = eqc_reference(Point::new(0.0, 100_000.0), 500.0, 64, 64);
        let out = projected_minbox(&src, Projection::from_proj("+proj=moll +R=6370997")?, 500.0)?;

        assert_eq!(out.data_type(), src.data_type());
        assert_eq!(out.band_count(), src.band_count());
        assert_eq!(out.nodata(), src.nodata());
        assert!(out.rows() > 0 && out.columns() > 0);
        Ok(())
    }

    #[test]
    fn preview_minbox_bounds_the_size() -> Result {
        let src = eqc_reference(Point::new(0.0, 1_000_000.0), 1000.0, 1000, 400);
        let preview = preview_minbox(&src, Projection::from_proj("+proj=eqc +R=6370997")?, 100)?;

        assert!(preview.rows() <= 100 && preview.columns() <= 100);
        assert!(preview.rows() >= 25, "preview should keep the aspect ratio");
        assert!(preview.pixel_size() > src.pixel_size());
        Ok(())
    }

    #[test]
    fn degenerate_source_is_empty_footprint() {
        let src = eqc_reference(Point::new(0.0, 0.0), 1000.0, 0, 10);
        let result = projected_minbox(&src, Projection::from_proj("+proj=moll +R=6370997").unwrap(), 1000.0);
        assert!(matches!(result, Err(Error::EmptyFootprint)));
    }

    #[test]
    fn raster_minbox_covers_destination_window() {
        let src = eqc_reference(Point::new(0.0, 64_000.0), 1000.0, 64, 64);
        let dst = eqc_reference(Point::new(0.0, 64_000.0), 2000.0, 32, 32);

        let window = Window::from_corners(Cell::from_row_col(0, 0), Cell::from_row_col(7, 31));
        let src_window = raster_minbox(&dst, &src, &window).expect("window inside footprint");

        // Destination rows 0..=7 at twice the pixel size need source rows 0..=15.
        assert!(src_window.ul.row <= 0 && src_window.ul.col <= 0);
        assert!(src_window.lr().row >= 15);
        assert!(src_window.lr().col >= 63);
    }

    #[test]
    fn raster_minbox_outside_domain_is_none() {
        let src = eqc_reference(Point::new(0.0, 1000.0), 1.0, 100, 100);
        let dst = GeoReference::new(
            Projection::from_proj("+proj=moll +R=6370997").unwrap(),
            RasterSize::with_rows_cols(Rows(4), Columns(4)),
            Point::new(2.5e7, 0.0),
            1000.0,
            None,
            1,
            PixelType::Uint8,
        );

        let window = dst.full_window();
        assert!(raster_minbox(&dst, &src, &window).is_none());
    }
}
