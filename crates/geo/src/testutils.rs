use std::path::Path;

use rand::distr::{Distribution, Uniform};

use crate::geotiff::{GeoTiffReader, StripWriter, create_output};
use crate::projection::Projection;
use crate::{Columns, GeoReference, PixelType, Point, RasterSize, Result, Rows};

pub fn eqc_georeference(top_left: Point, pixel_size: f64, rows: i32, cols: i32, nodata: Option<f64>) -> GeoReference {
    GeoReference::new(
        Projection::from_proj("+proj=eqc +R=6370997").unwrap(),
        RasterSize::with_rows_cols(Rows(rows), Columns(cols)),
        top_left,
        pixel_size,
        nodata,
        1,
        PixelType::Uint8,
    )
}

/// Random pixel values for fixtures where the exact content does not matter.
pub fn create_random_pixels(count: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let uniform = Uniform::new_inclusive(1u8, 254).expect("Failed to create uniform distribution");
    let mut vec = inf::allocate::vec_with_capacity(count);
    (0..count).for_each(|_| vec.push(uniform.sample(&mut rng)));
    vec
}

/// Creates a striped GeoTIFF at `path` containing the given pixel rows.
pub fn create_test_raster(path: &Path, georef: &GeoReference, data: &[u8]) -> Result<()> {
    assert_eq!(data.len(), georef.raster_size().cell_count());
    create_output(path, georef)?;

    let mut writer = StripWriter::open(path)?;
    writer.write_rows(data, 0, georef.rows() - 1)?;
    writer.finish()
}

/// Reads back the full pixel buffer of a raster for comparisons.
pub fn read_raster_bytes(path: &Path, srs: &str) -> Result<Vec<u8>> {
    let mut reader = GeoTiffReader::from_file(path, Some(srs))?;
    let window = reader.geo_reference().full_window();
    Ok(reader.read_window(&window)?.as_bytes().to_vec())
}
