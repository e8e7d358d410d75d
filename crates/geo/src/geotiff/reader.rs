//! Windowed reads from striped GeoTIFF rasters.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::geotiff::TiffMetadata;
use crate::{AnyRasterChunk, Error, GeoReference, Result, Window};

/// Read-only handle on an input raster. Every worker opens its own reader;
/// the handle is not shared.
pub struct GeoTiffReader {
    meta: TiffMetadata,
    georef: GeoReference,
    file: File,
}

impl GeoTiffReader {
    /// Opens the raster and resolves its georeference, with `srs_override`
    /// taking precedence over the projection stored in the file.
    pub fn from_file(path: &Path, srs_override: Option<&str>) -> Result<Self> {
        let meta = TiffMetadata::from_file(path)?;
        let georef = meta.to_georeference(srs_override)?;
        let file = File::open(path).map_err(|err| Error::OpenFailure(format!("{}: {err}", path.display())))?;

        Ok(GeoTiffReader { meta, georef, file })
    }

    pub fn geo_reference(&self) -> &GeoReference {
        &self.georef
    }

    pub fn metadata(&self) -> &TiffMetadata {
        &self.meta
    }

    /// Materializes a window of input pixels. The window must lie within the
    /// raster; callers clip against the raster extent first.
    pub fn read_window(&mut self, window: &Window) -> Result<AnyRasterChunk> {
        if window.is_empty() || !self.georef.contains_window(window) {
            return Err(Error::Invariant(format!(
                "Read window {window} outside raster extent {}",
                self.georef.raster_size()
            )));
        }

        if !self.meta.is_uncompressed() {
            return Err(Error::InvalidArgument("Compressed input rasters are not supported".into()));
        }

        let mut chunk = AnyRasterChunk::allocate(&self.georef, window);
        let row_bytes = window.cols() as usize * self.meta.bytes_per_pixel();

        {
            let buffer = chunk.as_bytes_mut();
            for (index, row) in (window.ul.row..=window.lr().row).enumerate() {
                let offset = self.meta.pixel_offset(row, window.ul.col);
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.read_exact(&mut buffer[index * row_bytes..(index + 1) * row_bytes])?;
            }
        }

        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotiff::writer::create_output;
    use crate::projection::Projection;
    use crate::{Cell, Columns, PixelType, Point, RasterSize, Rows};

    fn write_test_raster(path: &Path, rows: i32, cols: i32) -> GeoReference {
        let georef = GeoReference::new(
            Projection::from_proj("+proj=eqc +ellps=WGS84").unwrap(),
            RasterSize::with_rows_cols(Rows(rows), Columns(cols)),
            Point::new(0.0, rows as f64),
            1.0,
            Some(255.0),
            1,
            PixelType::Uint8,
        );
        create_output(path, &georef).unwrap();
        georef
    }

    #[test]
    fn read_full_window() -> Result<()> {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let path = tmp.path().join("input.tif");
        let georef = write_test_raster(&path, 4, 4);

        // Fill the fresh raster with a recognizable pattern through the strip writer.
        let mut writer = crate::geotiff::StripWriter::open(&path)?;
        let data: Vec<u8> = (1..=16).collect();
        writer.write_rows(&data, 0, 3)?;
        writer.finish()?;

        let mut reader = GeoTiffReader::from_file(&path, None)?;
        assert_eq!(reader.geo_reference().raster_size(), georef.raster_size());
        assert_eq!(reader.geo_reference().nodata(), Some(255.0));

        let window = reader.geo_reference().full_window();
        let chunk = reader.read_window(&window)?;
        assert_eq!(chunk.as_bytes(), data.as_slice());
        Ok(())
    }

    #[test]
    fn read_partial_window() -> Result<()> {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let path = tmp.path().join("input.tif");
        write_test_raster(&path, 4, 4);

        let mut writer = crate::geotiff::StripWriter::open(&path)?;
        writer.write_rows(&(1..=16).collect::<Vec<u8>>(), 0, 3)?;
        writer.finish()?;

        let mut reader = GeoTiffReader::from_file(&path, None)?;
        let window = Window::from_corners(Cell::from_row_col(1, 1), Cell::from_row_col(2, 3));
        let chunk = reader.read_window(&window)?;

        assert_eq!(chunk.rows(), 2);
        assert_eq!(chunk.cols(), 3);
        assert_eq!(chunk.as_bytes(), &[6, 7, 8, 10, 11, 12]);
        Ok(())
    }

    #[test]
    fn window_outside_extent_is_rejected() -> Result<()> {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let path = tmp.path().join("input.tif");
        write_test_raster(&path, 4, 4);

        let mut reader = GeoTiffReader::from_file(&path, None)?;
        let window = Window::from_corners(Cell::from_row_col(2, 2), Cell::from_row_col(4, 4));
        assert!(reader.read_window(&window).is_err());
        Ok(())
    }

    #[test]
    fn srs_override_wins_over_the_file() -> Result<()> {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let path = tmp.path().join("input.tif");
        write_test_raster(&path, 2, 2);

        let reader = GeoTiffReader::from_file(&path, Some("+proj=moll +R=6370997"))?;
        assert!(reader.geo_reference().projection().definition().contains("moll"));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_open_failure() {
        let result = GeoTiffReader::from_file(Path::new("/nonexistent/raster.tif"), None);
        assert!(matches!(result, Err(Error::OpenFailure(_))));
    }
}
