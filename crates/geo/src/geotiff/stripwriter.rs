//! Parallel-safe writes into a pre-created striped raster.
//!
//! Many workers hold their own `StripWriter` on the same output file and
//! write their partitions concurrently. Sequential consistency holds because
//! the strip layout makes every pixel's byte range a pure function of its
//! row and column, and the partitioner hands out disjoint pixel sets: no two
//! workers ever touch overlapping byte ranges, so no locking is needed.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::geotiff::TiffMetadata;
use crate::{Error, PixelType, Result};

pub struct StripWriter {
    file: File,
    rows: i32,
    cols: i32,
    band_count: usize,
    data_type: PixelType,
    first_strip_offset: u64,
}

impl StripWriter {
    /// Opens the output raster and verifies the layout invariant the
    /// byte-offset writes depend on: a single uncompressed image whose strips
    /// are stored contiguously in row order.
    pub fn open(path: &Path) -> Result<Self> {
        let meta = TiffMetadata::from_file(path)?;

        if !meta.is_uncompressed() {
            return Err(Error::InvalidArgument("Parallel writes require an uncompressed raster".into()));
        }

        let row_bytes = meta.row_bytes() as u64;
        for (index, pair) in meta.strip_offsets.windows(2).enumerate() {
            if pair[1] != pair[0] + meta.strip_byte_counts[index] {
                return Err(Error::InvalidArgument(
                    "Parallel writes require contiguous strips in row order".into(),
                ));
            }
        }
        if meta.strip_byte_counts.iter().sum::<u64>() != row_bytes * meta.size.rows.count() as u64 {
            return Err(Error::InvalidArgument(
                "Strip byte counts do not cover the raster exactly".into(),
            ));
        }

        let first_strip_offset = *meta
            .strip_offsets
            .first()
            .ok_or_else(|| Error::InvalidArgument("Raster has no strips".into()))?;

        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|err| Error::OpenFailure(format!("{}: {err}", path.display())))?;

        Ok(StripWriter {
            file,
            rows: meta.size.rows.count(),
            cols: meta.size.cols.count(),
            band_count: meta.band_count,
            data_type: meta.data_type,
            first_strip_offset,
        })
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn columns(&self) -> i32 {
        self.cols
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    pub fn data_type(&self) -> PixelType {
        self.data_type
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.band_count * self.data_type.bytes_per_sample()
    }

    fn row_bytes(&self) -> u64 {
        self.cols as u64 * self.bytes_per_pixel() as u64
    }

    /// Writes one or more whole rows with a single contiguous write.
    pub fn write_rows(&mut self, buffer: &[u8], first_row: i32, last_row: i32) -> Result<()> {
        if first_row < 0 || last_row < first_row || last_row >= self.rows {
            return Err(Error::InvalidArgument(format!(
                "Row range {first_row}..={last_row} outside raster with {} rows",
                self.rows
            )));
        }

        let expected = (last_row - first_row + 1) as u64 * self.row_bytes();
        if buffer.len() as u64 != expected {
            return Err(Error::Invariant(format!(
                "Row buffer of {} bytes does not match the {expected} byte row range",
                buffer.len()
            )));
        }

        let offset = self.first_strip_offset + first_row as u64 * self.row_bytes();
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        Ok(())
    }

    /// Writes part of a single row with one contiguous write.
    pub fn write_subrow(&mut self, buffer: &[u8], row: i32, first_col: i32, last_col: i32) -> Result<()> {
        if row < 0 || row >= self.rows || first_col < 0 || last_col < first_col || last_col >= self.cols {
            return Err(Error::InvalidArgument(format!(
                "Subrow range row {row}, columns {first_col}..={last_col} outside raster"
            )));
        }

        let expected = (last_col - first_col + 1) as u64 * self.bytes_per_pixel() as u64;
        if buffer.len() as u64 != expected {
            return Err(Error::Invariant(format!(
                "Subrow buffer of {} bytes does not match the {expected} byte column range",
                buffer.len()
            )));
        }

        let offset = self.first_strip_offset + row as u64 * self.row_bytes() + first_col as u64 * self.bytes_per_pixel() as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        Ok(())
    }

    /// Flushes the written data to disk. Callers synchronize their group
    /// before the file is considered complete.
    pub fn finish(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
