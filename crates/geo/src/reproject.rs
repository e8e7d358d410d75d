//! The reprojection kernel: fills a destination chunk from a source chunk.

use crate::coordtransformer::RasterCoordTransformer;
use crate::resample::{self, Resampling};
use crate::{AnyRasterChunk, Cell, Error, PixelNum, RasterChunk, Result, SourceArea};

/// Snap tolerance for fractional pixel coordinates that land on a pixel edge;
/// without it floating point noise leaks a neighbouring pixel into the area.
const EDGE_EPSILON: f64 = 1e-9;

/// Converts a fractional source area to the inclusive integer pixel range it
/// covers. The lower-right edge of the area is exclusive: an area reaching
/// exactly to pixel boundary `n` covers pixels up to `n - 1`.
fn pixel_range(area: &SourceArea) -> (Cell, Cell) {
    let ul = Cell::from_row_col(
        (area.ul.y() + EDGE_EPSILON).floor() as i32,
        (area.ul.x() + EDGE_EPSILON).floor() as i32,
    );
    let lr = Cell::from_row_col(
        (((area.lr.y() - EDGE_EPSILON).ceil() as i32) - 1).max(ul.row),
        (((area.lr.x() - EDGE_EPSILON).ceil() as i32) - 1).max(ul.col),
    );

    (ul, lr)
}

fn clamp_to_chunk<T: PixelNum>(cell: Cell, chunk: &RasterChunk<T>) -> Cell {
    Cell::from_row_col(
        cell.row.clamp(0, chunk.rows() - 1),
        cell.col.clamp(0, chunk.cols() - 1),
    )
}

fn reproject_chunk_typed<T: PixelNum>(
    src: &RasterChunk<T>,
    dst: &mut RasterChunk<T>,
    fill_value: T,
    resampling: Resampling,
) -> Result<()> {
    if src.band_count != dst.band_count {
        return Err(Error::Invariant(format!(
            "Band count mismatch between source ({}) and destination ({}) chunk",
            src.band_count, dst.band_count
        )));
    }

    let transformer = RasterCoordTransformer::new(
        dst.projection.clone(),
        dst.ul_projected,
        dst.pixel_size,
        src.projection.clone(),
        src.ul_projected,
        src.pixel_size,
    );

    let band_count = dst.band_count;
    for row in 0..dst.rows() {
        for col in 0..dst.cols() {
            let Some(area) = transformer.transform(Cell::from_row_col(row, col)) else {
                // The pixel is outside of the projected area
                for band in 0..band_count {
                    dst.set_sample(row, col, band, fill_value);
                }
                continue;
            };

            let (area_ul, area_lr) = pixel_range(&area);
            let ul = clamp_to_chunk(area_ul, src);
            let lr = clamp_to_chunk(area_lr, src);

            if resampling == Resampling::Nearest || ul == lr {
                for band in 0..band_count {
                    dst.set_sample(row, col, band, resample::nearest_neighbor(src, ul, band));
                }
            } else {
                for band in 0..band_count {
                    dst.set_sample(row, col, band, resample::mean(src, ul, lr, band));
                }
            }
        }
    }

    Ok(())
}

/// Reprojects a source chunk into a destination chunk, writing `fill_value`
/// wherever a destination pixel lies outside the projected area. Per pixel
/// projection failures are handled here with the fill policy and are never
/// propagated as errors.
///
/// The fill value travels as f64 and is narrowed to the chunk pixel type at
/// this boundary; both chunks must carry the same pixel type and band count.
pub fn reproject_chunk(src: &AnyRasterChunk, dst: &mut AnyRasterChunk, fill_value: f64, resampling: Resampling) -> Result<()> {
    fn narrowed<T: PixelNum>(fill_value: f64) -> T {
        inf::cast::option_or(Some(fill_value), T::zero())
    }

    match (src, dst) {
        (AnyRasterChunk::Uint8(src), AnyRasterChunk::Uint8(dst)) => reproject_chunk_typed(src, dst, narrowed(fill_value), resampling),
        (AnyRasterChunk::Uint16(src), AnyRasterChunk::Uint16(dst)) => reproject_chunk_typed(src, dst, narrowed(fill_value), resampling),
        (AnyRasterChunk::Int16(src), AnyRasterChunk::Int16(dst)) => reproject_chunk_typed(src, dst, narrowed(fill_value), resampling),
        (AnyRasterChunk::Uint32(src), AnyRasterChunk::Uint32(dst)) => reproject_chunk_typed(src, dst, narrowed(fill_value), resampling),
        (AnyRasterChunk::Int32(src), AnyRasterChunk::Int32(dst)) => reproject_chunk_typed(src, dst, narrowed(fill_value), resampling),
        (AnyRasterChunk::Float32(src), AnyRasterChunk::Float32(dst)) => reproject_chunk_typed(src, dst, narrowed(fill_value), resampling),
        (AnyRasterChunk::Float64(src), AnyRasterChunk::Float64(dst)) => reproject_chunk_typed(src, dst, fill_value, resampling),
        (src, dst) => Err(Error::Invariant(format!(
            "Pixel type mismatch between source ({}) and destination ({}) chunk",
            src.data_type(),
            dst.data_type()
        ))),
    }
}
