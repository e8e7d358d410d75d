//! Pixel buffers for one unit of reprojection work.

use crate::projection::ProjectionRef;
use crate::{Cell, GeoReference, PixelNum, PixelType, Point, RasterSize, Window};

/// A contiguous, pixel-interleaved buffer covering a rectangular part of a
/// raster. Chunks are created per work unit and dropped after their data has
/// been written.
#[derive(Debug, Clone)]
pub struct RasterChunk<T: PixelNum> {
    /// Pixel location of this chunk's upper-left pixel in the parent raster.
    pub location: Cell,
    pub size: RasterSize,
    /// World coordinate of the chunk's upper-left pixel corner.
    pub ul_projected: Point,
    pub pixel_size: f64,
    pub projection: ProjectionRef,
    pub band_count: usize,
    pub data: Vec<T>,
}

impl<T: PixelNum> RasterChunk<T> {
    pub fn rows(&self) -> i32 {
        self.size.rows.count()
    }

    pub fn cols(&self) -> i32 {
        self.size.cols.count()
    }

    pub fn sample(&self, row: i32, col: i32, band: usize) -> T {
        debug_assert!(row >= 0 && row < self.rows() && col >= 0 && col < self.cols());
        self.data[(row as usize * self.cols() as usize + col as usize) * self.band_count + band]
    }

    pub fn set_sample(&mut self, row: i32, col: i32, band: usize, value: T) {
        debug_assert!(row >= 0 && row < self.rows() && col >= 0 && col < self.cols());
        let cols = self.cols() as usize;
        self.data[(row as usize * cols + col as usize) * self.band_count + band] = value;
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.data)
    }
}

fn chunk_for_window<T: PixelNum>(georef: &GeoReference, window: &Window, data: Vec<T>) -> RasterChunk<T> {
    RasterChunk {
        location: window.ul,
        size: window.size,
        ul_projected: georef.cell_corner(window.ul),
        pixel_size: georef.pixel_size(),
        projection: georef.projection().clone(),
        band_count: georef.band_count(),
        data,
    }
}

/// Tagged union over the supported pixel types; keeps the reprojection inner
/// loops monomorphic while files decide the type at runtime.
#[derive(Debug, Clone)]
pub enum AnyRasterChunk {
    Uint8(RasterChunk<u8>),
    Uint16(RasterChunk<u16>),
    Int16(RasterChunk<i16>),
    Uint32(RasterChunk<u32>),
    Int32(RasterChunk<i32>),
    Float32(RasterChunk<f32>),
    Float64(RasterChunk<f64>),
}

macro_rules! dispatch {
    ($any:expr, $chunk:ident => $body:expr) => {
        match $any {
            AnyRasterChunk::Uint8($chunk) => $body,
            AnyRasterChunk::Uint16($chunk) => $body,
            AnyRasterChunk::Int16($chunk) => $body,
            AnyRasterChunk::Uint32($chunk) => $body,
            AnyRasterChunk::Int32($chunk) => $body,
            AnyRasterChunk::Float32($chunk) => $body,
            AnyRasterChunk::Float64($chunk) => $body,
        }
    };
}

impl AnyRasterChunk {
    /// Zero initialized chunk for the given window of a raster; performs no I/O.
    pub fn allocate(georef: &GeoReference, window: &Window) -> Self {
        Self::with_value(georef, window, 0.0)
    }

    /// Chunk flooded with a fill value, used for work units that lie entirely
    /// outside the projected area of the input.
    pub fn with_value(georef: &GeoReference, window: &Window, value: f64) -> Self {
        let len = window.cell_count() * georef.band_count();

        fn build<T: PixelNum>(georef: &GeoReference, window: &Window, value: f64, len: usize) -> RasterChunk<T> {
            let value = inf::cast::option::<T>(Some(value)).unwrap_or_else(T::zero);
            chunk_for_window(georef, window, inf::allocate::vec_filled_with(value, len))
        }

        match georef.data_type() {
            PixelType::Uint8 => AnyRasterChunk::Uint8(build(georef, window, value, len)),
            PixelType::Uint16 => AnyRasterChunk::Uint16(build(georef, window, value, len)),
            PixelType::Int16 => AnyRasterChunk::Int16(build(georef, window, value, len)),
            PixelType::Uint32 => AnyRasterChunk::Uint32(build(georef, window, value, len)),
            PixelType::Int32 => AnyRasterChunk::Int32(build(georef, window, value, len)),
            PixelType::Float32 => AnyRasterChunk::Float32(build(georef, window, value, len)),
            PixelType::Float64 => AnyRasterChunk::Float64(build(georef, window, value, len)),
        }
    }

    pub fn data_type(&self) -> PixelType {
        match self {
            AnyRasterChunk::Uint8(_) => PixelType::Uint8,
            AnyRasterChunk::Uint16(_) => PixelType::Uint16,
            AnyRasterChunk::Int16(_) => PixelType::Int16,
            AnyRasterChunk::Uint32(_) => PixelType::Uint32,
            AnyRasterChunk::Int32(_) => PixelType::Int32,
            AnyRasterChunk::Float32(_) => PixelType::Float32,
            AnyRasterChunk::Float64(_) => PixelType::Float64,
        }
    }

    pub fn location(&self) -> Cell {
        dispatch!(self, chunk => chunk.location)
    }

    pub fn size(&self) -> RasterSize {
        dispatch!(self, chunk => chunk.size)
    }

    pub fn rows(&self) -> i32 {
        self.size().rows.count()
    }

    pub fn cols(&self) -> i32 {
        self.size().cols.count()
    }

    pub fn band_count(&self) -> usize {
        dispatch!(self, chunk => chunk.band_count)
    }

    pub fn as_bytes(&self) -> &[u8] {
        dispatch!(self, chunk => chunk.as_bytes())
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        dispatch!(self, chunk => chunk.as_bytes_mut())
    }
}
