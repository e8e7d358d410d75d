//! Resampling kernels used by the reprojection loop.
//!
//! A kernel maps a clamped, non-empty area of source pixels to a single
//! output sample. Kernels are pure and never index outside the chunk they
//! are handed; the reprojection driver performs the clamping.

use crate::{Cell, Error, PixelNum, RasterChunk, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    #[default]
    Nearest,
    Mean,
}

impl Resampling {
    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Mean => "mean",
        }
    }
}

impl std::fmt::Display for Resampling {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl std::str::FromStr for Resampling {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nearest" => Ok(Self::Nearest),
            "mean" => Ok(Self::Mean),
            _ => Err(Error::InvalidArgument(format!("Unknown resampling method '{s}'"))),
        }
    }
}

/// The source pixel at the area's upper-left corner.
pub fn nearest_neighbor<T: PixelNum>(chunk: &RasterChunk<T>, ul: Cell, band: usize) -> T {
    chunk.sample(ul.row, ul.col, band)
}

/// Arithmetic mean of every source sample in the inclusive area, truncated
/// back to the pixel type.
pub fn mean<T: PixelNum>(chunk: &RasterChunk<T>, ul: Cell, lr: Cell, band: usize) -> T {
    debug_assert!(ul.row <= lr.row && ul.col <= lr.col);

    let mut sum = 0.0;
    for row in ul.row..=lr.row {
        for col in ul.col..=lr.col {
            sum += chunk.sample(row, col, band).to_f64().unwrap_or_default();
        }
    }

    let count = ((lr.row - ul.row + 1) as f64) * ((lr.col - ul.col + 1) as f64);
    num::NumCast::from(sum / count).unwrap_or_else(T::zero)
}
