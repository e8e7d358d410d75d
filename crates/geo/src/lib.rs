pub type Result<T = ()> = std::result::Result<T, Error>;

mod area;
mod cell;
pub mod chunk;
pub mod coordinator;
pub mod coordtransformer;
pub mod crs;
mod error;
pub mod georeference;
pub mod geotiff;
pub mod minbox;
pub mod partition;
mod pixeltype;
mod point;
pub mod projection;
mod rastersize;
pub mod reproject;
pub mod resample;
pub mod workgroup;

#[cfg(test)]
mod reprojectiontests;
#[cfg(test)]
pub mod testutils;

#[doc(inline)]
pub use {
    area::SourceArea, area::Window, cell::Cell, chunk::AnyRasterChunk, chunk::RasterChunk, coordinator::Config,
    coordtransformer::RasterCoordTransformer, error::Error, georeference::GeoReference, pixeltype::PixelNum, pixeltype::PixelType,
    projection::Projection, rastersize::Columns, rastersize::RasterSize, rastersize::Rows, resample::Resampling,
};

#[doc(inline)]
pub use point::Point;
