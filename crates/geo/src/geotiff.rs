//! GeoTIFF container support: header parsing, windowed reads, pre-sized
//! output creation and the parallel strip writer.

pub mod metadata;
pub mod reader;
pub mod stripwriter;
pub mod writer;

#[doc(inline)]
pub use {metadata::TiffMetadata, reader::GeoTiffReader, stripwriter::StripWriter, writer::create_output};
