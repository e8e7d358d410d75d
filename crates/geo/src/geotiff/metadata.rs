//! TIFF tag parsing for striped single-image rasters.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, Limits};
use tiff::tags::Tag;

use crate::projection::Projection;
use crate::{Columns, Error, GeoReference, PixelType, Point, RasterSize, Result, Rows, crs};

/// Raw description of a striped TIFF raster, parsed from the first image
/// directory. This is the information the chunk reader and the parallel strip
/// writer need; [`TiffMetadata::to_georeference`] lifts it into the raster
/// descriptor used by the reprojection pipeline.
#[derive(Debug, Clone)]
pub struct TiffMetadata {
    pub size: RasterSize,
    pub top_left: Point,
    pub pixel_size: f64,
    pub nodata: Option<f64>,
    pub band_count: usize,
    pub data_type: PixelType,
    pub projection: ProjectionInfo,
    pub compression: u16,
    pub rows_per_strip: u32,
    pub strip_offsets: Vec<u64>,
    pub strip_byte_counts: Vec<u64>,
}

const COMPRESSION_NONE: u16 = 1;
const PLANAR_CHUNKY: u16 = 1;

fn tag_u16(decoder: &mut Decoder<File>, tag: Tag, default: u16) -> Result<u16> {
    match decoder.find_tag(tag)? {
        // Per-band lists must agree, so the first entry is representative.
        Some(Value::List(values)) => match values.first() {
            Some(value) => Ok(value.clone().into_u16()?),
            None => Ok(default),
        },
        Some(value) => Ok(value.into_u16()?),
        None => Ok(default),
    }
}

fn read_bits_per_sample(decoder: &mut Decoder<File>) -> Result<u16> {
    let bits = match decoder.get_tag(Tag::BitsPerSample)? {
        Value::List(values) => values.into_iter().map(|v| Ok(v.into_u16()?)).collect::<Result<Vec<u16>>>()?,
        other => vec![other.into_u16()?],
    };

    if bits.is_empty() || bits.iter().any(|&b| b != bits[0]) {
        return Err(Error::InvalidArgument("Mixed per-band bit depths are not supported".into()));
    }

    Ok(bits[0])
}

fn read_data_type(decoder: &mut Decoder<File>) -> Result<PixelType> {
    let bits_per_sample = read_bits_per_sample(decoder)?;
    let sample_format = tag_u16(decoder, Tag::SampleFormat, 1)?;

    match (sample_format, bits_per_sample) {
        (1, 8) => Ok(PixelType::Uint8),
        (1, 16) => Ok(PixelType::Uint16),
        (1, 32) => Ok(PixelType::Uint32),
        (2, 16) => Ok(PixelType::Int16),
        (2, 32) => Ok(PixelType::Int32),
        (3, 32) => Ok(PixelType::Float32),
        (3, 64) => Ok(PixelType::Float64),
        (format, bits) => Err(Error::InvalidArgument(format!(
            "Unsupported pixel data type (sample format {format}, {bits} bits)"
        ))),
    }
}

fn read_raster_size(decoder: &mut Decoder<File>) -> Result<RasterSize> {
    Ok(RasterSize::with_rows_cols(
        Rows(decoder.get_tag_u32(Tag::ImageLength)? as i32),
        Columns(decoder.get_tag_u32(Tag::ImageWidth)? as i32),
    ))
}

fn read_placement(decoder: &mut Decoder<File>) -> Result<(Point, f64)> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::InvalidArgument("Raster has no pixel scale information".into()))?;
    if scale.len() < 2 {
        return Err(Error::InvalidArgument("ModelPixelScale must have at least 2 values".into()));
    }

    let pixel_size = scale[0];
    if pixel_size <= 0.0 || (scale[0] - scale[1]).abs() > 1e-9 * pixel_size {
        return Err(Error::InvalidArgument("Only square pixels are supported".into()));
    }

    let tie_points = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::InvalidArgument("Raster has no tie point information".into()))?;
    if tie_points.len() != 6 {
        return Err(Error::InvalidArgument("ModelTiepoint must have 6 values".into()));
    }

    // Shift the tie point to pixel (0, 0); the y axis of the raster runs south.
    let top_left = Point::new(
        tie_points[3] - tie_points[0] * pixel_size,
        tie_points[4] + tie_points[1] * pixel_size,
    );

    Ok((top_left, pixel_size))
}

fn read_nodata_value(decoder: &mut Decoder<File>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
}

#[derive(Debug, Clone, Default)]
pub struct ProjectionInfo {
    pub epsg: Option<crs::Epsg>,
    /// Citation carrying the proj definition for reference systems without an
    /// EPSG code, stored in the GeoTIFF ascii parameters.
    pub citation: Option<String>,
}

/// Extracts the coordinate reference system from the GeoKey directory; the
/// projected EPSG code wins over the geographic one, a citation definition is
/// kept as fallback.
fn read_projection_info(decoder: &mut Decoder<File>) -> Result<ProjectionInfo> {
    let Ok(key_dir) = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag) else {
        return Ok(ProjectionInfo::default());
    };
    if key_dir.len() < 4 {
        return Ok(ProjectionInfo::default());
    }
    if key_dir[0] != 1 {
        return Err(Error::InvalidArgument(format!("Unexpected GeoKey directory version: {}", key_dir[0])));
    }

    let ascii_params = decoder.get_tag_ascii_string(Tag::GeoAsciiParamsTag).ok();

    let mut geographic = None;
    let mut projected = None;
    let mut citation = None;
    for key in key_dir[4..].chunks_exact(4) {
        match key[0] {
            // Citation GeoKey, value stored in the ascii parameters
            1026 if key[1] == Tag::GeoAsciiParamsTag.to_u16() => {
                if let Some(params) = &ascii_params {
                    let start = key[3] as usize;
                    let end = (start + key[2] as usize).min(params.len());
                    if start < end {
                        citation = Some(params[start..end].trim_end_matches('|').to_string());
                    }
                }
            }
            // Geographic coordinate reference system GeoKey
            2048 if key[1] == 0 && key[2] == 1 => geographic = Some(crs::Epsg::from(key[3])),
            // Projected coordinate reference system GeoKey
            3072 if key[1] == 0 && key[2] == 1 => projected = Some(crs::Epsg::from(key[3])),
            _ => {}
        }
    }

    Ok(ProjectionInfo {
        epsg: projected.or(geographic),
        citation,
    })
}

fn read_strip_layout(decoder: &mut Decoder<File>, size: RasterSize) -> Result<(u32, Vec<u64>, Vec<u64>)> {
    if decoder.get_chunk_type() != tiff::decoder::ChunkType::Strip {
        return Err(Error::InvalidArgument("Only rasters with a strip layout are supported".into()));
    }

    let rows_per_strip = match decoder.find_tag(Tag::RowsPerStrip)? {
        Some(value) => value.into_u32()?,
        None => size.rows.count() as u32,
    };

    let offsets = decoder.get_tag_u64_vec(Tag::StripOffsets)?;
    let byte_counts = decoder.get_tag_u64_vec(Tag::StripByteCounts)?;
    if offsets.len() != byte_counts.len() {
        return Err(Error::InvalidArgument("Inconsistent strip offset and byte count tags".into()));
    }

    Ok((rows_per_strip, offsets, byte_counts))
}

impl TiffMetadata {
    pub fn from_file(path: &Path) -> Result<Self> {
        // The raw strip reads and byte offset writes elsewhere assume the
        // byte order of the file; reject the big-endian variant up front.
        let mut magic = [0u8; 2];
        File::open(path)
            .map_err(|err| Error::OpenFailure(format!("{}: {err}", path.display())))?
            .read_exact(&mut magic)?;
        if &magic != b"II" {
            return Err(Error::InvalidArgument("Only little-endian TIFF rasters are supported".into()));
        }

        let file = File::open(path)?;
        let mut decoder = Decoder::new(file)?.with_limits(Limits::unlimited());

        let data_type = read_data_type(&mut decoder)?;
        let band_count = tag_u16(&mut decoder, Tag::SamplesPerPixel, 1)? as usize;
        if band_count == 0 {
            return Err(Error::InvalidArgument("Raster has no bands".into()));
        }

        if tag_u16(&mut decoder, Tag::PlanarConfiguration, PLANAR_CHUNKY)? != PLANAR_CHUNKY {
            return Err(Error::InvalidArgument("Only pixel-interleaved rasters are supported".into()));
        }

        let compression = tag_u16(&mut decoder, Tag::Compression, COMPRESSION_NONE)?;
        let size = read_raster_size(&mut decoder)?;
        let (top_left, pixel_size) = read_placement(&mut decoder)?;
        let nodata = read_nodata_value(&mut decoder);
        let projection = read_projection_info(&mut decoder)?;
        let (rows_per_strip, strip_offsets, strip_byte_counts) = read_strip_layout(&mut decoder, size)?;

        Ok(TiffMetadata {
            size,
            top_left,
            pixel_size,
            nodata,
            band_count,
            data_type,
            projection,
            compression,
            rows_per_strip,
            strip_offsets,
            strip_byte_counts,
        })
    }

    pub fn is_uncompressed(&self) -> bool {
        self.compression == COMPRESSION_NONE
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.band_count * self.data_type.bytes_per_sample()
    }

    pub fn row_bytes(&self) -> usize {
        self.size.cols.count() as usize * self.bytes_per_pixel()
    }

    /// Byte position of a pixel in the file, valid for uncompressed strips.
    pub fn pixel_offset(&self, row: i32, col: i32) -> u64 {
        let strip = row as usize / self.rows_per_strip as usize;
        let row_in_strip = row as u64 % self.rows_per_strip as u64;
        self.strip_offsets[strip] + row_in_strip * self.row_bytes() as u64 + col as u64 * self.bytes_per_pixel() as u64
    }

    /// Builds the raster descriptor. The coordinate reference system comes
    /// from the GeoKey directory unless an override is supplied; rasters
    /// without projection information require the override.
    pub fn to_georeference(&self, srs_override: Option<&str>) -> Result<GeoReference> {
        let projection = match srs_override {
            Some(definition) => Projection::from_definition(definition)?,
            None => match (&self.projection.epsg, &self.projection.citation) {
                (Some(epsg), _) => Projection::from_epsg(*epsg)?,
                (None, Some(citation)) => Projection::from_definition(citation)?,
                (None, None) => {
                    return Err(Error::InvalidArgument(
                        "Raster carries no projection information; supply a source reference system".into(),
                    ));
                }
            },
        };

        Ok(GeoReference::new(
            projection,
            self.size,
            self.top_left,
            self.pixel_size,
            self.nodata,
            self.band_count,
            self.data_type,
        ))
    }
}
