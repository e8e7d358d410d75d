//! Creation of the pre-sized output GeoTIFF.
//!
//! The file written here is what the parallel strip writer relies on: a
//! single image with uncompressed, pixel-interleaved strips of one row each,
//! stored contiguously in row order. Strip data is zero filled; the actual
//! pixel values are written later through [`crate::geotiff::StripWriter`].

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tiff::encoder::colortype::ColorType;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKindStandard, colortype};
use tiff::tags::Tag;

use crate::{Error, GeoReference, PixelType, Result};

/// Sample format tag values, per the TIFF specification.
const SAMPLE_FORMAT_INT: u16 = 2;

pub fn create_output(path: impl AsRef<Path>, georef: &GeoReference) -> Result<()> {
    if georef.band_count() != 1 {
        return Err(Error::InvalidArgument("Only single band outputs can be created".into()));
    }
    if georef.raster_size().is_empty() {
        return Err(Error::InvalidArgument("Cannot create an empty raster".into()));
    }

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = TiffEncoder::new(writer)?;

    match georef.data_type() {
        PixelType::Uint8 => write_zeroed_image::<colortype::Gray8, _>(&mut encoder, georef, None),
        PixelType::Uint16 => write_zeroed_image::<colortype::Gray16, _>(&mut encoder, georef, None),
        // The encoder color types are unsigned; signed rasters share the byte
        // width and get their sample format corrected afterwards.
        PixelType::Int16 => write_zeroed_image::<colortype::Gray16, _>(&mut encoder, georef, Some(SAMPLE_FORMAT_INT)),
        PixelType::Uint32 => write_zeroed_image::<colortype::Gray32, _>(&mut encoder, georef, None),
        PixelType::Int32 => write_zeroed_image::<colortype::Gray32, _>(&mut encoder, georef, Some(SAMPLE_FORMAT_INT)),
        PixelType::Float32 => write_zeroed_image::<colortype::Gray32Float, _>(&mut encoder, georef, None),
        PixelType::Float64 => write_zeroed_image::<colortype::Gray64Float, _>(&mut encoder, georef, None),
    }
}

fn write_zeroed_image<C, W>(encoder: &mut TiffEncoder<W>, georef: &GeoReference, sample_format: Option<u16>) -> Result<()>
where
    C: ColorType,
    C::Inner: num::Zero + Copy,
    [C::Inner]: tiff::encoder::TiffValue,
    W: Write + Seek,
{
    let width = georef.columns() as u32;
    let height = georef.rows() as u32;

    let mut image = encoder.new_image::<C>(width, height)?;
    image.rows_per_strip(1)?;

    write_spatial_reference_tags(image.encoder(), georef)?;
    if let Some(format) = sample_format {
        image.encoder().write_tag(Tag::SampleFormat, format)?;
    }

    let zero_row = inf::allocate::zeroed_vec::<C::Inner>(width as usize);
    for _ in 0..height {
        let samples = image.next_strip_sample_count() as usize;
        image.write_strip(&zero_row[..samples])?;
    }
    image.finish()?;

    Ok(())
}

fn write_spatial_reference_tags<W: Write + Seek>(
    encoder: &mut DirectoryEncoder<W, TiffKindStandard>,
    georef: &GeoReference,
) -> Result<()> {
    let pixel_scale = [georef.pixel_size(), georef.pixel_size(), 0.0];
    encoder.write_tag(Tag::ModelPixelScaleTag, &pixel_scale[..])?;

    // Tie pixel (0, 0) to the raster's upper-left world coordinate.
    let top_left = georef.top_left();
    let tie_points = [0.0, 0.0, 0.0, top_left.x(), top_left.y(), 0.0];
    encoder.write_tag(Tag::ModelTiepointTag, &tie_points[..])?;

    if let Some(nodata) = georef.nodata() {
        encoder.write_tag(Tag::GdalNodata, nodata.to_string().as_str())?;
    }

    write_coordinate_system_tags(encoder, georef)?;

    Ok(())
}

/// GeoKey directory describing the coordinate reference system. Reference
/// systems with an EPSG code are stored by code; others carry their proj
/// definition as a citation in the ascii parameters.
fn write_coordinate_system_tags<W: Write + Seek>(
    encoder: &mut DirectoryEncoder<W, TiffKindStandard>,
    georef: &GeoReference,
) -> Result<()> {
    let projection = georef.projection();

    // Header: version, revision, minor revision, key count (patched below).
    let mut geo_keys: Vec<u16> = vec![1, 1, 0, 0];
    let mut ascii_params = String::new();

    let model_type = if projection.is_geographic() { 2 } else { 1 };
    geo_keys.extend_from_slice(&[1024, 0, 1, model_type]); // GTModelTypeGeoKey
    geo_keys.extend_from_slice(&[1025, 0, 1, 1]); // GTRasterTypeGeoKey: pixel is area

    match projection.epsg() {
        Some(epsg) if projection.is_geographic() => {
            geo_keys.extend_from_slice(&[2048, 0, 1, epsg.code()]); // GeographicTypeGeoKey
        }
        Some(epsg) => {
            geo_keys.extend_from_slice(&[3072, 0, 1, epsg.code()]); // ProjectedCSTypeGeoKey
        }
        None => {
            let citation = format!("{}|", projection.definition());
            geo_keys.extend_from_slice(&[1026, Tag::GeoAsciiParamsTag.to_u16(), citation.len() as u16, 0]); // GTCitationGeoKey
            ascii_params.push_str(&citation);
        }
    }

    geo_keys[3] = (geo_keys.len() / 4 - 1) as u16;
    encoder.write_tag(Tag::GeoKeyDirectoryTag, &geo_keys[..])?;
    if !ascii_params.is_empty() {
        encoder.write_tag(Tag::GeoAsciiParamsTag, ascii_params.as_str())?;
    }

    Ok(())
}
