use crate::{Error, Result};

/// The pixel data types supported by the reprojection pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PixelType {
    Uint8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float32,
    Float64,
}

impl PixelType {
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Uint8 => 1,
            Self::Uint16 | Self::Int16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int16 | Self::Int32 | Self::Float32 | Self::Float64)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Uint32 => "uint32",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Parse a nodata/fill value for this pixel type. The textual value is
    /// validated against the representable range so a bad `--dstnodata`
    /// surfaces at configuration time instead of corrupting the output.
    pub fn parse_value(&self, value: &str) -> Result<f64> {
        let parsed: f64 = value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("Invalid fill value '{value}'")))?;

        let fits = match self {
            Self::Uint8 => inf::cast::fits_in_type::<u8>(parsed),
            Self::Uint16 => inf::cast::fits_in_type::<u16>(parsed),
            Self::Int16 => inf::cast::fits_in_type::<i16>(parsed),
            Self::Uint32 => inf::cast::fits_in_type::<u32>(parsed),
            Self::Int32 => inf::cast::fits_in_type::<i32>(parsed),
            Self::Float32 | Self::Float64 => true,
        };

        if !fits {
            return Err(Error::InvalidArgument(format!(
                "Fill value '{value}' does not fit in pixel type {self}"
            )));
        }

        Ok(parsed)
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// Trait implemented by the primitive types backing a pixel buffer.
/// Keeps the inner reprojection loops monomorphic while the chunk level
/// dispatches on the tagged [`PixelType`].
pub trait PixelNum:
    Copy
    + PartialEq
    + PartialOrd
    + std::fmt::Debug
    + num::NumCast
    + num::ToPrimitive
    + num::Zero
    + bytemuck::Pod
    + Send
    + Sync
    + 'static
{
    const TYPE: PixelType;
}

impl PixelNum for u8 {
    const TYPE: PixelType = PixelType::Uint8;
}

impl PixelNum for u16 {
    const TYPE: PixelType = PixelType::Uint16;
}

impl PixelNum for i16 {
    const TYPE: PixelType = PixelType::Int16;
}

impl PixelNum for u32 {
    const TYPE: PixelType = PixelType::Uint32;
}

impl PixelNum for i32 {
    const TYPE: PixelType = PixelType::Int32;
}

impl PixelNum for f32 {
    const TYPE: PixelType = PixelType::Float32;
}

impl PixelNum for f64 {
    const TYPE: PixelType = PixelType::Float64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fill_value_range_check() {
        assert_eq!(PixelType::Uint8.parse_value("255").unwrap(), 255.0);
        assert!(PixelType::Uint8.parse_value("256").is_err());
        assert!(PixelType::Uint8.parse_value("-1").is_err());
        assert_eq!(PixelType::Int16.parse_value("-32768").unwrap(), -32768.0);
        assert_eq!(PixelType::Float32.parse_value("-9999.5").unwrap(), -9999.5);
        assert!(PixelType::Uint32.parse_value("not-a-number").is_err());
    }

    #[test]
    fn sample_sizes() {
        assert_eq!(PixelType::Uint8.bytes_per_sample(), 1);
        assert_eq!(PixelType::Int16.bytes_per_sample(), 2);
        assert_eq!(PixelType::Float64.bytes_per_sample(), 8);
    }
}
