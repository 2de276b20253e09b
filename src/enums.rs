use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{Result, TifgridError};

/// Values of the TIFF `SampleFormat` tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub(crate) enum SampleFormat {
    Uint = 1,
    Int = 2,
    IeeeFloat = 3,
    Void = 4,
}

/// Sample types a raster may be read into or written from.
///
/// The set is closed: files with any other layout are rejected rather
/// than converted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelType {
    U8,
    U16,
    I16,
    F32,
    F64,
}

impl PixelType {
    pub(crate) fn from_tiff(sample_format: u16, bits: u8) -> Result<Self> {
        let format = SampleFormat::try_from(sample_format).map_err(|_| {
            TifgridError::UnsupportedPixelType(format!("sample format {sample_format}"))
        })?;
        match (format, bits) {
            (SampleFormat::Uint, 8) => Ok(Self::U8),
            (SampleFormat::Uint, 16) => Ok(Self::U16),
            (SampleFormat::Int, 16) => Ok(Self::I16),
            (SampleFormat::IeeeFloat, 32) => Ok(Self::F32),
            (SampleFormat::IeeeFloat, 64) => Ok(Self::F64),
            (format, bits) => Err(TifgridError::UnsupportedPixelType(format!(
                "{bits}-bit {format:?}"
            ))),
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_tiff_layouts() {
        assert_eq!(PixelType::from_tiff(1, 8).unwrap(), PixelType::U8);
        assert_eq!(PixelType::from_tiff(2, 16).unwrap(), PixelType::I16);
        assert_eq!(PixelType::from_tiff(3, 32).unwrap(), PixelType::F32);
        assert_eq!(PixelType::from_tiff(3, 64).unwrap(), PixelType::F64);
    }

    #[test]
    fn rejects_unmapped_layouts() {
        assert!(matches!(
            PixelType::from_tiff(2, 8),
            Err(TifgridError::UnsupportedPixelType(_))
        ));
        assert!(PixelType::from_tiff(1, 32).is_err());
        assert!(PixelType::from_tiff(9, 8).is_err());
        assert!(PixelType::from_tiff(4, 8).is_err());
    }
}
