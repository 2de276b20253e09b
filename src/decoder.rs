use ndarray::Array3;
use tiff::decoder::DecodingResult;

use crate::buffer::RasterBuffer;
use crate::enums::PixelType;
use crate::error::{Result, TifgridError};
use crate::geometry::Size;

/// Wrap one decoded strip or tile (chunky samples, row-major) as a buffer.
pub(crate) fn decode_block(
    result: DecodingResult,
    size: Size,
    bands: usize,
    expected: PixelType,
) -> Result<RasterBuffer> {
    let shape = (size.height, size.width, bands);
    let buffer = match result {
        DecodingResult::U8(data) => RasterBuffer::U8(Array3::from_shape_vec(shape, data)?),
        DecodingResult::U16(data) => RasterBuffer::U16(Array3::from_shape_vec(shape, data)?),
        DecodingResult::I16(data) => RasterBuffer::I16(Array3::from_shape_vec(shape, data)?),
        DecodingResult::F32(data) => RasterBuffer::F32(Array3::from_shape_vec(shape, data)?),
        DecodingResult::F64(data) => RasterBuffer::F64(Array3::from_shape_vec(shape, data)?),
        other => {
            return Err(TifgridError::UnsupportedPixelType(
                unsupported_name(&other).to_string(),
            ))
        }
    };

    // The header and the codec must agree, otherwise the file is lying
    // about its sample format.
    if buffer.pixel_type() != expected {
        return Err(TifgridError::PixelTypeMismatch {
            expected,
            found: buffer.pixel_type(),
        });
    }
    Ok(buffer)
}

#[allow(unreachable_patterns)]
fn unsupported_name(result: &DecodingResult) -> &'static str {
    match result {
        DecodingResult::U32(_) => "u32",
        DecodingResult::U64(_) => "u64",
        DecodingResult::I8(_) => "i8",
        DecodingResult::I32(_) => "i32",
        DecodingResult::I64(_) => "i64",
        _ => "unknown sample type",
    }
}
