use std::borrow::Cow;
use std::io::{Seek, Write};

use ndarray::Array3;
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::compression::{
    Compression as TiffCompression, Deflate, Lzw, Packbits, Uncompressed,
};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind, TiffValue};

use crate::affine::GeoTransform;
use crate::buffer::RasterBuffer;
use crate::compression::Compression;
use crate::error::{Result, TifgridError};
use crate::geo_key_directory::GeoKeyDirectory;
use crate::geometry::Size;
use crate::ifd::{
    tag, GDAL_NODATA, GEO_ASCII_PARAMS, GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE, MODEL_TIEPOINT,
    MODEL_TRANSFORMATION,
};
use crate::raster::RasterAttributes;

/// Georeferencing stamped into a written image.
pub(crate) struct GeoTiffTags<'a> {
    geotransform: GeoTransform,
    projection: &'a str,
    nodata: Option<f64>,
}

impl<'a> GeoTiffTags<'a> {
    pub(crate) fn new(attributes: &'a RasterAttributes) -> Self {
        Self {
            geotransform: attributes.geotransform,
            projection: &attributes.projection,
            nodata: attributes.nodata,
        }
    }

    fn write<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<'_, W, K>,
    ) -> Result<()> {
        let t = self.geotransform;
        if t.is_rotated() {
            let matrix = [
                t.pixel_width,
                t.row_rotation,
                0.0,
                t.origin_x,
                t.column_rotation,
                t.pixel_height,
                0.0,
                t.origin_y,
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
                1.0,
            ];
            dir.write_tag(tag(MODEL_TRANSFORMATION), &matrix[..])?;
        } else {
            // ModelPixelScale: [ScaleX, ScaleY, ScaleZ], Y grows downwards
            let scale = [t.pixel_width, -t.pixel_height, 0.0];
            dir.write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])?;
            // ModelTiepoint: pixel (0, 0) -> world origin
            let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
            dir.write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])?;
        }

        if !self.projection.is_empty() {
            let (directory, ascii) = GeoKeyDirectory::encode_projection(self.projection);
            dir.write_tag(tag(GEO_KEY_DIRECTORY), &directory[..])?;
            dir.write_tag(tag(GEO_ASCII_PARAMS), ascii.as_str())?;
        }
        if let Some(nodata) = self.nodata {
            dir.write_tag(tag(GDAL_NODATA), nodata.to_string().as_str())?;
        }
        Ok(())
    }
}

/// Encode `buffer` as a single-image TIFF.
///
/// Supported layouts: `u8`, `u16`, `f32` and `f64` with 1, 3 or 4 bands,
/// `i16` with a single band.
pub(crate) fn encode<W: Write + Seek>(
    writer: W,
    buffer: &RasterBuffer,
    tags: Option<&GeoTiffTags<'_>>,
    compression: Compression,
) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let size = buffer.size();
    let bands = buffer.bands();
    let unsupported = || TifgridError::UnsupportedBandCount {
        pixel_type: buffer.pixel_type(),
        bands,
    };
    log::trace!(
        "encoding {size:?} x {bands} {} (compression {})",
        buffer.pixel_type(),
        u16::from(compression)
    );

    match buffer {
        RasterBuffer::U8(array) => {
            let data = samples(array);
            match bands {
                1 => write_image::<colortype::Gray8, _>(&mut encoder, size, &data, tags, compression),
                3 => write_image::<colortype::RGB8, _>(&mut encoder, size, &data, tags, compression),
                4 => write_image::<colortype::RGBA8, _>(&mut encoder, size, &data, tags, compression),
                _ => Err(unsupported()),
            }
        }
        RasterBuffer::U16(array) => {
            let data = samples(array);
            match bands {
                1 => write_image::<colortype::Gray16, _>(&mut encoder, size, &data, tags, compression),
                3 => write_image::<colortype::RGB16, _>(&mut encoder, size, &data, tags, compression),
                4 => write_image::<colortype::RGBA16, _>(&mut encoder, size, &data, tags, compression),
                _ => Err(unsupported()),
            }
        }
        RasterBuffer::I16(array) => match bands {
            1 => write_image::<colortype::GrayI16, _>(
                &mut encoder,
                size,
                &samples(array),
                tags,
                compression,
            ),
            _ => Err(unsupported()),
        },
        RasterBuffer::F32(array) => {
            let data = samples(array);
            match bands {
                1 => write_image::<colortype::Gray32Float, _>(&mut encoder, size, &data, tags, compression),
                3 => write_image::<colortype::RGB32Float, _>(&mut encoder, size, &data, tags, compression),
                4 => write_image::<colortype::RGBA32Float, _>(&mut encoder, size, &data, tags, compression),
                _ => Err(unsupported()),
            }
        }
        RasterBuffer::F64(array) => {
            let data = samples(array);
            match bands {
                1 => write_image::<colortype::Gray64Float, _>(&mut encoder, size, &data, tags, compression),
                3 => write_image::<colortype::RGB64Float, _>(&mut encoder, size, &data, tags, compression),
                4 => write_image::<colortype::RGBA64Float, _>(&mut encoder, size, &data, tags, compression),
                _ => Err(unsupported()),
            }
        }
    }
}

/// Samples in chunky row-major order.
fn samples<T: Clone>(array: &Array3<T>) -> Cow<'_, [T]> {
    match array.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(array.iter().cloned().collect()),
    }
}

fn write_image<C, W>(
    encoder: &mut TiffEncoder<W>,
    size: Size,
    data: &[C::Inner],
    tags: Option<&GeoTiffTags<'_>>,
    compression: Compression,
) -> Result<()>
where
    C: ColorType,
    W: Write + Seek,
    [C::Inner]: TiffValue,
{
    match compression {
        Compression::None => write_compressed::<C, W, _>(encoder, size, data, tags, Uncompressed::default()),
        Compression::Lzw => write_compressed::<C, W, _>(encoder, size, data, tags, Lzw::default()),
        Compression::Deflate => write_compressed::<C, W, _>(encoder, size, data, tags, Deflate::default()),
        Compression::Packbits => write_compressed::<C, W, _>(encoder, size, data, tags, Packbits::default()),
    }
}

fn write_compressed<C, W, D>(
    encoder: &mut TiffEncoder<W>,
    size: Size,
    data: &[C::Inner],
    tags: Option<&GeoTiffTags<'_>>,
    compression: D,
) -> Result<()>
where
    C: ColorType,
    W: Write + Seek,
    D: TiffCompression,
    [C::Inner]: TiffValue,
{
    let mut image =
        encoder.new_image_with_compression::<C, D>(size.width as u32, size.height as u32, compression)?;
    if let Some(tags) = tags {
        tags.write(image.encoder())?;
    }
    image.write_data(data)?;
    Ok(())
}
