use std::io::{Read, Seek};

use tiff::decoder::ifd::Value;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

use crate::affine::GeoTransform;
use crate::enums::PixelType;
use crate::error::{Result, TifgridError};
use crate::geo_key_directory::GeoKeyDirectory;
use crate::geometry::Size;

// GeoTIFF and GDAL private tag codes
pub(crate) const MODEL_PIXEL_SCALE: u16 = 33550;
pub(crate) const MODEL_TIEPOINT: u16 = 33922;
pub(crate) const MODEL_TRANSFORMATION: u16 = 34264;
pub(crate) const GEO_KEY_DIRECTORY: u16 = 34735;
pub(crate) const GEO_DOUBLE_PARAMS: u16 = 34736;
pub(crate) const GEO_ASCII_PARAMS: u16 = 34737;
pub(crate) const GDAL_NODATA: u16 = 42113;

pub(crate) fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Layout and georeferencing of the first image in a TIFF.
#[derive(Debug, Clone)]
pub(crate) struct ImageHeader {
    pub size: Size,
    pub bands: usize,
    pub pixel_type: PixelType,
    pub geotransform: GeoTransform,
    pub nodata: Option<f64>,
    pub geo_keys: Option<GeoKeyDirectory>,
}

impl ImageHeader {
    pub(crate) fn read<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Self> {
        let (width, height) = decoder.dimensions()?;

        let bands = match decoder.find_tag(Tag::SamplesPerPixel)? {
            Some(value) => value_as_usize(&value)?,
            None => 1,
        };
        let bits = match decoder.find_tag(Tag::BitsPerSample)? {
            Some(value) => value_as_usize(&value)?,
            None => 1,
        };
        let sample_format = match decoder.find_tag(Tag::SampleFormat)? {
            Some(value) => value_as_usize(&value)?,
            None => 1,
        };
        let pixel_type = PixelType::from_tiff(
            u16::try_from(sample_format).unwrap_or(u16::MAX),
            u8::try_from(bits).unwrap_or(u8::MAX),
        )?;

        Ok(Self {
            size: Size::new(width as usize, height as usize),
            bands,
            pixel_type,
            geotransform: read_geotransform(decoder)?,
            nodata: read_nodata(decoder)?,
            geo_keys: read_geo_keys(decoder)?,
        })
    }

    pub(crate) fn projection(&self) -> String {
        self.geo_keys
            .as_ref()
            .map(GeoKeyDirectory::projection)
            .unwrap_or_default()
    }
}

/// First integer of a scalar or list value.
fn value_as_usize(value: &Value) -> Result<usize> {
    match value {
        Value::Byte(v) => Ok(*v as usize),
        Value::Short(v) => Ok(*v as usize),
        Value::Unsigned(v) => Ok(*v as usize),
        Value::UnsignedBig(v) => Ok(*v as usize),
        Value::List(values) => match values.first() {
            Some(first) => value_as_usize(first),
            None => Err(TifgridError::GeoKey("empty integer list".into())),
        },
        other => Err(TifgridError::GeoKey(format!(
            "expected an unsigned integer, found {other:?}"
        ))),
    }
}

fn find_f64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> Result<Option<Vec<f64>>> {
    Ok(decoder
        .find_tag(tag(code))?
        .map(Value::into_f64_vec)
        .transpose()?)
}

fn find_string<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> Result<Option<String>> {
    Ok(decoder
        .find_tag(tag(code))?
        .map(Value::into_string)
        .transpose()?)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    if let Some(matrix) = find_f64_vec(decoder, MODEL_TRANSFORMATION)? {
        if matrix.len() < 16 {
            return Err(TifgridError::GeoKey(format!(
                "model transformation has {} of 16 values",
                matrix.len()
            )));
        }
        return Ok(GeoTransform::new(
            matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5],
        ));
    }

    let scale = find_f64_vec(decoder, MODEL_PIXEL_SCALE)?;
    let tiepoint = find_f64_vec(decoder, MODEL_TIEPOINT)?;
    match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) if scale.len() >= 2 && tiepoint.len() >= 6 => {
            let (scale_x, scale_y) = (scale[0], scale[1]);
            Ok(GeoTransform::north_up(
                tiepoint[3] - tiepoint[0] * scale_x,
                tiepoint[4] + tiepoint[1] * scale_y,
                scale_x,
                -scale_y,
            ))
        }
        (None, None) => Ok(GeoTransform::default()),
        _ => {
            log::debug!("ignoring incomplete pixel scale / tiepoint georeferencing");
            Ok(GeoTransform::default())
        }
    }
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>> {
    let Some(text) = find_string(decoder, GDAL_NODATA)? else {
        return Ok(None);
    };
    let text = text.trim_end_matches('\0').trim();
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| TifgridError::GeoKey(format!("invalid GDAL_NODATA value {text:?}")))
}

fn read_geo_keys<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<GeoKeyDirectory>> {
    let Some(directory) = decoder.find_tag(tag(GEO_KEY_DIRECTORY))? else {
        return Ok(None);
    };
    let directory = directory.into_u16_vec()?;
    let doubles = find_f64_vec(decoder, GEO_DOUBLE_PARAMS)?;
    let ascii = find_string(decoder, GEO_ASCII_PARAMS)?;
    GeoKeyDirectory::from_tags(&directory, doubles.as_deref(), ascii.as_deref()).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_values_resolve_first_element() {
        assert_eq!(value_as_usize(&Value::Short(3)).unwrap(), 3);
        let list = Value::List(vec![Value::Short(8), Value::Short(8), Value::Short(8)]);
        assert_eq!(value_as_usize(&list).unwrap(), 8);
        assert!(value_as_usize(&Value::List(vec![])).is_err());
        assert!(value_as_usize(&Value::Double(1.0)).is_err());
    }
}
