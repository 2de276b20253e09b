//! Owned pixel data in `[row, col, band]` layout.

use std::fmt::Debug;

use ndarray::{s, Array2, Array3, ArrayView2, Axis};

use crate::enums::PixelType;
use crate::error::{Result, TifgridError};
use crate::geometry::{Point, Rectangle, Size};

/// Element types a [`RasterBuffer`] can hold.
pub trait Sample: Copy + Default + PartialEq + Debug + 'static {
    const PIXEL_TYPE: PixelType;

    /// Convert a no-data style value, `None` when it does not fit.
    fn from_f64(value: f64) -> Option<Self>;

    fn into_buffer(array: Array3<Self>) -> RasterBuffer;

    fn array(buffer: &RasterBuffer) -> Option<&Array3<Self>>;

    fn array_mut(buffer: &mut RasterBuffer) -> Option<&mut Array3<Self>>;

    fn take_array(buffer: RasterBuffer) -> Option<Array3<Self>>;
}

fn exact_integer(value: f64, min: f64, max: f64) -> Option<f64> {
    (value.fract() == 0.0 && value >= min && value <= max).then_some(value)
}

macro_rules! impl_sample {
    ($ty:ty, $variant:ident, |$value:ident| $convert:expr) => {
        impl Sample for $ty {
            const PIXEL_TYPE: PixelType = PixelType::$variant;

            fn from_f64($value: f64) -> Option<Self> {
                $convert
            }

            fn into_buffer(array: Array3<Self>) -> RasterBuffer {
                RasterBuffer::$variant(array)
            }

            fn array(buffer: &RasterBuffer) -> Option<&Array3<Self>> {
                match buffer {
                    RasterBuffer::$variant(array) => Some(array),
                    _ => None,
                }
            }

            fn array_mut(buffer: &mut RasterBuffer) -> Option<&mut Array3<Self>> {
                match buffer {
                    RasterBuffer::$variant(array) => Some(array),
                    _ => None,
                }
            }

            fn take_array(buffer: RasterBuffer) -> Option<Array3<Self>> {
                match buffer {
                    RasterBuffer::$variant(array) => Some(array),
                    _ => None,
                }
            }
        }
    };
}

impl_sample!(u8, U8, |value| exact_integer(value, 0.0, u8::MAX as f64).map(|v| v as u8));
impl_sample!(u16, U16, |value| exact_integer(value, 0.0, u16::MAX as f64).map(|v| v as u16));
impl_sample!(i16, I16, |value| {
    exact_integer(value, i16::MIN as f64, i16::MAX as f64).map(|v| v as i16)
});
impl_sample!(f32, F32, |value| {
    (!value.is_finite() || value.abs() <= f32::MAX as f64).then_some(value as f32)
});
impl_sample!(f64, F64, |value| Some(value));

/// Pixel data of one supported [`PixelType`].
///
/// Single-band data carries a band axis of length one; use
/// [`RasterBuffer::band_view`] for a `[row, col]` view.
#[derive(Clone, Debug, PartialEq)]
pub enum RasterBuffer {
    U8(Array3<u8>),
    U16(Array3<u16>),
    I16(Array3<i16>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

macro_rules! map_buffer {
    ($buffer:expr, $array:ident => $body:expr) => {
        match $buffer {
            RasterBuffer::U8($array) => $body,
            RasterBuffer::U16($array) => $body,
            RasterBuffer::I16($array) => $body,
            RasterBuffer::F32($array) => $body,
            RasterBuffer::F64($array) => $body,
        }
    };
}

pub(crate) use map_buffer;

impl<T: Sample> From<Array3<T>> for RasterBuffer {
    fn from(array: Array3<T>) -> Self {
        T::into_buffer(array)
    }
}

impl<T: Sample> From<Array2<T>> for RasterBuffer {
    fn from(array: Array2<T>) -> Self {
        T::into_buffer(array.insert_axis(Axis(2)))
    }
}

fn filled_array<T: Sample>(size: Size, bands: usize, fill: Option<f64>) -> Result<RasterBuffer> {
    let value = match fill {
        Some(value) => T::from_f64(value).ok_or(TifgridError::NodataNotRepresentable {
            value,
            pixel_type: T::PIXEL_TYPE,
        })?,
        None => T::default(),
    };
    Ok(Array3::from_elem((size.height, size.width, bands), value).into())
}

fn paste_array<T: Sample>(target: &mut Array3<T>, source: &Array3<T>, at: Point) {
    let (rows, cols, _) = source.dim();
    target
        .slice_mut(s![at.y..at.y + rows, at.x..at.x + cols, ..])
        .assign(source);
}

impl RasterBuffer {
    /// A buffer of `size` pixels set to `fill`, or to zero when `fill` is
    /// `None`.
    pub fn filled(
        pixel_type: PixelType,
        size: Size,
        bands: usize,
        fill: Option<f64>,
    ) -> Result<Self> {
        match pixel_type {
            PixelType::U8 => filled_array::<u8>(size, bands, fill),
            PixelType::U16 => filled_array::<u16>(size, bands, fill),
            PixelType::I16 => filled_array::<i16>(size, bands, fill),
            PixelType::F32 => filled_array::<f32>(size, bands, fill),
            PixelType::F64 => filled_array::<f64>(size, bands, fill),
        }
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            Self::U8(_) => PixelType::U8,
            Self::U16(_) => PixelType::U16,
            Self::I16(_) => PixelType::I16,
            Self::F32(_) => PixelType::F32,
            Self::F64(_) => PixelType::F64,
        }
    }

    /// `(rows, cols, bands)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        map_buffer!(self, array => array.dim())
    }

    pub fn size(&self) -> Size {
        let (rows, cols, _) = self.dim();
        Size::new(cols, rows)
    }

    pub fn bands(&self) -> usize {
        self.dim().2
    }

    pub fn as_array<T: Sample>(&self) -> Option<&Array3<T>> {
        T::array(self)
    }

    pub fn as_array_mut<T: Sample>(&mut self) -> Option<&mut Array3<T>> {
        T::array_mut(self)
    }

    pub fn into_array<T: Sample>(self) -> Option<Array3<T>> {
        T::take_array(self)
    }

    /// `[row, col]` view of one band.
    pub fn band_view<T: Sample>(&self, band: usize) -> Option<ArrayView2<'_, T>> {
        T::array(self)
            .filter(|array| band < array.dim().2)
            .map(|array| array.index_axis(Axis(2), band))
    }

    fn check_inside(&self, region: &Rectangle) -> Result<()> {
        let extent = self.size();
        if region.right_bottom().x > extent.width || region.right_bottom().y > extent.height {
            return Err(TifgridError::RegionOutOfBounds {
                region: *region,
                extent,
            });
        }
        Ok(())
    }

    /// Owned copy of the pixels inside `region`.
    pub fn window(&self, region: &Rectangle) -> Result<Self> {
        self.check_inside(region)?;
        let (x0, y0) = (region.left_top().x, region.left_top().y);
        let (x1, y1) = (region.right_bottom().x, region.right_bottom().y);
        Ok(map_buffer!(self, array => {
            RasterBuffer::from(array.slice(s![y0..y1, x0..x1, ..]).to_owned())
        }))
    }

    /// Copy `source` into this buffer with its top-left pixel at `at`.
    pub fn paste(&mut self, source: &RasterBuffer, at: Point) -> Result<()> {
        let (expected, found) = (self.pixel_type(), source.pixel_type());
        if expected != found {
            return Err(TifgridError::PixelTypeMismatch { expected, found });
        }
        if self.bands() != source.bands() {
            return Err(TifgridError::BandCountMismatch {
                expected: self.bands(),
                found: source.bands(),
            });
        }
        self.check_inside(&Rectangle::from_origin_size(at, source.size())?)?;

        match (self, source) {
            (Self::U8(target), Self::U8(source)) => paste_array(target, source, at),
            (Self::U16(target), Self::U16(source)) => paste_array(target, source, at),
            (Self::I16(target), Self::I16(source)) => paste_array(target, source, at),
            (Self::F32(target), Self::F32(source)) => paste_array(target, source, at),
            (Self::F64(target), Self::F64(source)) => paste_array(target, source, at),
            _ => unreachable!("pixel types checked above"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn single_band_arrays_gain_a_band_axis() {
        let buffer = RasterBuffer::from(array![[1u8, 2, 3], [4, 5, 6]]);
        assert_eq!(buffer.dim(), (2, 3, 1));
        assert_eq!(buffer.size(), Size::new(3, 2));
        assert_eq!(buffer.band_view::<u8>(0).unwrap()[[1, 2]], 6);
        assert!(buffer.band_view::<f32>(0).is_none());
        assert!(buffer.band_view::<u8>(1).is_none());
    }

    #[test]
    fn filled_rejects_unrepresentable_nodata() {
        let size = Size::new(4, 2);
        let buffer = RasterBuffer::filled(PixelType::I16, size, 1, Some(-9999.0)).unwrap();
        assert!(buffer.as_array::<i16>().unwrap().iter().all(|&v| v == -9999));

        assert!(matches!(
            RasterBuffer::filled(PixelType::U8, size, 1, Some(-9999.0)),
            Err(TifgridError::NodataNotRepresentable { .. })
        ));
        assert!(RasterBuffer::filled(PixelType::U16, size, 1, Some(0.5)).is_err());

        let nan = RasterBuffer::filled(PixelType::F32, size, 2, Some(f64::NAN)).unwrap();
        assert!(nan.as_array::<f32>().unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn window_and_paste_are_inverse() {
        let source = Array3::from_shape_fn((6, 8, 2), |(r, c, b)| (r * 100 + c * 10 + b) as f32);
        let buffer = RasterBuffer::from(source.clone());
        let region = Rectangle::new(Point::new(2, 1), Point::new(7, 4)).unwrap();

        let window = buffer.window(&region).unwrap();
        assert_eq!(window.dim(), (3, 5, 2));
        assert_eq!(window.as_array::<f32>().unwrap()[[0, 0, 1]], 121.0);

        let mut target = RasterBuffer::filled(PixelType::F32, Size::new(8, 6), 2, None).unwrap();
        target.paste(&window, region.left_top()).unwrap();
        let target = target.into_array::<f32>().unwrap();
        assert_eq!(
            target.slice(s![1..4, 2..7, ..]),
            source.slice(s![1..4, 2..7, ..])
        );
        assert_eq!(target[[0, 0, 0]], 0.0);
    }

    #[test]
    fn paste_checks_type_bands_and_bounds() {
        let mut target = RasterBuffer::filled(PixelType::U8, Size::new(4, 4), 1, None).unwrap();
        let wrong_type = RasterBuffer::filled(PixelType::F32, Size::new(2, 2), 1, None).unwrap();
        let wrong_bands = RasterBuffer::filled(PixelType::U8, Size::new(2, 2), 3, None).unwrap();
        let fits = RasterBuffer::filled(PixelType::U8, Size::new(2, 2), 1, None).unwrap();

        assert!(matches!(
            target.paste(&wrong_type, Point::new(0, 0)),
            Err(TifgridError::PixelTypeMismatch { .. })
        ));
        assert!(matches!(
            target.paste(&wrong_bands, Point::new(0, 0)),
            Err(TifgridError::BandCountMismatch { .. })
        ));
        assert!(matches!(
            target.paste(&fits, Point::new(3, 0)),
            Err(TifgridError::RegionOutOfBounds { .. })
        ));
        assert!(target.paste(&fits, Point::new(2, 2)).is_ok());
    }
}
