use ndarray::{Array3, Axis};

use crate::buffer::{map_buffer, RasterBuffer, Sample};
use crate::error::{Result, TifgridError};
use crate::geometry::{intersect, Point, Rectangle};

/// Crop `buffer` to the pixel bounding box of `polygon` (pixel
/// coordinates, x to the right, y down).
///
/// Returns the crop together with its offset in `buffer`, or `None` when
/// the polygon's bounding box misses the buffer. With `nodata`, pixels whose
/// centre lies outside the polygon are overwritten with it; without, the
/// plain bounding-box crop is returned.
pub fn cut_raster(
    buffer: &RasterBuffer,
    polygon: &[(f64, f64)],
    nodata: Option<f64>,
) -> Result<Option<(RasterBuffer, Point)>> {
    let Some(bounds) = bounding_box(polygon) else {
        return Ok(None);
    };
    let Ok(extent) = Rectangle::from_size(buffer.size()) else {
        return Ok(None);
    };
    let Some(crop) = intersect(&extent, &bounds) else {
        return Ok(None);
    };

    let mut cropped = buffer.window(&crop)?;
    if let Some(nodata) = nodata {
        let origin = crop.left_top();
        map_buffer!(&mut cropped, array => fill_outside(array, origin, polygon, nodata))?;
    }
    Ok(Some((cropped, crop.left_top())))
}

/// Integer bounding box, inclusive of the pixel holding the maximum
/// coordinate, clipped to non-negative pixels.
fn bounding_box(polygon: &[(f64, f64)]) -> Option<Rectangle> {
    if polygon.is_empty() || polygon.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return None;
    }
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in polygon {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    let left_top = Point::new(min_x.floor().max(0.0) as usize, min_y.floor().max(0.0) as usize);
    let right_bottom = Point::new(
        (max_x.floor() + 1.0).max(0.0) as usize,
        (max_y.floor() + 1.0).max(0.0) as usize,
    );
    Rectangle::new(left_top, right_bottom).ok()
}

fn fill_outside<T: Sample>(
    array: &mut Array3<T>,
    origin: Point,
    polygon: &[(f64, f64)],
    nodata: f64,
) -> Result<()> {
    let value = T::from_f64(nodata).ok_or(TifgridError::NodataNotRepresentable {
        value: nodata,
        pixel_type: T::PIXEL_TYPE,
    })?;
    for (row, mut line) in array.axis_iter_mut(Axis(0)).enumerate() {
        for (col, mut pixel) in line.axis_iter_mut(Axis(0)).enumerate() {
            let centre = (
                (origin.x + col) as f64 + 0.5,
                (origin.y + row) as f64 + 0.5,
            );
            if !point_in_polygon(centre, polygon) {
                pixel.fill(value);
            }
        }
    }
    Ok(())
}

/// Even-odd ray casting test.
fn point_in_polygon(point: (f64, f64), polygon: &[(f64, f64)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let (px, py) = point;
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for (i, &(xi, yi)) in polygon.iter().enumerate() {
        let (xj, yj) = polygon[j];
        if ((yi > py) != (yj > py)) && (px < (xj - xi) * (py - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn ramp(rows: usize, cols: usize) -> RasterBuffer {
        RasterBuffer::from(Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f32))
    }

    #[test]
    fn crops_to_the_bounding_box() {
        let buffer = ramp(10, 10);
        let square = [(2.0, 3.0), (6.0, 3.0), (6.0, 7.0), (2.0, 7.0)];
        let (cropped, offset) = cut_raster(&buffer, &square, None).unwrap().unwrap();
        assert_eq!(offset, Point::new(2, 3));
        assert_eq!(cropped.size(), crate::geometry::Size::new(5, 5));
        let band = cropped.band_view::<f32>(0).unwrap();
        assert_eq!(band[[0, 0]], 32.0);
        assert_eq!(band[[4, 4]], 76.0);
    }

    #[test]
    fn fills_pixels_outside_the_polygon() {
        let buffer = ramp(8, 8);
        let triangle = [(0.0, 0.0), (8.0, 0.0), (0.0, 8.0)];
        let (cropped, offset) = cut_raster(&buffer, &triangle, Some(-1.0)).unwrap().unwrap();
        assert_eq!(offset, Point::new(0, 0));
        let band = cropped.band_view::<f32>(0).unwrap();
        // centre (0.5, 0.5) is inside, (7.5, 7.5) is not
        assert_eq!(band[[0, 0]], 0.0);
        assert_eq!(band[[7, 7]], -1.0);
        assert_eq!(band[[0, 6]], 6.0);
        assert_eq!(band[[1, 7]], -1.0);
    }

    #[test]
    fn clips_to_the_buffer_and_rejects_disjoint_shapes() {
        let buffer = ramp(4, 4);
        let overhang = [(-3.0, -3.0), (1.0, -3.0), (1.0, 1.0), (-3.0, 1.0)];
        let (cropped, offset) = cut_raster(&buffer, &overhang, None).unwrap().unwrap();
        assert_eq!(offset, Point::new(0, 0));
        assert_eq!(cropped.size(), crate::geometry::Size::new(2, 2));

        let far = [(10.0, 10.0), (12.0, 10.0), (12.0, 12.0)];
        assert!(cut_raster(&buffer, &far, Some(0.0)).unwrap().is_none());
        assert!(cut_raster(&buffer, &[], None).unwrap().is_none());
    }

    #[test]
    fn nodata_must_fit_the_pixel_type() {
        let buffer = RasterBuffer::from(Array2::<u8>::zeros((4, 4)));
        let square = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)];
        assert!(matches!(
            cut_raster(&buffer, &square, Some(-1.0)),
            Err(TifgridError::NodataNotRepresentable { .. })
        ));
    }

    #[test]
    fn ray_casting_handles_concave_shapes() {
        let notch = [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (2.0, 1.0), (0.0, 4.0)];
        assert!(point_in_polygon((1.0, 0.5), &notch));
        assert!(!point_in_polygon((2.0, 3.0), &notch));
        assert!(!point_in_polygon((0.5, 0.5), &notch[..2]));
    }
}
