/// Affine pixel-to-world mapping in GDAL coefficient order
/// `(x0, dx, rot1, y0, rot2, dy)`.
///
/// Pixel `(col, row)` maps to
/// `(x0 + col * dx + row * rot1, y0 + col * rot2 + row * dy)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub column_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(
        origin_x: f64,
        pixel_width: f64,
        row_rotation: f64,
        origin_y: f64,
        column_rotation: f64,
        pixel_height: f64,
    ) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation,
            origin_y,
            column_rotation,
            pixel_height,
        }
    }

    /// A north-up transform with no rotation terms.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self::new(origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height)
    }

    pub fn from_gdal(coefficients: [f64; 6]) -> Self {
        let [x0, dx, rot1, y0, rot2, dy] = coefficients;
        Self::new(x0, dx, rot1, y0, rot2, dy)
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.column_rotation,
            self.pixel_height,
        ]
    }

    pub fn is_rotated(&self) -> bool {
        self.row_rotation != 0.0 || self.column_rotation != 0.0
    }

    /// World coordinates of the top-left corner of pixel `(col, row)`.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.column_rotation + row * self.pixel_height,
        )
    }

    /// The transform whose pixel `(0, 0)` is this transform's pixel
    /// `(col, row)`. Offsets may be negative.
    pub fn shifted(&self, col: f64, row: f64) -> Self {
        let (origin_x, origin_y) = self.apply(col, row);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 1.0, 0.0, 0.0, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gdal_order_round_trips() {
        let coefficients = [500_000.0, 0.5, 0.0, 6_200_000.0, 0.0, -0.5];
        assert_eq!(GeoTransform::from_gdal(coefficients).to_gdal(), coefficients);
    }

    #[test]
    fn shifting_back_and_forth_restores_origin() {
        let transform = GeoTransform::north_up(100.0, 200.0, 2.0, -3.0);
        let tile = transform.shifted(64.0, 32.0);
        assert_relative_eq!(tile.origin_x, 228.0);
        assert_relative_eq!(tile.origin_y, 104.0);

        let back = tile.shifted(-64.0, -32.0);
        assert_relative_eq!(back.origin_x, transform.origin_x);
        assert_relative_eq!(back.origin_y, transform.origin_y);
    }

    #[test]
    fn rotation_terms_contribute_to_shift() {
        let transform = GeoTransform::new(0.0, 1.0, 0.5, 0.0, 0.25, -1.0);
        assert!(transform.is_rotated());
        let (x, y) = transform.apply(4.0, 2.0);
        assert_relative_eq!(x, 5.0);
        assert_relative_eq!(y, -1.0);
    }
}
