//! Affine pixel-to-map transforms.

use crate::C;

/// Six-coefficient affine transform from pixel `(col, row)` to map
/// `(x, y)`:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// Pixel `(0, 0)` is the upper-left corner of the upper-left sample,
/// so the center of sample `(col, row)` is `(col + 0.5, row + 0.5)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub a: C,
    pub b: C,
    pub c: C,
    pub d: C,
    pub e: C,
    pub f: C,
}

impl GeoTransform {
    pub const fn new(a: C, b: C, c: C, d: C, e: C, f: C) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform with its upper-left corner at `(west, north)`.
    pub fn from_origin(west: C, north: C, x_res: C, y_res: C) -> Self {
        Self::new(x_res, 0.0, west, 0.0, -y_res, north)
    }

    /// Builds a transform from GDAL's `[c, a, b, f, d, e]` ordering.
    pub fn from_gdal(gt: [C; 6]) -> Self {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    pub fn to_gdal(&self) -> [C; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// Coefficients in on-disk order.
    pub fn coefficients(&self) -> [C; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// Maps pixel coordinates to map coordinates.
    #[inline]
    pub fn apply(&self, col: C, row: C) -> (C, C) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    pub fn determinant(&self) -> C {
        self.a * self.e - self.b * self.d
    }

    /// Returns the map-to-pixel transform, or `None` if `self` is
    /// singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < C::EPSILON || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Self {
            a: self.e * inv_det,
            b: -self.b * inv_det,
            c: (self.b * self.f - self.c * self.e) * inv_det,
            d: -self.d * inv_det,
            e: self.a * inv_det,
            f: (self.c * self.d - self.a * self.f) * inv_det,
        })
    }

    /// Returns the transform of a window whose pixel `(0, 0)` is
    /// pixel `(col_off, row_off)` of `self`.
    pub fn translate_pixels(&self, col_off: usize, row_off: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let (c, f) = self.apply(col_off as C, row_off as C);
        Self { c, f, ..*self }
    }

    /// Returns `(width, height)` of a single pixel in map units.
    pub fn pixel_size(&self) -> (C, C) {
        (self.a.hypot(self.d), self.b.hypot(self.e))
    }

    pub fn is_north_up(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::GeoTransform;
    use approx::assert_relative_eq;

    #[test]
    fn test_apply_north_up() {
        let gt = GeoTransform::from_origin(580_000.0, 4_520_000.0, 10.0, 10.0);
        assert_eq!(gt.apply(0.0, 0.0), (580_000.0, 4_520_000.0));
        assert_eq!(gt.apply(2.0, 3.0), (580_020.0, 4_519_970.0));
        assert!(gt.is_north_up());
    }

    #[test]
    fn test_inverse_roundtrip() {
        let gt = GeoTransform::new(10.0, 2.0, 500.0, 1.5, -10.0, 9000.0);
        let inv = gt.inverse().unwrap();
        let (x, y) = gt.apply(3.25, 7.5);
        let (col, row) = inv.apply(x, y);
        assert_relative_eq!(col, 3.25, epsilon = 1e-9);
        assert_relative_eq!(row, 7.5, epsilon = 1e-9);
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let gt = GeoTransform::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0);
        assert!(gt.inverse().is_none());
    }

    #[test]
    fn test_translate_pixels() {
        let gt = GeoTransform::from_origin(-74.17, 40.85, 0.01, 0.01);
        let window = gt.translate_pixels(3, 5);
        let (x, y) = window.apply(0.0, 0.0);
        let (expected_x, expected_y) = gt.apply(3.0, 5.0);
        assert_relative_eq!(x, expected_x);
        assert_relative_eq!(y, expected_y);
        assert_eq!(window.a, gt.a);
        assert_eq!(window.e, gt.e);
    }

    #[test]
    fn test_gdal_ordering() {
        let gdal = [580_000.0, 10.0, 0.0, 4_520_000.0, 0.0, -10.0];
        let gt = GeoTransform::from_gdal(gdal);
        assert_eq!(gt, GeoTransform::from_origin(580_000.0, 4_520_000.0, 10.0, 10.0));
        assert_eq!(gt.to_gdal(), gdal);
    }
}
