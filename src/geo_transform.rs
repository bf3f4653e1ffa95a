use std::ffi::c_double;

/// An affine transform.
///
/// A six-element array storing the coefficients of an [affine transform]
/// used in mapping coordinates between pixel/line `(P, L)` (raster) space,
/// and `(Xp,Yp)` (projection) space.
///
///   * `GeoTransform[0]`: x-coordinate of the upper-left corner of the upper-left pixel.
///   * `GeoTransform[1]`: W-E pixel resolution (pixel width).
///   * `GeoTransform[2]`: row rotation (typically zero).
///   * `GeoTransform[3]`: y-coordinate of the upper-left corner of the upper-left pixel.
///   * `GeoTransform[4]`: column rotation (typically zero).
///   * `GeoTransform[5]`: N-S pixel resolution (pixel height), negative value for a North-up image.
///
/// [affine transform]: https://en.wikipedia.org/wiki/Affine_transformation
pub type GeoTransform = [c_double; 6];

/// Extension methods on [`GeoTransform`]
pub trait GeoTransformEx {
    /// Pixel width, the value the pyramid registry resolves against.
    fn cell_size(&self) -> f64;

    /// Bit-for-bit equality; `-0.0` and `0.0` compare equal.
    fn exactly_equals(&self, other: &GeoTransform) -> bool;
}

impl GeoTransformEx for GeoTransform {
    fn cell_size(&self) -> f64 {
        self[1].abs()
    }

    fn exactly_equals(&self, other: &GeoTransform) -> bool {
        self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}
