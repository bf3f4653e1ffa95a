//! The closed ladder of global resolutions a pyramid raster may use.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::geo_transform::GeoTransform;

/// Relative tolerance used to snap a measured cell size onto a level.
///
/// Wide enough to absorb decimal round-off in headers written by other tools
/// (`0.0083333333` for 30″), narrow enough to reject a neighbouring
/// resolution or a value that was merely rounded to seven digits.
pub const SNAP_TOLERANCE: f64 = 1e-7;

/// Arcseconds in a full turn of longitude.
const GLOBE_WIDTH_ARCSEC: u32 = 360 * 3600;
/// Arcseconds from pole to pole.
const GLOBE_HEIGHT_ARCSEC: u32 = 180 * 3600;

/// A supported global resolution, keyed by its size in arcseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum PyramidLevel {
    Arc1 = 1,
    Arc10 = 10,
    Arc30 = 30,
    Arc150 = 150,
    Arc300 = 300,
    Arc900 = 900,
    Arc1800 = 1800,
    Arc3600 = 3600,
    Arc7200 = 7200,
    Arc14400 = 14400,
    Arc36000 = 36000,
}

impl PyramidLevel {
    /// Every level, finest first.
    pub const ALL: [PyramidLevel; 11] = [
        PyramidLevel::Arc1,
        PyramidLevel::Arc10,
        PyramidLevel::Arc30,
        PyramidLevel::Arc150,
        PyramidLevel::Arc300,
        PyramidLevel::Arc900,
        PyramidLevel::Arc1800,
        PyramidLevel::Arc3600,
        PyramidLevel::Arc7200,
        PyramidLevel::Arc14400,
        PyramidLevel::Arc36000,
    ];

    pub fn from_arcseconds(arcsec: u32) -> Option<PyramidLevel> {
        PyramidLevel::ALL
            .into_iter()
            .find(|level| level.arcseconds() == arcsec)
    }

    pub fn arcseconds(self) -> u32 {
        self as u32
    }

    /// Cell size in decimal degrees, the correctly rounded value of `arcsec / 3600`.
    pub fn cell_size(self) -> f64 {
        f64::from(self.arcseconds()) / 3600.0
    }

    /// Origin at (-180, 90), north-up, square cells.
    pub fn geotransform(self) -> GeoTransform {
        let cs = self.cell_size();
        [-180.0, cs, 0.0, 90.0, 0.0, -cs]
    }

    /// Raster size `(columns, rows)` covering the globe.
    pub fn shape(self) -> (usize, usize) {
        let arcsec = self.arcseconds();
        (
            (GLOBE_WIDTH_ARCSEC / arcsec) as usize,
            (GLOBE_HEIGHT_ARCSEC / arcsec) as usize,
        )
    }

    /// Overview decimation factors, strictly increasing powers of two.
    ///
    /// The ladder stops at the first overview no wider than 256 columns.
    pub fn overview_ladder(self) -> &'static [u32] {
        const LADDER: [u32; 13] = [2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192];
        let depth = match self {
            PyramidLevel::Arc1 => 13,
            PyramidLevel::Arc10 => 9,
            PyramidLevel::Arc30 => 8,
            PyramidLevel::Arc150 => 6,
            PyramidLevel::Arc300 => 5,
            PyramidLevel::Arc900 => 3,
            PyramidLevel::Arc1800 => 2,
            PyramidLevel::Arc3600 => 1,
            PyramidLevel::Arc7200 | PyramidLevel::Arc14400 | PyramidLevel::Arc36000 => 0,
        };
        &LADDER[..depth]
    }

    /// Expected overview sizes, `ceil(size / factor)` for each ladder factor.
    pub fn overview_shapes(self) -> Vec<(usize, usize)> {
        let (cols, rows) = self.shape();
        self.overview_ladder()
            .iter()
            .map(|&f| (cols.div_ceil(f as usize), rows.div_ceil(f as usize)))
            .collect()
    }

    /// Inclusive cell-size band that snaps onto this level.
    pub fn tolerance_band(self) -> (f64, f64) {
        let cs = self.cell_size();
        (cs * (1.0 - SNAP_TOLERANCE), cs * (1.0 + SNAP_TOLERANCE))
    }
}

impl Display for PyramidLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\"", self.arcseconds())
    }
}

/// Error returned when a string does not name a pyramid level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a pyramid level; expected one of 1, 10, 30, 150, 300, 900, 1800, 3600, 7200, 14400, 36000 arcseconds")]
pub struct ParseLevelError(String);

/// Accepts `900`, `900s`, `900"`, `900arcsec` and `900 arcseconds`.
impl FromStr for PyramidLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits_end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, suffix) = trimmed.split_at(digits_end);
        let suffix_ok = matches!(
            suffix.trim().to_ascii_lowercase().as_str(),
            "" | "s" | "\"" | "″" | "arcsec" | "arcseconds"
        );
        digits
            .parse::<u32>()
            .ok()
            .filter(|_| suffix_ok)
            .and_then(PyramidLevel::from_arcseconds)
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

impl TryFrom<u32> for PyramidLevel {
    type Error = ParseLevelError;

    fn try_from(arcsec: u32) -> Result<Self, Self::Error> {
        PyramidLevel::from_arcseconds(arcsec).ok_or_else(|| ParseLevelError(arcsec.to_string()))
    }
}

/// Maps a measured cell size onto its pyramid level.
///
/// Exact matches are returned directly. Otherwise the first level whose
/// tolerance band contains the measurement wins and an off-canonical note is
/// logged. `None` means the raster cannot join the pyramid.
pub fn resolve(measured_cell_size: f64) -> Option<PyramidLevel> {
    let measured = measured_cell_size.abs();
    if !measured.is_finite() || measured == 0.0 {
        return None;
    }
    if let Some(level) = PyramidLevel::ALL
        .into_iter()
        .find(|level| level.cell_size() == measured)
    {
        return Some(level);
    }
    let level = PyramidLevel::ALL.into_iter().find(|level| {
        let (low, high) = level.tolerance_band();
        low <= measured && measured <= high
    })?;
    tracing::info!(
        measured,
        canonical = level.cell_size(),
        %level,
        "cell size is off-canonical, snapping to pyramid level"
    );
    Some(level)
}

/// The overview ladder of `level`.
pub fn overview_ladder(level: PyramidLevel) -> &'static [u32] {
    level.overview_ladder()
}

/// The canonical geotransform of `level`.
pub fn geotransform(level: PyramidLevel) -> GeoTransform {
    level.geotransform()
}
