//! Pyramid conventions: the resolution ladder, the per-type rules and the
//! metadata snapshot they are checked against.

pub mod artifact;
pub mod conventions;
mod level;

pub use artifact::{BandStatistics, RasterArtifact};
pub use conventions::{Compression, PixelType, Resampling, BLOCK_SIZE};
pub use level::{geotransform, overview_ladder, resolve, ParseLevelError, PyramidLevel, SNAP_TOLERANCE};
