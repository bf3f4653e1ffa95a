//! Pyramidal cloud-optimized GeoTIFFs on top of [GDAL](http://gdal.org/).
//!
//! A pyramid container is a tiled BigTIFF on one of a fixed set of global
//! lat/lon grids ([`PyramidLevel`]), with internal overviews, canonical
//! no-data and exact band statistics. This crate can
//!
//! * validate the byte layout of a cloud-optimized GeoTIFF ([`validate`]),
//! * decide whether a raster already follows the pyramid conventions
//!   ([`compliance::check`]),
//! * build a compliant container from an arbitrary raster
//!   ([`pipeline::make_pyramid_compliant`]).
//!
//! ## Use
//!
//! ```rust,no_run
//! use std::path::Path;
//! use pog::compliance::{check, ComplianceOptions};
//! use pog::pipeline::{make_pyramid_compliant, PipelineConfig};
//! use pog::progress::LogProgress;
//! use pog::GdalEngine;
//!
//! let engine = GdalEngine::default();
//! let path = Path::new("fixtures/landcover.tif");
//! let report = check(&engine, path, &ComplianceOptions::default())?;
//! if !report.is_compliant() {
//!     let artifact = make_pyramid_compliant(
//!         &engine,
//!         path,
//!         None,
//!         &PipelineConfig::default(),
//!         &mut LogProgress::new(),
//!     )?;
//!     println!("{} is now at {:?}", artifact.path.display(), report.level);
//! }
//! # Ok::<(), pog::errors::PogError>(())
//! ```

#![crate_name = "pog"]
#![crate_type = "lib"]

pub mod batch;
pub mod compliance;
pub mod config;
pub mod cpl;
mod dataset;
mod driver;
pub mod engine;
pub mod errors;
mod geo_transform;
mod metadata;
pub mod options;
pub mod pipeline;
pub mod programs;
pub mod progress;
pub mod pyramid;
pub mod raster;
mod utils;
pub mod validate;
pub mod vsi;

pub use dataset::Dataset;
pub use driver::Driver;
pub use engine::{GdalEngine, RasterEngine};
pub use geo_transform::{GeoTransform, GeoTransformEx};
pub use metadata::Metadata;
pub use options::DatasetOptions;
pub use pyramid::PyramidLevel;
pub use validate::{validate, ValidateOptions, ValidationReport};

#[cfg(test)]
mod test_utils;
