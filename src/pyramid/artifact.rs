//! Metadata snapshot of one raster container.

use std::path::{Path, PathBuf};

use crate::dataset::Dataset;
use crate::errors::Result;
use crate::geo_transform::GeoTransform;
use crate::metadata::Metadata;
use crate::pyramid::conventions::PixelType;
use crate::raster::{data_type_name, NoDataValue, RasterBand};

/// Per-band statistics as stored in `STATISTICS_*` metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStatistics {
    pub minimum: f64,
    pub maximum: f64,
    pub mean: f64,
    pub std_dev: f64,
    /// `Some(false)` only when the band says `STATISTICS_APPROXIMATE=NO`.
    pub approximate: Option<bool>,
}

impl BandStatistics {
    pub fn is_exact(&self) -> bool {
        self.approximate == Some(false)
    }

    fn from_band(band: &RasterBand) -> Option<BandStatistics> {
        let item = |key: &str| {
            band.metadata_item(key, "")
                .and_then(|v| v.trim().parse::<f64>().ok())
        };
        let approximate = band
            .metadata_item("STATISTICS_APPROXIMATE", "")
            .map(|v| v.trim().eq_ignore_ascii_case("YES"));
        Some(BandStatistics {
            minimum: item("STATISTICS_MINIMUM")?,
            maximum: item("STATISTICS_MAXIMUM")?,
            mean: item("STATISTICS_MEAN")?,
            std_dev: item("STATISTICS_STDDEV")?,
            approximate,
        })
    }
}

/// Everything the compliance checker needs to know about a container.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterArtifact {
    pub path: PathBuf,
    /// Short driver name, `GTiff` for TIFF containers.
    pub driver: String,
    pub size: (usize, usize),
    pub band_count: usize,
    /// GDAL name of the first band's data type.
    pub data_type: String,
    /// `None` when the data type has no pyramid counterpart (complex types).
    pub pixel_type: Option<PixelType>,
    pub no_data: Vec<Option<NoDataValue>>,
    /// `IMAGE_STRUCTURE/COMPRESSION`, absent for uncompressed files.
    pub compression: Option<String>,
    pub geo_transform: Option<GeoTransform>,
    pub statistics: Vec<Option<BandStatistics>>,
    /// Overview sizes of the first band, finest first.
    pub overviews: Vec<(usize, usize)>,
    pub block_size: (usize, usize),
}

impl RasterArtifact {
    /// Snapshot the metadata of an open dataset.
    pub fn from_dataset(path: &Path, dataset: &Dataset) -> Result<RasterArtifact> {
        let band_count = dataset.raster_count();
        let mut no_data = Vec::with_capacity(band_count);
        let mut statistics = Vec::with_capacity(band_count);
        for index in 1..=band_count {
            let band = dataset.rasterband(index)?;
            no_data.push(band.no_data_value());
            statistics.push(BandStatistics::from_band(&band));
        }

        let (data_type, pixel_type, overviews, block_size) = if band_count > 0 {
            let band = dataset.rasterband(1)?;
            let overviews = (0..band.overview_count())
                .map(|i| band.overview(i).map(|o| o.size()))
                .collect::<Result<Vec<_>>>()?;
            (
                data_type_name(band.band_type()),
                PixelType::from_gdal(band.band_type()),
                overviews,
                band.block_size(),
            )
        } else {
            ("Unknown".to_string(), None, Vec::new(), (0, 0))
        };

        Ok(RasterArtifact {
            path: path.to_path_buf(),
            driver: dataset.driver().short_name(),
            size: dataset.raster_size(),
            band_count,
            data_type,
            pixel_type,
            no_data,
            compression: dataset.metadata_item("COMPRESSION", "IMAGE_STRUCTURE"),
            geo_transform: dataset.geo_transform().ok(),
            statistics,
            overviews,
            block_size,
        })
    }

    pub fn is_tiff(&self) -> bool {
        self.driver.eq_ignore_ascii_case("GTiff") || self.driver.eq_ignore_ascii_case("COG")
    }
}
