//! The raster engine seam.
//!
//! Pipeline stages describe *what* must happen to a working copy; a
//! [`RasterEngine`] does the pixel work. [`GdalEngine`] is the production
//! implementation; tests substitute an in-memory fake.

use std::path::Path;

use crate::cpl::{CslStringList, QuietErrorScope};
use crate::config::ConfigOptionGuard;
use crate::dataset::Dataset;
use crate::driver::Driver;
use crate::errors::{GdalError, PogError, PogResult, Result};
use crate::metadata::Metadata;
use crate::programs::raster::{translate, warp, TranslateOptions, WarpAppOptions};
use crate::progress::ProgressReporter;
use crate::pyramid::{
    BandStatistics, Compression, PixelType, PyramidLevel, RasterArtifact, Resampling, BLOCK_SIZE,
};
use crate::raster::{GDALDataType, GdalType, NoDataValue, RasterBand};
use crate::vsi;

/// Where and how to resample a raster onto the canonical grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTarget {
    pub level: PyramidLevel,
    pub resampling: Resampling,
    pub src_no_data: Option<NoDataValue>,
    pub dst_no_data: NoDataValue,
}

/// Replacement of no-data pixels by the canonical sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct NoDataRewrite {
    /// Sentinel each band declared before the rewrite.
    pub prior: Vec<Option<NoDataValue>>,
    pub target: NoDataValue,
    /// Pixels strictly below this value are treated as no-data too.
    pub floor: Option<f64>,
}

/// Creation settings of the final container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerProfile {
    pub block_size: usize,
    pub compression: Compression,
    pub overview_resampling: Resampling,
    pub resampling: Resampling,
    /// Copy the existing overviews; `false` writes none.
    pub with_overviews: bool,
}

/// The operations the pipeline delegates to a raster library.
///
/// Paths handed to mutating operations are private working copies.
pub trait RasterEngine {
    /// Metadata snapshot of the raster at `path`.
    fn describe(&self, path: &Path) -> PogResult<RasterArtifact>;

    /// Rewrite `src` as a tiled GeoTIFF at `dst`, changing the pixel type if asked.
    fn convert(
        &self,
        src: &Path,
        dst: &Path,
        pixel_type: Option<PixelType>,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()>;

    /// Resample `src` onto the global grid of `target.level`.
    fn warp_to_grid(
        &self,
        src: &Path,
        dst: &Path,
        target: &GridTarget,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()>;

    fn rewrite_no_data(
        &self,
        path: &Path,
        rewrite: &NoDataRewrite,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()>;

    /// Exact statistics of every band, stored with `STATISTICS_APPROXIMATE=NO`.
    fn compute_statistics(
        &self,
        path: &Path,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<Vec<BandStatistics>>;

    /// Replace any existing overviews by exactly `factors`.
    fn build_overviews(
        &self,
        path: &Path,
        factors: &[u32],
        resampling: Resampling,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()>;

    /// Write the cloud-optimized container.
    fn finalize(
        &self,
        src: &Path,
        dst: &Path,
        profile: &ContainerProfile,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()>;

    fn supports_compression(&self, compression: Compression) -> bool;
}

/// [`RasterEngine`] backed by the linked GDAL library.
#[derive(Debug, Clone, Copy)]
pub struct GdalEngine {
    /// Tile size of overviews built on working copies.
    pub overview_block_size: usize,
}

impl Default for GdalEngine {
    fn default() -> Self {
        Self {
            overview_block_size: BLOCK_SIZE,
        }
    }
}

/// Creation options of every intermediate working copy.
const WORKING_COPY_ARGS: [&str; 6] = ["-of", "GTiff", "-co", "TILED=YES", "-co", "BIGTIFF=IF_SAFER"];

impl GdalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(path: &Path) -> PogResult<Dataset> {
        let name = path.to_string_lossy();
        if !vsi::is_remote(&name) && !vsi::path_exists(&name)? {
            return Err(PogError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let _quiet = QuietErrorScope::new();
        Dataset::open(path).map_err(|e| PogError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl RasterEngine for GdalEngine {
    fn describe(&self, path: &Path) -> PogResult<RasterArtifact> {
        let dataset = Self::open(path)?;
        Ok(RasterArtifact::from_dataset(path, &dataset)?)
    }

    fn convert(
        &self,
        src: &Path,
        dst: &Path,
        pixel_type: Option<PixelType>,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        let dataset = Self::open(src)?;
        let mut args: Vec<String> = WORKING_COPY_ARGS.iter().map(|s| s.to_string()).collect();
        if let Some(pixel_type) = pixel_type {
            args.extend(["-ot".to_string(), pixel_type.gdal_name().to_string()]);
        }
        tracing::debug!(?args, dst = %dst.display(), "gdal_translate");
        let options = TranslateOptions::new(args)?;
        translate(&dataset, dst, &options, progress)?;
        Ok(())
    }

    fn warp_to_grid(
        &self,
        src: &Path,
        dst: &Path,
        target: &GridTarget,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        let dataset = Self::open(src)?;
        let cs = target.level.cell_size().to_string();
        let mut args: Vec<String> = WORKING_COPY_ARGS.iter().map(|s| s.to_string()).collect();
        args.extend(
            ["-te", "-180", "-90", "180", "90", "-tr", cs.as_str(), cs.as_str(), "-r"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(target.resampling.warp_name().to_string());
        args.extend(["-dstnodata".to_string(), target.dst_no_data.to_string()]);
        if let Some(src_no_data) = target.src_no_data {
            args.extend(["-srcnodata".to_string(), src_no_data.to_string()]);
        }
        if !dataset.projection().is_empty() {
            args.extend(["-t_srs".to_string(), "EPSG:4326".to_string()]);
        }
        tracing::debug!(?args, dst = %dst.display(), "gdalwarp");
        let options = WarpAppOptions::new(args)?;
        warp(&dataset, dst, &options, progress)?;
        Ok(())
    }

    fn rewrite_no_data(
        &self,
        path: &Path,
        rewrite: &NoDataRewrite,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        Self::open(path)?;
        let dataset = Dataset::open_update(path)?;
        let band_count = dataset.raster_count();
        for index in 1..=band_count {
            progress.begin(&format!("no-data band {index}/{band_count}"));
            let mut band = dataset.rasterband(index)?;
            let prior = rewrite.prior.get(index - 1).copied().flatten();
            match band.band_type() {
                GDALDataType::GDT_Byte => rewrite_band::<u8>(&mut band, prior, rewrite, progress)?,
                #[cfg(gdal_has_int8)]
                GDALDataType::GDT_Int8 => rewrite_band::<i8>(&mut band, prior, rewrite, progress)?,
                GDALDataType::GDT_UInt16 => rewrite_band::<u16>(&mut band, prior, rewrite, progress)?,
                GDALDataType::GDT_Int16 => rewrite_band::<i16>(&mut band, prior, rewrite, progress)?,
                GDALDataType::GDT_UInt32 => rewrite_band::<u32>(&mut band, prior, rewrite, progress)?,
                GDALDataType::GDT_Int32 => rewrite_band::<i32>(&mut band, prior, rewrite, progress)?,
                #[cfg(gdal_has_int64)]
                GDALDataType::GDT_UInt64 => rewrite_band::<u64>(&mut band, prior, rewrite, progress)?,
                #[cfg(gdal_has_int64)]
                GDALDataType::GDT_Int64 => rewrite_band::<i64>(&mut band, prior, rewrite, progress)?,
                GDALDataType::GDT_Float32 => rewrite_band::<f32>(&mut band, prior, rewrite, progress)?,
                GDALDataType::GDT_Float64 => rewrite_band::<f64>(&mut band, prior, rewrite, progress)?,
                other => {
                    return Err(GdalError::UnsupportedDataType(crate::raster::data_type_name(other)).into())
                }
            }
            band.set_no_data_value(rewrite.target)?;
        }
        Ok(())
    }

    fn compute_statistics(
        &self,
        path: &Path,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<Vec<BandStatistics>> {
        Self::open(path)?;
        let dataset = Dataset::open_update(path)?;
        let band_count = dataset.raster_count();
        let mut statistics = Vec::with_capacity(band_count);
        for index in 1..=band_count {
            progress.begin(&format!("statistics band {index}/{band_count}"));
            let mut band = dataset.rasterband(index)?;
            let stats = band.compute_statistics(false, progress)?;
            band.set_metadata_item("STATISTICS_APPROXIMATE", "NO", "")?;
            statistics.push(BandStatistics {
                minimum: stats.min,
                maximum: stats.max,
                mean: stats.mean,
                std_dev: stats.std_dev,
                approximate: Some(false),
            });
        }
        Ok(statistics)
    }

    fn build_overviews(
        &self,
        path: &Path,
        factors: &[u32],
        resampling: Resampling,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        Self::open(path)?;
        let mut dataset = Dataset::open_update(path)?;
        let _block_size =
            ConfigOptionGuard::set("GDAL_TIFF_OVR_BLOCKSIZE", &self.overview_block_size.to_string())?;
        let factors = factors
            .iter()
            .map(|&f| {
                i32::try_from(f)
                    .map_err(|_| GdalError::BadArgument(format!("overview factor {f} is too large")))
            })
            .collect::<Result<Vec<i32>>>()?;
        dataset.build_overviews(resampling.overview_name(), &[], progress)?;
        if !factors.is_empty() {
            dataset.build_overviews(resampling.overview_name(), &factors, progress)?;
        }
        Ok(())
    }

    fn finalize(
        &self,
        src: &Path,
        dst: &Path,
        profile: &ContainerProfile,
        progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        let dataset = Self::open(src)?;
        let driver = Driver::get_driver_by_name("COG")?;
        let block_size = profile.block_size.to_string();
        let options = CslStringList::from_pairs([
            ("BLOCKSIZE", block_size.as_str()),
            ("COMPRESS", profile.compression.name()),
            ("BIGTIFF", "YES"),
            (
                "OVERVIEWS",
                if profile.with_overviews {
                    "FORCE_USE_EXISTING"
                } else {
                    "NONE"
                },
            ),
            ("OVERVIEW_COMPRESS", profile.compression.name()),
            ("OVERVIEW_RESAMPLING", profile.overview_resampling.overview_name()),
            ("RESAMPLING", profile.resampling.warp_name()),
        ])?;
        tracing::debug!(?options, dst = %dst.display(), "COG copy");
        dataset.create_copy(&driver, dst, &options, progress)?;
        Ok(())
    }

    fn supports_compression(&self, compression: Compression) -> bool {
        Driver::get_driver_by_name("COG")
            .map(|driver| driver.supports_creation_value("COMPRESS", compression.name()))
            .unwrap_or(false)
    }
}

/// Block-sized windows covering a raster, clamped at the right and bottom
/// edges, in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockWindows {
    size: (usize, usize),
    block: (usize, usize),
}

impl BlockWindows {
    fn new(size: (usize, usize), block: (usize, usize)) -> Self {
        let block = (
            block.0.clamp(1, size.0.max(1)),
            block.1.clamp(1, size.1.max(1)),
        );
        Self { size, block }
    }

    fn count(&self) -> usize {
        self.size.0.div_ceil(self.block.0) * self.size.1.div_ceil(self.block.1)
    }

    fn iter(&self) -> impl Iterator<Item = ((usize, usize), (usize, usize))> {
        let Self {
            size: (width, height),
            block: (block_width, block_height),
        } = *self;
        (0..height).step_by(block_height).flat_map(move |y| {
            (0..width).step_by(block_width).map(move |x| {
                ((x, y), (block_width.min(width - x), block_height.min(height - y)))
            })
        })
    }
}

/// Replaces prior no-data and below-floor pixels by the target sentinel,
/// one block at a time.
fn rewrite_band<T: GdalType>(
    band: &mut RasterBand,
    prior: Option<NoDataValue>,
    rewrite: &NoDataRewrite,
    progress: &mut dyn ProgressReporter,
) -> Result<()> {
    let target: T = rewrite.target.cast().ok_or_else(|| {
        GdalError::BadArgument(format!(
            "no-data value {} is not representable as {}",
            rewrite.target,
            crate::raster::data_type_name(T::gdal_type())
        ))
    })?;
    let prior_is_nan = matches!(prior, Some(NoDataValue::Float(v)) if v.is_nan());
    let prior: Option<T> = prior.and_then(|p| p.cast());
    if prior.is_none() && !prior_is_nan && rewrite.floor.is_none() {
        return Ok(());
    }

    let windows = BlockWindows::new(band.size(), band.block_size());
    let total = windows.count();
    let mut buffer = vec![target; windows.block.0 * windows.block.1];
    for (done, (offset, size)) in windows.iter().enumerate() {
        let window = &mut buffer[..size.0 * size.1];
        band.read_into_slice(offset, size, window)?;
        let mut changed = false;
        for value in window.iter_mut() {
            let as_f64 = value.to_f64_lossy();
            let is_prior = Some(*value) == prior || (prior_is_nan && as_f64.is_nan());
            let below_floor = rewrite.floor.is_some_and(|floor| as_f64 < floor);
            if (is_prior || below_floor) && *value != target {
                *value = target;
                changed = true;
            }
        }
        if changed {
            band.write_from_slice(offset, size, window)?;
        }
        if !progress.update((done + 1) as f64 / total as f64, "rewriting no-data") {
            return Err(GdalError::BadArgument("no-data rewrite cancelled".to_string()));
        }
    }
    Ok(())
}
