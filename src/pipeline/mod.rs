//! Build a pyramid-compliant container from an arbitrary raster.
//!
//! The stages run in a fixed order on private working copies inside a
//! scratch directory next to the target. The target is touched exactly once,
//! by the final rename, so a failure at any stage leaves it as it was.

mod commit;
mod stage;

use std::fs;
use std::path::{Path, PathBuf};

pub use stage::{Stage, StageSet};

use crate::compliance::{check, ComplianceOptions};
use crate::engine::{ContainerProfile, GridTarget, NoDataRewrite, RasterEngine};
use crate::errors::{PogError, PogResult};
use crate::geo_transform::GeoTransformEx;
use crate::progress::ProgressReporter;
use crate::pyramid::{
    resolve, Compression, PixelType, PyramidLevel, RasterArtifact, Resampling, BLOCK_SIZE,
};

/// Settings of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Target pixel type; `None` keeps the input's.
    pub pixel_type: Option<PixelType>,
    /// Pixels below this value become no-data.
    pub no_data_floor: Option<f64>,
    pub block_size: usize,
    /// Preferred codec; falls back to LZW when the engine lacks it.
    pub compression: Compression,
    pub stages: StageSet,
    /// Check deciding whether the input needs work at all.
    pub input_check: ComplianceOptions,
    /// Check the finished container must pass before it is committed.
    pub acceptance: ComplianceOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pixel_type: None,
            no_data_floor: None,
            block_size: BLOCK_SIZE,
            compression: Compression::Zstd,
            stages: StageSet::all(),
            input_check: ComplianceOptions::default(),
            acceptance: ComplianceOptions::exhaustive(),
        }
    }
}

/// Make `input` pyramid-compliant, writing the result to `output` or, when
/// `output` is `None`, replacing `input`.
///
/// A compliant input is left untouched (or copied to a distinct `output`).
/// Returns the snapshot of the committed container.
pub fn make_pyramid_compliant(
    engine: &dyn RasterEngine,
    input: &Path,
    output: Option<&Path>,
    config: &PipelineConfig,
    progress: &mut dyn ProgressReporter,
) -> PogResult<RasterArtifact> {
    let target = output.unwrap_or(input);
    let input_check = ComplianceOptions {
        block_size: config.block_size,
        ..config.input_check
    };
    let report = check(engine, input, &input_check)?;
    if report.is_compliant() {
        if same_file(input, target) {
            tracing::info!(path = %input.display(), "already compliant, nothing to do");
        } else {
            tracing::info!(
                input = %input.display(),
                output = %target.display(),
                "already compliant, copying"
            );
            commit::copy_into_place(input, target)?;
        }
        return engine.describe(target);
    }

    let artifact = engine.describe(input)?;
    let cell_size = artifact
        .geo_transform
        .map(|gt| gt.cell_size())
        .unwrap_or(f64::NAN);
    let level = resolve(cell_size).ok_or_else(|| PogError::ResolutionUnsupported {
        path: input.to_path_buf(),
        cell_size,
    })?;
    let pixel_type = config
        .pixel_type
        .or(artifact.pixel_type)
        .ok_or_else(|| PogError::ConventionViolation {
            path: input.to_path_buf(),
            convention: "pixel type",
            detail: format!("{} has no pyramid counterpart", artifact.data_type),
        })?;
    tracing::info!(
        input = %input.display(),
        %level,
        %pixel_type,
        findings = report.findings.len(),
        "building pyramid container"
    );

    let scratch = commit::workspace(target)?;
    let mut run = Run {
        engine,
        config,
        progress,
        scratch: scratch.path(),
        level,
        pixel_type,
        current: scratch.path().join("working.tif"),
        generation: 0,
    };
    run.pixel_type_stage(input, &artifact)?;
    run.grid_stage(&artifact)?;
    run.no_data_stage()?;
    run.statistics_stage()?;
    run.overview_stage()?;
    run.finalize_stage()?;

    let staged = run.current;
    let acceptance_check = ComplianceOptions {
        block_size: config.block_size,
        ..config.acceptance
    };
    let acceptance = check(engine, &staged, &acceptance_check)
        .map_err(|e| PogError::aborted(Stage::Finalize, e))?;
    if let Some(err) = acceptance.error() {
        for finding in &acceptance.findings {
            tracing::warn!(%finding, "output rejected");
        }
        return Err(PogError::aborted(Stage::Finalize, err));
    }
    commit::commit(&staged, target)?;
    drop(scratch);
    engine.describe(target)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// State threaded through the stages of one run.
struct Run<'a> {
    engine: &'a dyn RasterEngine,
    config: &'a PipelineConfig,
    progress: &'a mut dyn ProgressReporter,
    scratch: &'a Path,
    level: PyramidLevel,
    pixel_type: PixelType,
    /// The working copy the next stage operates on.
    current: PathBuf,
    generation: u32,
}

impl Run<'_> {
    fn next_path(&mut self) -> PathBuf {
        self.generation += 1;
        self.scratch.join(format!("working-{}.tif", self.generation))
    }

    fn enabled(&mut self, stage: Stage) -> bool {
        if self.config.stages.runs(stage) {
            tracing::info!(%stage, "stage start");
            self.progress.begin(&stage.to_string());
            true
        } else {
            tracing::info!(%stage, "stage skipped");
            false
        }
    }

    fn pixel_type_stage(&mut self, input: &Path, artifact: &RasterArtifact) -> PogResult<()> {
        let stage = Stage::PixelType;
        let retype = self.enabled(stage) && artifact.pixel_type != Some(self.pixel_type);
        let dst = self.current.clone();
        let result = if retype {
            self.engine
                .convert(input, &dst, Some(self.pixel_type), &mut *self.progress)
        } else if artifact.is_tiff() {
            fs::copy(input, &dst).map(|_| ()).map_err(PogError::from)
        } else {
            self.engine.convert(input, &dst, None, &mut *self.progress)
        };
        result.map_err(|e| PogError::aborted(stage, e))
    }

    fn grid_stage(&mut self, input: &RasterArtifact) -> PogResult<()> {
        let stage = Stage::GridAlignment;
        if !self.enabled(stage) {
            return Ok(());
        }
        let result = (|| -> PogResult<()> {
            let artifact = self.engine.describe(&self.current)?;
            let canonical = artifact
                .geo_transform
                .is_some_and(|gt| gt.exactly_equals(&self.level.geotransform()))
                && artifact.size == self.level.shape();
            if canonical {
                tracing::debug!("already on the canonical grid");
                return Ok(());
            }
            let target = GridTarget {
                level: self.level,
                resampling: Resampling::for_warp(self.pixel_type),
                src_no_data: input.no_data.first().copied().flatten(),
                dst_no_data: self.pixel_type.canonical_no_data(),
            };
            let dst = self.next_path();
            self.engine
                .warp_to_grid(&self.current, &dst, &target, &mut *self.progress)?;
            self.current = dst;
            Ok(())
        })();
        result.map_err(|e| PogError::aborted(stage, e))
    }

    fn no_data_stage(&mut self) -> PogResult<()> {
        let stage = Stage::NoData;
        if !self.enabled(stage) {
            return Ok(());
        }
        let result = self.engine.describe(&self.current).and_then(|artifact| {
            let rewrite = NoDataRewrite {
                prior: artifact.no_data,
                target: self.pixel_type.canonical_no_data(),
                floor: self.config.no_data_floor,
            };
            self.engine
                .rewrite_no_data(&self.current, &rewrite, &mut *self.progress)
        });
        result.map_err(|e| PogError::aborted(stage, e))
    }

    fn statistics_stage(&mut self) -> PogResult<()> {
        let stage = Stage::Statistics;
        if !self.enabled(stage) {
            return Ok(());
        }
        self.engine
            .compute_statistics(&self.current, &mut *self.progress)
            .map(|stats| tracing::debug!(bands = stats.len(), "exact statistics"))
            .map_err(|e| PogError::aborted(stage, e))
    }

    fn overview_stage(&mut self) -> PogResult<()> {
        let stage = Stage::Overviews;
        if !self.enabled(stage) {
            return Ok(());
        }
        self.engine
            .build_overviews(
                &self.current,
                self.level.overview_ladder(),
                Resampling::for_overviews(self.pixel_type),
                &mut *self.progress,
            )
            .map_err(|e| PogError::aborted(stage, e))
    }

    fn finalize_stage(&mut self) -> PogResult<()> {
        let stage = Stage::Finalize;
        if !self.enabled(stage) {
            return Ok(());
        }
        let compression = if self.engine.supports_compression(self.config.compression) {
            self.config.compression
        } else {
            tracing::warn!(
                wanted = %self.config.compression,
                fallback = %Compression::Lzw,
                "compression not available, falling back"
            );
            Compression::Lzw
        };
        let profile = ContainerProfile {
            block_size: self.config.block_size,
            compression,
            overview_resampling: Resampling::for_overviews(self.pixel_type),
            resampling: Resampling::for_warp(self.pixel_type),
            with_overviews: !self.level.overview_ladder().is_empty(),
        };
        let dst = self.next_path();
        self.engine
            .finalize(&self.current, &dst, &profile, &mut *self.progress)
            .map_err(|e| PogError::aborted(stage, e))?;
        self.current = dst;
        Ok(())
    }
}
