//! An in-memory [`RasterEngine`].
//!
//! Each raster file holds a `fake-raster:<id>` marker line naming an
//! artifact kept by the engine. Mutations register a new artifact and
//! rewrite the marker, so a file the engine never wrote to stays
//! byte-identical.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use pog::engine::{ContainerProfile, GridTarget, NoDataRewrite, RasterEngine};
use pog::errors::{GdalError, PogError, PogResult};
use pog::progress::ProgressReporter;
use pog::pyramid::{
    BandStatistics, Compression, PixelType, PyramidLevel, RasterArtifact, Resampling,
};
use pog::raster::NoDataValue;

const MARKER: &str = "fake-raster:";

pub struct FakeEngine {
    artifacts: RefCell<HashMap<u64, RasterArtifact>>,
    next_id: Cell<u64>,
    calls: RefCell<Vec<String>>,
    fail_on: Option<&'static str>,
    codecs: HashSet<Compression>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            artifacts: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            calls: RefCell::new(Vec::new()),
            fail_on: None,
            codecs: [Compression::Zstd, Compression::Lzw].into_iter().collect(),
        }
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named operation (`"convert"`, `"warp"`, ...) fail.
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn without_codec(mut self, compression: Compression) -> Self {
        self.codecs.remove(&compression);
        self
    }

    /// Operations performed so far, e.g. `"warp:near"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// The marker line identifying `artifact`, for appending to real bytes.
    pub fn marker(&self, artifact: RasterArtifact) -> Vec<u8> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.artifacts.borrow_mut().insert(id, artifact);
        format!("\n{MARKER}{id}\n").into_bytes()
    }

    /// Writes a raster file described by `artifact` to `path`.
    pub fn install(&self, path: &Path, artifact: RasterArtifact) {
        let marker = self.marker(artifact);
        fs::write(path, marker).expect("write fake raster");
    }

    fn store(&self, path: &Path, artifact: RasterArtifact) -> PogResult<()> {
        let marker = self.marker(artifact);
        fs::write(path, marker)?;
        Ok(())
    }

    fn record(&self, operation: &str, detail: String) -> PogResult<()> {
        self.calls.borrow_mut().push(if detail.is_empty() {
            operation.to_string()
        } else {
            format!("{operation}:{detail}")
        });
        if self.fail_on == Some(operation) {
            return Err(PogError::Gdal(GdalError::BadArgument(format!(
                "injected {operation} failure"
            ))));
        }
        Ok(())
    }

    fn load(&self, path: &Path) -> PogResult<RasterArtifact> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PogError::NotFound {
                path: path.to_path_buf(),
            },
            _ => PogError::Io(e),
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let id = text
            .rfind(MARKER)
            .and_then(|at| text[at + MARKER.len()..].lines().next())
            .and_then(|id| id.trim().parse::<u64>().ok())
            .ok_or_else(|| PogError::Unreadable {
                path: path.to_path_buf(),
                reason: "not a fake raster".to_string(),
            })?;
        let mut artifact = self
            .artifacts
            .borrow()
            .get(&id)
            .cloned()
            .ok_or_else(|| PogError::Unreadable {
                path: path.to_path_buf(),
                reason: format!("unknown fake raster {id}"),
            })?;
        artifact.path = path.to_path_buf();
        Ok(artifact)
    }
}

impl RasterEngine for FakeEngine {
    fn describe(&self, path: &Path) -> PogResult<RasterArtifact> {
        self.load(path)
    }

    fn convert(
        &self,
        src: &Path,
        dst: &Path,
        pixel_type: Option<PixelType>,
        _progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        let detail = pixel_type.map(|t| t.to_string()).unwrap_or_default();
        self.record("convert", detail)?;
        let mut artifact = self.load(src)?;
        artifact.driver = "GTiff".to_string();
        if let Some(pixel_type) = pixel_type {
            artifact.pixel_type = Some(pixel_type);
            artifact.data_type = pixel_type.gdal_name().to_string();
        }
        self.store(dst, artifact)
    }

    fn warp_to_grid(
        &self,
        src: &Path,
        dst: &Path,
        target: &GridTarget,
        _progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        self.record("warp", target.resampling.warp_name().to_string())?;
        let mut artifact = self.load(src)?;
        artifact.geo_transform = Some(target.level.geotransform());
        artifact.size = target.level.shape();
        artifact.no_data = vec![Some(target.dst_no_data); artifact.band_count];
        artifact.overviews.clear();
        self.store(dst, artifact)
    }

    fn rewrite_no_data(
        &self,
        path: &Path,
        rewrite: &NoDataRewrite,
        _progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        self.record("no-data", rewrite.target.to_string())?;
        let mut artifact = self.load(path)?;
        artifact.no_data = vec![Some(rewrite.target); artifact.band_count];
        self.store(path, artifact)
    }

    fn compute_statistics(
        &self,
        path: &Path,
        _progress: &mut dyn ProgressReporter,
    ) -> PogResult<Vec<BandStatistics>> {
        self.record("statistics", String::new())?;
        let mut artifact = self.load(path)?;
        let stats = vec![exact_statistics(); artifact.band_count];
        artifact.statistics = stats.iter().copied().map(Some).collect();
        self.store(path, artifact)?;
        Ok(stats)
    }

    fn build_overviews(
        &self,
        path: &Path,
        factors: &[u32],
        resampling: Resampling,
        _progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        self.record("overviews", resampling.overview_name().to_string())?;
        let mut artifact = self.load(path)?;
        let (cols, rows) = artifact.size;
        artifact.overviews = factors
            .iter()
            .map(|&f| (cols.div_ceil(f as usize), rows.div_ceil(f as usize)))
            .collect();
        self.store(path, artifact)
    }

    fn finalize(
        &self,
        src: &Path,
        dst: &Path,
        profile: &ContainerProfile,
        _progress: &mut dyn ProgressReporter,
    ) -> PogResult<()> {
        self.record("finalize", profile.compression.to_string())?;
        let mut artifact = self.load(src)?;
        artifact.driver = "GTiff".to_string();
        artifact.compression = Some(profile.compression.name().to_string());
        artifact.block_size = (profile.block_size, profile.block_size);
        if !profile.with_overviews {
            artifact.overviews.clear();
        }
        self.store(dst, artifact)
    }

    fn supports_compression(&self, compression: Compression) -> bool {
        self.codecs.contains(&compression)
    }
}

pub fn exact_statistics() -> BandStatistics {
    BandStatistics {
        minimum: 1.0,
        maximum: 200.0,
        mean: 42.0,
        std_dev: 3.5,
        approximate: Some(false),
    }
}

/// A single-band raster already meeting every convention of `level`.
pub fn compliant_artifact(level: PyramidLevel, pixel_type: PixelType) -> RasterArtifact {
    RasterArtifact {
        path: Default::default(),
        driver: "GTiff".to_string(),
        size: level.shape(),
        band_count: 1,
        data_type: pixel_type.gdal_name().to_string(),
        pixel_type: Some(pixel_type),
        no_data: vec![Some(pixel_type.canonical_no_data())],
        compression: Some("ZSTD".to_string()),
        geo_transform: Some(level.geotransform()),
        statistics: vec![Some(exact_statistics())],
        overviews: level.overview_shapes(),
        block_size: (512, 512),
    }
}

/// A land-cover input: a byte raster on the 900" grid declaring 0 as
/// no-data, with neither overviews nor statistics.
pub fn landcover_artifact() -> RasterArtifact {
    RasterArtifact {
        no_data: vec![Some(NoDataValue::UInt(0))],
        statistics: vec![None],
        overviews: Vec::new(),
        compression: None,
        ..compliant_artifact(PyramidLevel::Arc900, PixelType::UInt8)
    }
}
