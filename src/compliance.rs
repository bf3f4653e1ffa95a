//! Is a raster ready to join the pyramid?
//!
//! The check is a pure predicate over a metadata snapshot plus an optional
//! structural pass. Every failed conjunct becomes one [`Finding`]; nothing is
//! raised for expected non-compliance.

use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::RasterEngine;
use crate::errors::{PogError, PogResult};
use crate::geo_transform::{GeoTransform, GeoTransformEx};
use crate::pyramid::{resolve, Compression, PyramidLevel, RasterArtifact, BLOCK_SIZE};
use crate::validate::{validate, FullCheck, ValidateOptions, ValidationReport};

/// How much of the container layout to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructureCheck {
    /// Metadata conjuncts only.
    Skip,
    /// IFD and first-block ordering.
    #[default]
    Fast,
    /// Also walks every block's leader, trailer and mask.
    Exhaustive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceOptions {
    pub structure: StructureCheck,
    /// Edge of the square tiles every level must use.
    pub block_size: usize,
}

impl Default for ComplianceOptions {
    fn default() -> Self {
        Self {
            structure: StructureCheck::default(),
            block_size: BLOCK_SIZE,
        }
    }
}

impl ComplianceOptions {
    pub fn exhaustive() -> Self {
        Self {
            structure: StructureCheck::Exhaustive,
            ..Self::default()
        }
    }

    pub fn skip_structure() -> Self {
        Self {
            structure: StructureCheck::Skip,
            ..Self::default()
        }
    }
}

/// One failed compliance conjunct.
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    Structure(Vec<String>),
    ResolutionUnsupported {
        cell_size: f64,
    },
    GridMismatch {
        expected: GeoTransform,
        actual: Option<GeoTransform>,
        detail: String,
    },
    Convention {
        convention: &'static str,
        detail: String,
    },
}

impl Finding {
    fn convention(convention: &'static str, detail: impl Into<String>) -> Self {
        Finding::Convention {
            convention,
            detail: detail.into(),
        }
    }

    /// The taxonomy error this finding stands for.
    pub fn to_error(&self, path: &Path) -> PogError {
        let path = path.to_path_buf();
        match self {
            Finding::Structure(findings) => PogError::StructuralViolation {
                path,
                findings: findings.clone(),
            },
            Finding::ResolutionUnsupported { cell_size } => PogError::ResolutionUnsupported {
                path,
                cell_size: *cell_size,
            },
            Finding::GridMismatch {
                expected, actual, ..
            } => PogError::GridMismatch {
                path,
                expected: *expected,
                actual: *actual,
            },
            Finding::Convention { convention, detail } => PogError::ConventionViolation {
                path,
                convention: *convention,
                detail: detail.clone(),
            },
        }
    }
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Finding::Structure(findings) => write!(f, "structure: {}", findings.join("; ")),
            Finding::ResolutionUnsupported { cell_size } => {
                write!(f, "resolution: cell size {cell_size} is not a pyramid level")
            }
            Finding::GridMismatch { detail, .. } => write!(f, "grid: {detail}"),
            Finding::Convention { convention, detail } => write!(f, "{convention}: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceReport {
    pub path: PathBuf,
    pub level: Option<PyramidLevel>,
    pub findings: Vec<Finding>,
    /// Advisory notes, copied from the structural pass.
    pub warnings: Vec<String>,
    pub structure: Option<ValidationReport>,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        self.findings.is_empty()
    }

    /// The first failed conjunct as an error.
    pub fn error(&self) -> Option<PogError> {
        self.findings.first().map(|f| f.to_error(&self.path))
    }

    pub fn into_result(self) -> PogResult<ComplianceReport> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Run the full compliance check on the raster at `path`.
pub fn check(
    engine: &dyn RasterEngine,
    path: &Path,
    options: &ComplianceOptions,
) -> PogResult<ComplianceReport> {
    remove_stale_statistics_sidecar(path)?;
    let artifact = engine.describe(path)?;

    let mut findings = Vec::new();
    let mut warnings = Vec::new();
    let full_check = match options.structure {
        StructureCheck::Skip => None,
        StructureCheck::Fast => Some(FullCheck::No),
        StructureCheck::Exhaustive => Some(FullCheck::Yes),
    };
    let mut structure = None;
    if let Some(full_check) = full_check {
        let validate_options = ValidateOptions {
            check_tiled: true,
            full_check,
        };
        match validate(path, &validate_options) {
            Ok(report) => {
                if !report.errors.is_empty() {
                    findings.push(Finding::Structure(report.errors.clone()));
                }
                if !report.details.big_tiff {
                    findings.push(Finding::convention(
                        "container",
                        "classic TIFF header, BigTIFF is required",
                    ));
                }
                warnings.extend(report.warnings.iter().cloned());
                structure = Some(report);
            }
            Err(err @ PogError::NotFound { .. }) => return Err(err),
            Err(err) => findings.push(Finding::Structure(vec![err.to_string()])),
        }
    }

    let (level, conjuncts) = evaluate(&artifact, options);
    findings.extend(conjuncts);
    if let Some(report) = structure.as_mut() {
        report.details.level = level;
    }

    let report = ComplianceReport {
        path: path.to_path_buf(),
        level,
        findings,
        warnings,
        structure,
    };
    if report.is_compliant() {
        tracing::info!(path = %path.display(), level = ?report.level, "pyramid compliant");
    } else {
        tracing::info!(
            path = %path.display(),
            findings = report.findings.len(),
            "not pyramid compliant"
        );
    }
    Ok(report)
}

/// `true` when `path` passes every conjunct with the default options.
pub fn is_pyramid_compliant(engine: &dyn RasterEngine, path: &Path) -> PogResult<bool> {
    Ok(check(engine, path, &ComplianceOptions::default())?.is_compliant())
}

/// The metadata conjuncts: resolution, grid, container, compression,
/// no-data, overview ladder and statistics.
///
/// An unresolvable resolution ends the evaluation; nothing else is
/// meaningful without a level.
pub fn evaluate(
    artifact: &RasterArtifact,
    options: &ComplianceOptions,
) -> (Option<PyramidLevel>, Vec<Finding>) {
    let mut findings = Vec::new();

    let cell_size = artifact
        .geo_transform
        .map(|gt| gt.cell_size())
        .unwrap_or(f64::NAN);
    let Some(level) = resolve(cell_size) else {
        findings.push(Finding::ResolutionUnsupported { cell_size });
        return (None, findings);
    };

    let expected = level.geotransform();
    let grid_ok = artifact
        .geo_transform
        .is_some_and(|gt| gt.exactly_equals(&expected));
    if !grid_ok {
        findings.push(Finding::GridMismatch {
            expected,
            actual: artifact.geo_transform,
            detail: format!("geotransform is not the canonical {level} transform"),
        });
    } else if artifact.size != level.shape() {
        findings.push(Finding::GridMismatch {
            expected,
            actual: artifact.geo_transform,
            detail: format!(
                "raster is {}x{}, a {level} raster is {}x{}",
                artifact.size.0,
                artifact.size.1,
                level.shape().0,
                level.shape().1
            ),
        });
    }

    if !artifact.is_tiff() {
        findings.push(Finding::convention(
            "container",
            format!("driver {} is not GTiff", artifact.driver),
        ));
    }
    let tile = (options.block_size, options.block_size);
    if artifact.block_size != tile {
        findings.push(Finding::convention(
            "container",
            format!(
                "blocks are {}x{}, expected {}x{} tiles",
                artifact.block_size.0, artifact.block_size.1, tile.0, tile.1
            ),
        ));
    }

    match artifact.compression.as_deref().map(Compression::from_name) {
        Some(Some(_)) => {}
        Some(None) => findings.push(Finding::convention(
            "compression",
            format!(
                "codec {} is neither ZSTD nor LZW",
                artifact.compression.as_deref().unwrap_or_default()
            ),
        )),
        None => findings.push(Finding::convention("compression", "container is uncompressed")),
    }

    match artifact.pixel_type {
        None => findings.push(Finding::convention(
            "pixel type",
            format!("{} has no pyramid counterpart", artifact.data_type),
        )),
        Some(pixel_type) => {
            let canonical = pixel_type.canonical_no_data();
            for (index, no_data) in artifact.no_data.iter().enumerate() {
                match no_data {
                    Some(v) if v.same_value(&canonical) => {}
                    Some(v) => findings.push(Finding::convention(
                        "no-data",
                        format!("band {} declares {v}, {pixel_type} requires {canonical}", index + 1),
                    )),
                    None => findings.push(Finding::convention(
                        "no-data",
                        format!("band {} declares none, {pixel_type} requires {canonical}", index + 1),
                    )),
                }
            }
        }
    }

    let expected_overviews = level.overview_shapes();
    if artifact.overviews != expected_overviews {
        findings.push(Finding::convention(
            "overview ladder",
            format!(
                "found {} overview(s) {:?}, expected {:?} for factors {:?}",
                artifact.overviews.len(),
                artifact.overviews,
                expected_overviews,
                level.overview_ladder()
            ),
        ));
    }

    for (index, stats) in artifact.statistics.iter().enumerate() {
        match stats {
            Some(s) if s.is_exact() => {}
            Some(_) => findings.push(Finding::convention(
                "statistics",
                format!("band {} statistics are not marked exact", index + 1),
            )),
            None => findings.push(Finding::convention(
                "statistics",
                format!("band {} has no statistics", index + 1),
            )),
        }
    }

    (Some(level), findings)
}

/// Deletes `<path>.aux.xml` when it holds `STATISTICS_APPROXIMATE`, so stale
/// approximate statistics cannot shadow the ones in the container.
///
/// Returns whether a sidecar was removed.
pub fn remove_stale_statistics_sidecar(path: &Path) -> PogResult<bool> {
    let mut name = OsString::from(path.as_os_str());
    name.push(".aux.xml");
    let sidecar = PathBuf::from(name);
    let contents = match fs::read_to_string(&sidecar) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    if !contents.contains("STATISTICS_APPROXIMATE") {
        return Ok(false);
    }
    fs::remove_file(&sidecar)?;
    tracing::debug!(sidecar = %sidecar.display(), "removed stale statistics sidecar");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::{BandStatistics, PixelType};
    use crate::raster::NoDataValue;

    fn compliant_900() -> RasterArtifact {
        let level = PyramidLevel::Arc900;
        RasterArtifact {
            path: PathBuf::from("global_900.tif"),
            driver: "GTiff".to_string(),
            size: level.shape(),
            band_count: 1,
            data_type: "Byte".to_string(),
            pixel_type: Some(PixelType::UInt8),
            no_data: vec![Some(NoDataValue::Float(255.0))],
            compression: Some("ZSTD".to_string()),
            geo_transform: Some(level.geotransform()),
            statistics: vec![Some(BandStatistics {
                minimum: 1.0,
                maximum: 9.0,
                mean: 4.0,
                std_dev: 2.0,
                approximate: Some(false),
            })],
            overviews: level.overview_shapes(),
            block_size: (512, 512),
        }
    }

    #[test]
    fn test_compliant_artifact() {
        let (level, findings) = evaluate(&compliant_900(), &ComplianceOptions::default());
        assert_eq!(level, Some(PyramidLevel::Arc900));
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn test_unresolvable_resolution_fails_fast() {
        let mut artifact = compliant_900();
        artifact.geo_transform = Some([-180.0, 0.0833334, 0.0, 90.0, 0.0, -0.0833334]);
        artifact.compression = None;
        let (level, findings) = evaluate(&artifact, &ComplianceOptions::default());
        assert_eq!(level, None);
        assert_eq!(findings, vec![Finding::ResolutionUnsupported { cell_size: 0.0833334 }]);
        assert!(matches!(
            findings[0].to_error(&artifact.path),
            PogError::ResolutionUnsupported { .. }
        ));
    }

    #[test]
    fn test_snapped_resolution_still_needs_exact_grid() {
        let mut artifact = compliant_900();
        artifact.geo_transform = Some([-180.0, 0.25000000001, 0.0, 90.0, 0.0, -0.25000000001]);
        let (level, findings) = evaluate(&artifact, &ComplianceOptions::default());
        assert_eq!(level, Some(PyramidLevel::Arc900));
        assert!(matches!(findings.as_slice(), [Finding::GridMismatch { .. }]));
    }

    #[test]
    fn test_each_conjunct_reports() {
        let mut artifact = compliant_900();
        artifact.no_data = vec![Some(NoDataValue::Float(0.0))];
        artifact.compression = Some("DEFLATE".to_string());
        artifact.overviews.pop();
        artifact.statistics[0].as_mut().unwrap().approximate = None;
        let (_, findings) = evaluate(&artifact, &ComplianceOptions::default());
        let conventions: Vec<&str> = findings
            .iter()
            .map(|f| match f {
                Finding::Convention { convention, .. } => *convention,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            conventions,
            vec!["compression", "no-data", "overview ladder", "statistics"]
        );
    }

    #[test]
    fn test_tiles_must_be_square_and_sized() {
        let options = ComplianceOptions::default();
        for block_size in [(256, 256), (512, 256), (1440, 1)] {
            let mut artifact = compliant_900();
            artifact.block_size = block_size;
            let (level, findings) = evaluate(&artifact, &options);
            assert_eq!(level, Some(PyramidLevel::Arc900));
            assert!(
                matches!(findings.as_slice(), [Finding::Convention { convention: "container", .. }]),
                "{findings:?}"
            );
        }

        let mut artifact = compliant_900();
        artifact.block_size = (256, 256);
        let options = ComplianceOptions {
            block_size: 256,
            ..ComplianceOptions::default()
        };
        assert!(evaluate(&artifact, &options).1.is_empty());
    }

    #[test]
    fn test_wrong_shape() {
        let mut artifact = compliant_900();
        artifact.size = (1440, 719);
        let (_, findings) = evaluate(&artifact, &ComplianceOptions::default());
        assert!(matches!(findings.as_slice(), [Finding::GridMismatch { detail, .. }] if detail.contains("1440x719")));
    }

    #[test]
    fn test_stale_sidecar_removal() {
        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("a.tif");
        let sidecar = dir.path().join("a.tif.aux.xml");
        assert!(!remove_stale_statistics_sidecar(&raster).unwrap());

        fs::write(&sidecar, "<PAMDataset><Metadata><MDI key=\"FOO\">1</MDI></Metadata></PAMDataset>").unwrap();
        assert!(!remove_stale_statistics_sidecar(&raster).unwrap());
        assert!(sidecar.exists());

        fs::write(
            &sidecar,
            "<PAMDataset><MDI key=\"STATISTICS_APPROXIMATE\">YES</MDI></PAMDataset>",
        )
        .unwrap();
        assert!(remove_stale_statistics_sidecar(&raster).unwrap());
        assert!(!sidecar.exists());
    }
}
