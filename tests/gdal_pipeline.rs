use std::fs;
use std::path::Path;

use pog::compliance::{check, ComplianceOptions, Finding};
use pog::cpl::CslStringList;
use pog::pipeline::{make_pyramid_compliant, PipelineConfig};
use pog::progress::NoProgress;
use pog::pyramid::{PixelType, PyramidLevel};
use pog::raster::NoDataValue;
use pog::{Dataset, Driver, GdalEngine};

const COLS: usize = 1440;
const ROWS: usize = 720;

/// An 8-bit land-cover raster on the 900" grid, no-data 0, tiled, without
/// overviews or statistics.
fn write_landcover(path: &Path) {
    let driver = Driver::get_driver_by_name("GTiff").unwrap();
    let options = CslStringList::from_pairs([("TILED", "YES")]).unwrap();
    let mut ds = driver
        .create_with_band_type_with_options::<u8>(path, COLS, ROWS, 1, &options)
        .unwrap();
    ds.set_geo_transform(&PyramidLevel::Arc900.geotransform())
        .unwrap();
    let mut band = ds.rasterband(1).unwrap();
    let pixels: Vec<u8> = (0..COLS * ROWS).map(|i| (i % COLS % 7) as u8).collect();
    band.write_from_slice((0, 0), (COLS, ROWS), &pixels).unwrap();
    band.set_no_data_value(NoDataValue::UInt(0)).unwrap();
}

fn first_row(path: &Path) -> Vec<u8> {
    let ds = Dataset::open(path).unwrap();
    let mut row = vec![0u8; 8];
    ds.rasterband(1)
        .unwrap()
        .read_into_slice((0, 0), (8, 1), &mut row)
        .unwrap();
    row
}

#[test]
fn test_landcover_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("landcover.tif");
    let output = dir.path().join("landcover_cog.tif");
    write_landcover(&input);
    let original = fs::read(&input).unwrap();
    let engine = GdalEngine::default();

    let before = check(&engine, &input, &ComplianceOptions::default()).unwrap();
    assert!(!before.is_compliant());
    assert_eq!(before.level, Some(PyramidLevel::Arc900));
    assert!(before.findings.iter().any(|f| matches!(
        f,
        Finding::Convention {
            convention: "no-data",
            ..
        }
    )));
    assert!(before
        .warnings
        .iter()
        .any(|w| w.contains("recommended to include internal overviews")));

    let artifact = make_pyramid_compliant(
        &engine,
        &input,
        Some(&output),
        &PipelineConfig::default(),
        &mut NoProgress,
    )
    .unwrap();
    assert_eq!(artifact.pixel_type, Some(PixelType::UInt8));
    assert!(artifact.no_data[0].is_some_and(|v| v.same_value(&NoDataValue::UInt(255))));
    assert_eq!(artifact.overviews, PyramidLevel::Arc900.overview_shapes());
    assert!(artifact.statistics[0].is_some_and(|s| s.is_exact()));

    let after = check(&engine, &output, &ComplianceOptions::exhaustive()).unwrap();
    assert!(after.is_compliant(), "{:?}", after.findings);
    assert!(after.structure.is_some_and(|s| s.is_valid()));

    // Former no-data pixels carry the canonical sentinel.
    assert_eq!(first_row(&output), vec![255, 1, 2, 3, 4, 5, 6, 255]);
    assert_eq!(fs::read(&input).unwrap(), original);
}

#[test]
fn test_stale_statistics_sidecar_removed() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("landcover.tif");
    write_landcover(&input);
    let sidecar = dir.path().join("landcover.tif.aux.xml");
    fs::write(
        &sidecar,
        "<PAMDataset><PAMRasterBand band=\"1\"><Metadata>\
         <MDI key=\"STATISTICS_APPROXIMATE\">YES</MDI>\
         </Metadata></PAMRasterBand></PAMDataset>\n",
    )
    .unwrap();

    check(&GdalEngine::default(), &input, &ComplianceOptions::skip_structure()).unwrap();
    assert!(!sidecar.exists());
}
