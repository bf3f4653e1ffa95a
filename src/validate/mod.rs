//! Structural validation of cloud-optimized GeoTIFF containers.
//!
//! The checks follow GDAL's COG layout rules: IFDs first and ordered by
//! decreasing resolution, imagery ordered smallest overview first, and the
//! per-block leader, trailer and mask interleaving promised by the
//! `GDAL_STRUCTURAL_METADATA` preamble.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use pog::validate::{validate, ValidateOptions};
//!
//! let report = validate(Path::new("fixtures/global_900.tif"), &ValidateOptions::default())?;
//! for error in &report.errors {
//!     println!("{error}");
//! }
//! # Ok::<(), pog::errors::PogError>(())
//! ```

mod range_reader;
mod report;
mod tiff;

use std::path::{Path, PathBuf};

pub use range_reader::{MemoryReader, RangeReader, VsiRangeReader};
pub use report::{ValidationDetails, ValidationReport};
pub use tiff::{ContainerLayout, Directory, Level, StructuralMetadata};

use crate::cpl::QuietErrorScope;
use crate::errors::{PogError, PogResult};
use crate::validate::tiff::{LayoutError, STRUCTURAL_METADATA_PREFIX_LEN};
use crate::vsi;

/// Images at most this size in both dimensions need neither tiles nor overviews.
const SMALL_IMAGE: usize = 512;
/// Strips wider than this count as "not tiled".
const MAX_STRIP_WIDTH: usize = 1024;
const LEADER_SIZE: u64 = 4;
const TRAILER_SIZE: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullCheck {
    Yes,
    No,
    /// Only for local containers, where reading every block is cheap.
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Flag large untiled images and overviews.
    pub check_tiled: bool,
    pub full_check: FullCheck,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            check_tiled: true,
            full_check: FullCheck::Auto,
        }
    }
}

/// Validate the container at `path`.
///
/// Bare URLs are read through `/vsicurl/`.
pub fn validate(path: &Path, options: &ValidateOptions) -> PogResult<ValidationReport> {
    let name = vsi::vsi_path(&path.to_string_lossy());
    if !vsi::is_remote(&name) && !vsi::path_exists(&name)? {
        return Err(PogError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let reader = {
        let _quiet = QuietErrorScope::new();
        VsiRangeReader::open(&name)
    }
    .map_err(|e| PogError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut report = validate_reader(&reader, options)?;

    let has_external_overviews = {
        let _quiet = QuietErrorScope::new();
        vsi::path_exists(&format!("{name}.ovr")).unwrap_or(false)
    };
    if has_external_overviews {
        report.errors.insert(
            0,
            "Overviews found in external .ovr file. They should be internal".to_string(),
        );
    }
    tracing::debug!(
        path = %path.display(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validated container structure"
    );
    Ok(report)
}

/// Validate a container through an arbitrary byte-range reader.
pub fn validate_reader(
    reader: &dyn RangeReader,
    options: &ValidateOptions,
) -> PogResult<ValidationReport> {
    let path = PathBuf::from(reader.identifier());
    let layout = ContainerLayout::read(reader).map_err(|e| match e {
        LayoutError::NotTiff(reason) => PogError::NotAContainer {
            path: path.clone(),
            reason,
        },
        LayoutError::Truncated(reason) => PogError::Unreadable {
            path: path.clone(),
            reason,
        },
    })?;

    let mut report = ValidationReport::default();
    let main = &layout.main().image;

    if main.width > SMALL_IMAGE || main.height > SMALL_IMAGE {
        if options.check_tiled && is_untiled(main) {
            report.error("The file is greater than 512xH or Wx512, but is not tiled");
        }
        if layout.overviews().is_empty() {
            report.warning(
                "The file is greater than 512xH or Wx512, it is recommended to include internal overviews",
            );
        }
    }

    let metadata = check_preamble(&layout, &mut report);
    check_overview_order(&layout, options, &mut report);
    check_data_order(&layout, &mut report);

    let run_full_check = match options.full_check {
        FullCheck::Yes => true,
        FullCheck::No => false,
        FullCheck::Auto => reader.is_local(),
    };
    if let Some(meta) = metadata.filter(|_| run_full_check) {
        let flags = BlockFlags::from(&meta);
        if flags.any() {
            full_check(reader, &layout, flags, &mut report);
        }
    }

    report.details.big_tiff = layout.big_tiff;
    report.details.overview_shapes = layout.overviews().iter().map(|l| l.image.size()).collect();
    if let Some(meta) = &layout.structural_metadata {
        report.details.structural_metadata = meta.items();
    }
    Ok(report)
}

fn is_untiled(dir: &Directory) -> bool {
    dir.block_width == dir.width && dir.block_width > MAX_STRIP_WIDTH
}

/// Checks the main IFD position against the preamble. Returns the preamble
/// only when its block flags are to be honoured.
fn check_preamble(layout: &ContainerLayout, report: &mut ValidationReport) -> Option<StructuralMetadata> {
    let ifd_offset = layout.first_ifd_offset;
    if ifd_offset == 8 || ifd_offset == 16 {
        return None;
    }
    let mut expected = layout.header_len;
    if let Some(meta) = &layout.structural_metadata {
        expected += (STRUCTURAL_METADATA_PREFIX_LEN + meta.declared_size) as u64;
        expected += expected % 2;
        if meta.known_incompatible_edition() {
            report.error("KNOWN_INCOMPATIBLE_EDITION=YES is declared in the file");
        }
    }
    if ifd_offset != expected {
        report.error(format!(
            "The offset of the main IFD should be {expected}. It is {ifd_offset} instead"
        ));
    }
    layout.structural_metadata.clone()
}

fn check_overview_order(layout: &ContainerLayout, options: &ValidateOptions, report: &mut ValidationReport) {
    let mut previous = &layout.main().image;
    report.details.ifd_offsets.push(previous.offset);
    for (i, level) in layout.overviews().iter().enumerate() {
        let ovr = &level.image;
        if ovr.width > previous.width || ovr.height > previous.height {
            if i == 0 {
                report.error("First overview has larger dimension than main band");
            } else {
                report.error(format!(
                    "Overview of index {i} has larger dimension than overview of index {}",
                    i - 1
                ));
            }
        }
        if options.check_tiled && is_untiled(ovr) {
            report.error(format!("Overview of index {i} is not tiled"));
        }
        if ovr.offset < previous.offset {
            if i == 0 {
                report.error(format!(
                    "The offset of the IFD for overview of index {i} is {}, whereas it should be \
                     greater than the one of the main image, which is at byte {}",
                    ovr.offset, previous.offset
                ));
            } else {
                report.error(format!(
                    "The offset of the IFD for overview of index {i} is {}, whereas it should be \
                     greater than the one of index {}, which is at byte {}",
                    ovr.offset,
                    i - 1,
                    previous.offset
                ));
            }
        }
        report.details.ifd_offsets.push(ovr.offset);
        previous = ovr;
    }
}

/// Imagery must start with the smallest overview and end with the main image.
fn check_data_order(layout: &ContainerLayout, report: &mut ValidationReport) {
    let data_offsets: Vec<u64> = layout
        .levels
        .iter()
        .map(|l| l.image.first_block_offset())
        .collect();
    let overview_count = data_offsets.len() - 1;
    let last_ifd = layout.levels[overview_count].image.offset;
    let last_data = data_offsets[overview_count];

    if last_data != 0 && last_data < last_ifd {
        if overview_count > 0 {
            report.error("The offset of the first block of the smallest overview should be after its IFD");
        } else {
            report.error("The offset of the first block of the image should be after its IFD");
        }
    }
    for i in (1..overview_count).rev() {
        if data_offsets[i] != 0 && data_offsets[i] < data_offsets[i + 1] {
            report.error(format!(
                "The offset of the first block of overview of index {} should be after the one of \
                 the overview of index {i}",
                i - 1
            ));
        }
    }
    if overview_count > 0 && data_offsets[0] != 0 && data_offsets[0] < data_offsets[1] {
        report.error(format!(
            "The offset of the first block of the main resolution image should be after the one \
             of the overview of index {}",
            overview_count - 1
        ));
    }
    report.details.data_offsets = data_offsets;
}

#[derive(Debug, Clone, Copy)]
struct BlockFlags {
    row_major: bool,
    leader: bool,
    trailer: bool,
    mask_interleaved: bool,
}

impl BlockFlags {
    fn any(self) -> bool {
        self.row_major || self.leader || self.trailer || self.mask_interleaved
    }
}

impl From<&StructuralMetadata> for BlockFlags {
    fn from(meta: &StructuralMetadata) -> Self {
        Self {
            row_major: meta.block_order_row_major(),
            leader: meta.block_leader_size_as_uint4(),
            trailer: meta.block_trailer_last_4_bytes_repeated(),
            mask_interleaved: meta.mask_interleaved_with_imagery(),
        }
    }
}

/// Walks every block of every level and its mask.
fn full_check(reader: &dyn RangeReader, layout: &ContainerLayout, flags: BlockFlags, report: &mut ValidationReport) {
    for (i, level) in layout.levels.iter().enumerate() {
        let name = if i == 0 {
            "Main resolution image".to_string()
        } else {
            format!("Overview {}", i - 1)
        };
        check_blocks(reader, &name, &level.image, level.mask.as_ref(), flags, report);
        if let Some(mask) = &level.mask {
            let mask_flags = BlockFlags {
                mask_interleaved: false,
                ..flags
            };
            check_blocks(reader, &format!("Mask band of {}", name.to_lowercase()), mask, None, mask_flags, report);
        }
    }
}

fn check_blocks(
    reader: &dyn RangeReader,
    band_name: &str,
    dir: &Directory,
    mask: Option<&Directory>,
    flags: BlockFlags,
    report: &mut ValidationReport,
) {
    let mask = match mask.filter(|_| flags.mask_interleaved) {
        Some(m) if (m.block_width, m.block_height) != (dir.block_width, dir.block_height) => {
            report.error(format!("{band_name}: mask block size is different from its imagery band"));
            None
        }
        other => other,
    };

    let (xblocks, yblocks) = dir.blocks();
    let mut last_offset = 0;
    for y in 0..yblocks {
        for x in 0..xblocks {
            let (mut offset, byte_count) = dir.block(x, y);
            if offset > 0 {
                if flags.row_major && offset < last_offset {
                    report.error(format!(
                        "{band_name}: offset of block ({x}, {y}) is smaller than previous block"
                    ));
                }
                if flags.leader {
                    match read_u32_le(reader, offset.saturating_sub(LEADER_SIZE)) {
                        Some(leader) if u64::from(leader) == byte_count => {}
                        Some(leader) => report.error(format!(
                            "{band_name}: for block ({x}, {y}), size in leader bytes is {leader} \
                             instead of {byte_count}"
                        )),
                        None => report.error(format!(
                            "{band_name}: for block ({x}, {y}), leader bytes cannot be read"
                        )),
                    }
                }
                if flags.trailer && byte_count >= 4 {
                    let valid = offset
                        .checked_add(byte_count - 4)
                        .and_then(|start| reader.read_range(start, 8).ok())
                        .is_some_and(|b| b[0..4] == b[4..8]);
                    if !valid {
                        report.error(format!(
                            "{band_name}: for block ({x}, {y}), trailer bytes are invalid"
                        ));
                    }
                }
            }

            if let Some(mask) = mask {
                let (mask_offset, _) = mask.block(x, y);
                if offset > 0 && mask_offset > 0 {
                    let expected = offset
                        .checked_add(byte_count)
                        .and_then(|end| end.checked_add(if flags.leader { LEADER_SIZE } else { 0 }))
                        .and_then(|end| end.checked_add(if flags.trailer { TRAILER_SIZE } else { 0 }));
                    match expected {
                        Some(expected) if expected == mask_offset => {}
                        Some(expected) => report.error(format!(
                            "Mask of {band_name}: for block ({x}, {y}), offset is {mask_offset}, \
                             whereas {expected} was expected"
                        )),
                        None => report.error(format!(
                            "Mask of {band_name}: for block ({x}, {y}), offset is {mask_offset}, \
                             whereas the imagery block ends beyond the addressable range"
                        )),
                    }
                } else if offset == 0 && mask_offset > 0 {
                    if flags.row_major && mask_offset < last_offset {
                        report.error(format!(
                            "Mask of {band_name}: offset of block ({x}, {y}) is smaller than previous block"
                        ));
                    }
                    offset = mask_offset;
                }
            }
            last_offset = offset;
        }
    }
}

fn read_u32_le(reader: &dyn RangeReader, offset: u64) -> Option<u32> {
    let bytes = reader.read_range(offset, 4).ok()?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_local_file() {
        let err = validate(Path::new("/no/such/dir/raster.tif"), &ValidateOptions::default()).unwrap_err();
        assert!(matches!(err, PogError::NotFound { .. }));
    }

    #[test]
    fn test_not_a_container() {
        let reader = MemoryReader::new("notes.txt", b"hello, this is not a raster".to_vec());
        let err = validate_reader(&reader, &ValidateOptions::default()).unwrap_err();
        assert!(matches!(err, PogError::NotAContainer { .. }));
    }

    #[test]
    fn test_default_options() {
        let options = ValidateOptions::default();
        assert_eq!(options.full_check, FullCheck::Auto);
        assert!(options.check_tiled);
    }
}
