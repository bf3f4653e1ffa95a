use std::fmt::{Display, Formatter};

use crate::pyramid::PyramidLevel;

/// Outcome of a structural validation.
///
/// Validation never fails on a non-compliant layout; problems land in
/// `errors` and the container passes exactly when that list is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub details: ValidationDetails,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationDetails {
    /// IFD offset of the main image, then of each overview.
    pub ifd_offsets: Vec<u64>,
    /// Offset of the first non-empty block, in the same order; 0 when sparse.
    pub data_offsets: Vec<u64>,
    pub overview_shapes: Vec<(usize, usize)>,
    /// Whether the header is BigTIFF rather than classic TIFF.
    pub big_tiff: bool,
    /// `KEY=VALUE` lines of the `GDAL_STRUCTURAL_METADATA` preamble.
    pub structural_metadata: Vec<(String, String)>,
    /// Filled in by the compliance checker.
    pub level: Option<PyramidLevel>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.warnings.is_empty() {
            writeln!(f, "The following warnings were found:")?;
            for warning in &self.warnings {
                writeln!(f, " - {warning}")?;
            }
            writeln!(f)?;
        }
        if !self.errors.is_empty() {
            writeln!(f, "The following errors were found:")?;
            for error in &self.errors {
                writeln!(f, " - {error}")?;
            }
        }
        Ok(())
    }
}
