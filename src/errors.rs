use std::ffi::{c_int, NulError};
use std::path::PathBuf;
use std::str::Utf8Error;

use gdal_sys::CPLErr;
use thiserror::Error;

use crate::geo_transform::GeoTransform;
use crate::pipeline::Stage;

/// Errors raised by the thin GDAL bindings.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GdalError {
    #[error("FfiNulError")]
    FfiNulError(#[from] NulError),
    #[error("StrUtf8Error")]
    StrUtf8Error(#[from] Utf8Error),
    #[error("CPL error class: '{class:?}', error number: '{number}', error msg: '{msg}'")]
    CplError {
        class: CplErrType,
        number: c_int,
        msg: String,
    },
    #[error("GDAL method '{method_name}' returned a NULL pointer. Error msg: '{msg}'")]
    NullPointer {
        method_name: &'static str,
        msg: String,
    },
    #[error("Invalid arguments passed to '{method_name}': {msg}")]
    UsageError {
        method_name: &'static str,
        msg: String,
    },
    #[error("Unsupported GDAL data type '{0}'")]
    UnsupportedDataType(String),
    #[error("Unable to unlink mem file: {file_name}")]
    UnlinkMemFile { file_name: String },
    #[error("Bad argument: {0}")]
    BadArgument(String),
}

/// A wrapper for [`CPLErr::Type`] that reflects it as an enum
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub enum CplErrType {
    None = 0,
    Debug = 1,
    Warning = 2,
    Failure = 3,
    Fatal = 4,
}

impl From<CPLErr::Type> for CplErrType {
    fn from(error_type: CPLErr::Type) -> Self {
        if error_type > 4 {
            return Self::None; // fallback type, should not happen
        }

        unsafe { std::mem::transmute(error_type) }
    }
}

pub type Result<T> = std::result::Result<T, GdalError>;

/// Failure taxonomy of the validator, the compliance checker and the construction pipeline.
#[derive(Debug, Error)]
pub enum PogError {
    #[error("'{}' does not exist", path.display())]
    NotFound { path: PathBuf },
    #[error("'{}' is not a TIFF container: {reason}", path.display())]
    NotAContainer { path: PathBuf, reason: String },
    #[error("'{}' could not be read: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("'{}' has {} structural violation(s): {}", path.display(), findings.len(), findings.join("; "))]
    StructuralViolation {
        path: PathBuf,
        findings: Vec<String>,
    },
    #[error("'{}' has cell size {cell_size} which is not a supported pyramid resolution", path.display())]
    ResolutionUnsupported { path: PathBuf, cell_size: f64 },
    #[error("'{}' is not on the canonical grid: expected {expected:?}, found {actual:?}", path.display())]
    GridMismatch {
        path: PathBuf,
        expected: GeoTransform,
        actual: Option<GeoTransform>,
    },
    #[error("'{}' violates the {convention} convention: {detail}", path.display())]
    ConventionViolation {
        path: PathBuf,
        convention: &'static str,
        detail: String,
    },
    #[error("pipeline aborted during the {stage} stage: {source}")]
    PipelineAborted {
        stage: Stage,
        #[source]
        source: Box<PogError>,
    },
    #[error(transparent)]
    Gdal(#[from] GdalError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PogError {
    pub(crate) fn aborted(stage: Stage, source: PogError) -> Self {
        PogError::PipelineAborted {
            stage,
            source: Box::new(source),
        }
    }
}

pub type PogResult<T> = std::result::Result<T, PogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpl_err_type_from_raw() {
        assert_eq!(CplErrType::from(CPLErr::CE_Failure), CplErrType::Failure);
        assert_eq!(CplErrType::from(CPLErr::CE_None), CplErrType::None);
        assert_eq!(CplErrType::from(17), CplErrType::None);
    }

    #[test]
    fn test_pipeline_aborted_keeps_source() {
        let err = PogError::aborted(
            Stage::Overviews,
            PogError::NotFound {
                path: PathBuf::from("/tmp/missing.tif"),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("overviews"), "{msg}");
        assert!(msg.contains("/tmp/missing.tif"), "{msg}");
        assert!(std::error::Error::source(&err).is_some());
    }
}
