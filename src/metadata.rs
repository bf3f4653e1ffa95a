use std::ffi::CString;

use gdal_sys::{CPLErr, GDALMajorObjectH};

use crate::errors::*;
use crate::utils::{_last_cpl_err, _string};

/// Common trait for GDAL major objects (datasets, bands, drivers).
pub trait MajorObject {
    fn gdal_object_ptr(&self) -> GDALMajorObjectH;
}

/// Metadata access shared by datasets, bands and drivers.
///
/// An empty `domain` selects the default domain. Well-known domains used here
/// are `IMAGE_STRUCTURE` (compression, interleaving) and the default domain
/// holding `STATISTICS_*` items.
pub trait Metadata: MajorObject {
    fn metadata_item(&self, key: &str, domain: &str) -> Option<String> {
        let c_key = CString::new(key).ok()?;
        let c_domain = CString::new(domain).ok()?;
        let c_res = unsafe {
            gdal_sys::GDALGetMetadataItem(self.gdal_object_ptr(), c_key.as_ptr(), c_domain.as_ptr())
        };
        _string(c_res)
    }

    fn set_metadata_item(&mut self, key: &str, value: &str, domain: &str) -> Result<()> {
        let c_key = CString::new(key)?;
        let c_domain = CString::new(domain)?;
        let c_value = CString::new(value)?;

        let c_res = unsafe {
            gdal_sys::GDALSetMetadataItem(
                self.gdal_object_ptr(),
                c_key.as_ptr(),
                c_value.as_ptr(),
                c_domain.as_ptr(),
            )
        };
        if c_res != CPLErr::CE_None {
            return Err(_last_cpl_err(c_res));
        }
        Ok(())
    }
}
