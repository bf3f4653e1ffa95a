use std::ffi::{c_int, CString};
use std::path::Path;
use std::sync::Once;

use gdal_sys::{self, GDALDriverH, GDALMajorObjectH};

use crate::cpl::CslStringList;
use crate::dataset::Dataset;
use crate::errors::*;
use crate::metadata::{MajorObject, Metadata};
use crate::raster::GdalType;
use crate::utils::{_last_null_pointer_err, _path_to_c_string, _string};

static START: Once = Once::new();

pub fn _register_drivers() {
    START.call_once(|| unsafe {
        gdal_sys::GDALAllRegister();
    });
}

/// Raster format driver.
#[allow(missing_copy_implementations)]
pub struct Driver {
    c_driver: GDALDriverH,
}

impl Driver {
    /// Returns the driver with the given short name (`GTiff`, `COG`, `MEM`).
    pub fn get_driver_by_name(name: &str) -> Result<Driver> {
        _register_drivers();
        let c_name = CString::new(name)?;
        let c_driver = unsafe { gdal_sys::GDALGetDriverByName(c_name.as_ptr()) };
        if c_driver.is_null() {
            return Err(_last_null_pointer_err("GDALGetDriverByName"));
        };
        Ok(Driver { c_driver })
    }

    /// Creates a new Driver object by wrapping a C pointer
    ///
    /// # Safety
    /// This method operates on a raw C pointer
    pub unsafe fn from_c_driver(c_driver: GDALDriverH) -> Driver {
        Driver { c_driver }
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_driver(&self) -> GDALDriverH {
        self.c_driver
    }

    pub fn short_name(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetDriverShortName(self.c_driver) };
        _string(rv).unwrap_or_default()
    }

    /// The XML creation-option list the driver advertises (`DMD_CREATIONOPTIONLIST`).
    pub fn creation_option_list(&self) -> String {
        self.metadata_item("DMD_CREATIONOPTIONLIST", "")
            .unwrap_or_default()
    }

    /// Whether `value` appears among the values advertised for the creation option `option`.
    ///
    /// Codec availability depends on how GDAL was built, so `COMPRESS=ZSTD` has
    /// to be queried at runtime.
    pub fn supports_creation_value(&self, option: &str, value: &str) -> bool {
        let list = self.creation_option_list();
        let marker = format!("name='{option}'");
        let Some(start) = list.find(&marker) else {
            return false;
        };
        let section = &list[start..];
        let end = section.find("</Option>").unwrap_or(section.len());
        section[..end].contains(&format!("<Value>{value}</Value>"))
    }

    pub fn create_with_band_type_with_options<T: GdalType>(
        &self,
        filename: &Path,
        size_x: usize,
        size_y: usize,
        bands: usize,
        options: &CslStringList,
    ) -> Result<Dataset> {
        let c_filename = _path_to_c_string(filename)?;
        let c_dataset = unsafe {
            gdal_sys::GDALCreate(
                self.c_driver,
                c_filename.as_ptr(),
                size_x as c_int,
                size_y as c_int,
                bands as c_int,
                T::gdal_type(),
                options.as_ptr(),
            )
        };

        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALCreate"));
        };

        Ok(unsafe { Dataset::from_c_dataset(c_dataset) })
    }
}

impl MajorObject for Driver {
    fn gdal_object_ptr(&self) -> GDALMajorObjectH {
        self.c_driver
    }
}

impl Metadata for Driver {}
