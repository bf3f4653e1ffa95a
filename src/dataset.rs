use std::ffi::{c_int, CString, NulError};
use std::path::Path;
use std::ptr;

use gdal_sys::{self, CPLErr, GDALDatasetH, GDALMajorObjectH};

use crate::cpl::CslStringList;
use crate::driver::{Driver, _register_drivers};
use crate::errors::*;
use crate::geo_transform::GeoTransform;
use crate::metadata::{MajorObject, Metadata};
use crate::options::DatasetOptions;
use crate::progress::{GdalProgress, ProgressReporter};
use crate::raster::RasterBand;
use crate::utils::{_last_cpl_err, _last_null_pointer_err, _path_to_c_string, _string};

/// Wrapper around a [`GDALDatasetH`] handle; the handle is closed on drop.
#[derive(Debug)]
pub struct Dataset {
    c_dataset: GDALDatasetH,
}

// GDAL Docs state: The returned dataset should only be accessed by one thread at a time.
// See: https://gdal.org/api/raster_c_api.html#_CPPv48GDALOpenPKc10GDALAccess
unsafe impl Send for Dataset {}

impl Dataset {
    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_dataset(&self) -> GDALDatasetH {
        self.c_dataset
    }

    /// Creates a new Dataset by wrapping a C pointer
    ///
    /// # Safety
    /// This method operates on a raw C pointer
    pub unsafe fn from_c_dataset(c_dataset: GDALDatasetH) -> Dataset {
        Dataset { c_dataset }
    }

    /// Open a raster dataset read-only.
    pub fn open(path: &Path) -> Result<Dataset> {
        Self::open_ex(path, DatasetOptions::raster_read_only())
    }

    /// Open a raster dataset for in-place modification.
    pub fn open_update(path: &Path) -> Result<Dataset> {
        Self::open_ex(path, DatasetOptions::raster_update())
    }

    /// Open a dataset with extended options.
    /// See [`GDALOpenEx`](https://gdal.org/doxygen/gdal_8h.html#a9cb8585d0b3c16726b08e25bcc94274a).
    pub fn open_ex(path: &Path, options: DatasetOptions) -> Result<Dataset> {
        _register_drivers();
        let c_filename = _path_to_c_string(path)?;
        let c_open_flags = options.open_flags.bits();

        // handle driver params:
        // we need to keep the CStrings and the pointers around
        let c_allowed_drivers = c_string_list(options.allowed_drivers)?;
        let mut c_drivers_ptrs = c_allowed_drivers
            .iter()
            .map(|s| s.as_ptr())
            .collect::<Vec<_>>();
        c_drivers_ptrs.push(ptr::null());
        let c_drivers_ptr = if options.allowed_drivers.is_some() {
            c_drivers_ptrs.as_ptr()
        } else {
            ptr::null()
        };

        let c_open_options = c_string_list(options.open_options)?;
        let mut c_open_options_ptrs = c_open_options
            .iter()
            .map(|s| s.as_ptr())
            .collect::<Vec<_>>();
        c_open_options_ptrs.push(ptr::null());
        let c_open_options_ptr = if options.open_options.is_some() {
            c_open_options_ptrs.as_ptr()
        } else {
            ptr::null()
        };

        let c_dataset = unsafe {
            gdal_sys::GDALOpenEx(
                c_filename.as_ptr(),
                c_open_flags,
                c_drivers_ptr,
                c_open_options_ptr,
                ptr::null(),
            )
        };
        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALOpenEx"));
        }
        Ok(Dataset { c_dataset })
    }

    pub fn driver(&self) -> Driver {
        unsafe {
            let c_driver = gdal_sys::GDALGetDatasetDriver(self.c_dataset);
            Driver::from_c_driver(c_driver)
        }
    }

    pub fn projection(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetProjectionRef(self.c_dataset) };
        _string(rv).unwrap_or_default()
    }

    /// Fetch the 1-based band `band_index`.
    pub fn rasterband(&self, band_index: usize) -> Result<RasterBand> {
        unsafe {
            let c_band = gdal_sys::GDALGetRasterBand(self.c_dataset, band_index as c_int);
            if c_band.is_null() {
                return Err(_last_null_pointer_err("GDALGetRasterBand"));
            }
            Ok(RasterBand::from_c_rasterband(self, c_band))
        }
    }

    pub fn raster_count(&self) -> usize {
        (unsafe { gdal_sys::GDALGetRasterCount(self.c_dataset) }) as usize
    }

    pub fn raster_size(&self) -> (usize, usize) {
        let size_x = unsafe { gdal_sys::GDALGetRasterXSize(self.c_dataset) } as usize;
        let size_y = unsafe { gdal_sys::GDALGetRasterYSize(self.c_dataset) } as usize;
        (size_x, size_y)
    }

    pub fn set_geo_transform(&mut self, transformation: &GeoTransform) -> Result<()> {
        assert_eq!(transformation.len(), 6);
        let rv = unsafe {
            gdal_sys::GDALSetGeoTransform(self.c_dataset, transformation.as_ptr() as *mut f64)
        };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(())
    }

    pub fn geo_transform(&self) -> Result<GeoTransform> {
        let mut transformation = GeoTransform::default();
        let rv =
            unsafe { gdal_sys::GDALGetGeoTransform(self.c_dataset, transformation.as_mut_ptr()) };

        // check if the dataset has a GeoTransform
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(transformation)
    }

    /// Build overviews for every band at the given decimation `factors`.
    ///
    /// An empty `factors` list removes all existing overviews.
    pub fn build_overviews(
        &mut self,
        resampling: &str,
        factors: &[i32],
        progress: &mut dyn ProgressReporter,
    ) -> Result<()> {
        let c_resampling = CString::new(resampling)?;
        let mut overview_list: Vec<c_int> = factors.iter().map(|&f| f as c_int).collect();
        let mut gdal_progress = GdalProgress::new(progress);
        let rv = unsafe {
            gdal_sys::GDALBuildOverviews(
                self.c_dataset,
                c_resampling.as_ptr(),
                overview_list.len() as c_int,
                overview_list.as_mut_ptr(),
                0,
                ptr::null_mut(),
                gdal_progress.callback(),
                gdal_progress.user_data(),
            )
        };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(())
    }

    /// Copy this dataset through `driver`, honouring its creation `options`.
    pub fn create_copy(
        &self,
        driver: &Driver,
        filename: &Path,
        options: &CslStringList,
        progress: &mut dyn ProgressReporter,
    ) -> Result<Dataset> {
        let c_filename = _path_to_c_string(filename)?;
        let mut gdal_progress = GdalProgress::new(progress);
        let c_dataset = unsafe {
            gdal_sys::GDALCreateCopy(
                driver.c_driver(),
                c_filename.as_ptr(),
                self.c_dataset,
                1,
                options.as_ptr(),
                gdal_progress.callback(),
                gdal_progress.user_data(),
            )
        };
        if c_dataset.is_null() {
            return Err(_last_null_pointer_err("GDALCreateCopy"));
        }
        Ok(unsafe { Dataset::from_c_dataset(c_dataset) })
    }
}

fn c_string_list(values: Option<&[&str]>) -> std::result::Result<Vec<CString>, NulError> {
    values
        .unwrap_or_default()
        .iter()
        .map(|&s| CString::new(s))
        .collect()
}

impl MajorObject for Dataset {
    fn gdal_object_ptr(&self) -> GDALMajorObjectH {
        self.c_dataset
    }
}

impl Metadata for Dataset {}

impl Drop for Dataset {
    fn drop(&mut self) {
        unsafe {
            gdal_sys::GDALClose(self.c_dataset);
        }
    }
}
