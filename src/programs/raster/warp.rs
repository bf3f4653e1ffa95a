use std::ffi::c_int;
use std::path::Path;
use std::ptr::null_mut;

use gdal_sys::GDALWarpAppOptions;

use crate::errors::*;
use crate::progress::{GdalProgress, ProgressReporter};
use crate::utils::{_c_string_vec, _last_null_pointer_err, _path_to_c_string};
use crate::Dataset;

/// Wraps a [GDALWarpAppOptions] object.
///
/// [GDALWarpAppOptions]: https://gdal.org/api/gdal_utils.html#_CPPv418GDALWarpAppOptions
pub struct WarpAppOptions {
    c_options: *mut GDALWarpAppOptions,
}

impl WarpAppOptions {
    /// Parse `gdalwarp` command line arguments (`-te`, `-tr`, `-r`, `-dstnodata`, ...).
    ///
    /// See [GDALWarpAppOptionsNew].
    ///
    /// [GDALWarpAppOptionsNew]: https://gdal.org/api/gdal_utils.html#_CPPv421GDALWarpAppOptionsNewPPcP29GDALWarpAppOptionsForBinary
    pub fn new<S: Into<Vec<u8>>, I: IntoIterator<Item = S>>(args: I) -> Result<Self> {
        let (_cstr_args, mut c_args) = _c_string_vec(args)?;

        let c_options = unsafe { gdal_sys::GDALWarpAppOptionsNew(c_args.as_mut_ptr(), null_mut()) };
        if c_options.is_null() {
            return Err(_last_null_pointer_err("GDALWarpAppOptionsNew"));
        }
        Ok(Self { c_options })
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_options(&self) -> *mut GDALWarpAppOptions {
        self.c_options
    }
}

impl Drop for WarpAppOptions {
    fn drop(&mut self) {
        unsafe {
            gdal_sys::GDALWarpAppOptionsFree(self.c_options);
        }
    }
}

/// Warp `source` into a new file at `dest`.
/// Wraps [GDALWarp].
/// See the [program docs] for more details.
///
/// [GDALWarp]: https://gdal.org/api/gdal_utils.html#_CPPv48GDALWarpPKc12GDALDatasetHiP12GDALDatasetHPK18GDALWarpAppOptionsPi
/// [program docs]: https://gdal.org/programs/gdalwarp.html
pub fn warp(
    source: &Dataset,
    dest: &Path,
    options: &WarpAppOptions,
    progress: &mut dyn ProgressReporter,
) -> Result<Dataset> {
    let c_dest = _path_to_c_string(dest)?;
    let mut gdal_progress = GdalProgress::new(progress);
    let mut usage_error: c_int = 0;
    let mut sources = [unsafe { source.c_dataset() }];

    let dataset_out = unsafe {
        gdal_sys::GDALWarpAppOptionsSetProgress(
            options.c_options,
            gdal_progress.callback(),
            gdal_progress.user_data(),
        );
        gdal_sys::GDALWarp(
            c_dest.as_ptr(),
            null_mut(),
            sources.len() as c_int,
            sources.as_mut_ptr(),
            options.c_options,
            &mut usage_error,
        )
    };

    if usage_error != 0 {
        return Err(GdalError::UsageError {
            method_name: "GDALWarp",
            msg: "invalid arguments".to_string(),
        });
    }
    if dataset_out.is_null() {
        return Err(_last_null_pointer_err("GDALWarp"));
    }

    Ok(unsafe { Dataset::from_c_dataset(dataset_out) })
}
