use std::ffi::c_int;
use std::path::Path;
use std::ptr::null_mut;

use gdal_sys::GDALTranslateOptions;

use crate::errors::*;
use crate::progress::{GdalProgress, ProgressReporter};
use crate::utils::{_c_string_vec, _last_null_pointer_err, _path_to_c_string};
use crate::Dataset;

/// Wraps a [GDALTranslateOptions] object.
///
/// [GDALTranslateOptions]: https://gdal.org/api/gdal_utils.html#_CPPv420GDALTranslateOptions
pub struct TranslateOptions {
    c_options: *mut GDALTranslateOptions,
}

impl TranslateOptions {
    /// Parse `gdal_translate` command line arguments (`-ot Byte`, `-of GTiff`, `-co TILED=YES`, ...).
    ///
    /// See [GDALTranslateOptionsNew].
    ///
    /// [GDALTranslateOptionsNew]: https://gdal.org/api/gdal_utils.html#_CPPv423GDALTranslateOptionsNewPPcP31GDALTranslateOptionsForBinary
    pub fn new<S: Into<Vec<u8>>, I: IntoIterator<Item = S>>(args: I) -> Result<Self> {
        // The strings don't get modified, the C API is just not const-correct.
        let (_cstr_args, mut c_args) = _c_string_vec(args)?;

        let c_options = unsafe { gdal_sys::GDALTranslateOptionsNew(c_args.as_mut_ptr(), null_mut()) };
        if c_options.is_null() {
            return Err(_last_null_pointer_err("GDALTranslateOptionsNew"));
        }
        Ok(Self { c_options })
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_options(&self) -> *mut GDALTranslateOptions {
        self.c_options
    }
}

impl Drop for TranslateOptions {
    fn drop(&mut self) {
        unsafe {
            gdal_sys::GDALTranslateOptionsFree(self.c_options);
        }
    }
}

/// Convert `dataset` into a new file at `dest`.
/// Wraps [GDALTranslate].
/// See the [program docs] for more details.
///
/// [GDALTranslate]: https://gdal.org/api/gdal_utils.html#_CPPv413GDALTranslatePKc12GDALDatasetHPK20GDALTranslateOptionsPi
/// [program docs]: https://gdal.org/programs/gdal_translate.html
pub fn translate(
    dataset: &Dataset,
    dest: &Path,
    options: &TranslateOptions,
    progress: &mut dyn ProgressReporter,
) -> Result<Dataset> {
    let c_dest = _path_to_c_string(dest)?;
    let mut gdal_progress = GdalProgress::new(progress);
    let mut usage_error: c_int = 0;

    let dataset_out = unsafe {
        gdal_sys::GDALTranslateOptionsSetProgress(
            options.c_options,
            gdal_progress.callback(),
            gdal_progress.user_data(),
        );
        gdal_sys::GDALTranslate(
            c_dest.as_ptr(),
            dataset.c_dataset(),
            options.c_options,
            &mut usage_error,
        )
    };

    if usage_error != 0 {
        return Err(GdalError::UsageError {
            method_name: "GDALTranslate",
            msg: "invalid arguments".to_string(),
        });
    }
    if dataset_out.is_null() {
        return Err(_last_null_pointer_err("GDALTranslate"));
    }

    Ok(unsafe { Dataset::from_c_dataset(dataset_out) })
}
