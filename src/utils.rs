use std::ffi::{c_char, CStr, CString};
use std::path::Path;

use gdal_sys::CPLErr;

use crate::errors::*;

/// Makes a copy of a C string returned by GDAL, or `None` for a null pointer.
pub fn _string(raw_ptr: *const c_char) -> Option<String> {
    if raw_ptr.is_null() {
        None
    } else {
        let c_str = unsafe { CStr::from_ptr(raw_ptr) };
        Some(c_str.to_string_lossy().into_owned())
    }
}

pub fn _last_cpl_err(cpl_err_class: CPLErr::Type) -> GdalError {
    let last_err_no = unsafe { gdal_sys::CPLGetLastErrorNo() };
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() }).unwrap_or_default();
    unsafe { gdal_sys::CPLErrorReset() };
    GdalError::CplError {
        class: cpl_err_class.into(),
        number: last_err_no,
        msg: last_err_msg,
    }
}

pub fn _last_null_pointer_err(method_name: &'static str) -> GdalError {
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() }).unwrap_or_default();
    unsafe { gdal_sys::CPLErrorReset() };
    GdalError::NullPointer {
        method_name,
        msg: last_err_msg,
    }
}

pub fn _path_to_c_string(path: &Path) -> Result<CString> {
    let path_str = path.to_string_lossy();
    CString::new(path_str.as_ref()).map_err(Into::into)
}

/// Converts a list of arguments into owned C strings plus a null-terminated pointer vector.
///
/// The pointer vector borrows from the returned strings; keep both alive for the call.
pub(crate) fn _c_string_vec<S: Into<Vec<u8>>, I: IntoIterator<Item = S>>(
    args: I,
) -> Result<(Vec<CString>, Vec<*mut c_char>)> {
    let cstr_args = args
        .into_iter()
        .map(CString::new)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut c_args = cstr_args
        .iter()
        .map(|x| x.as_ptr() as *mut c_char)
        .collect::<Vec<_>>();
    c_args.push(std::ptr::null_mut());
    Ok((cstr_args, c_args))
}
