//! GDAL Common Portability Library helpers: `KEY=VALUE` option lists and
//! error-handler scopes.

use std::ffi::{c_char, c_void, CString};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ptr;

use gdal_sys::{CSLCount, CSLDestroy, CSLDuplicate, CSLSetNameValue};

use crate::errors::{GdalError, Result};
use crate::utils::_string;

/// Wraps a [`gdal_sys::CSLConstList`] (a.k.a. `char **papszStrList`), the
/// null-terminated array of `KEY=VALUE` strings GDAL uses for creation and
/// open options.
pub struct CslStringList {
    list_ptr: *mut *mut c_char,
}

impl CslStringList {
    /// Creates an empty GDAL string list.
    pub fn new() -> Self {
        Self {
            list_ptr: ptr::null_mut(),
        }
    }

    /// Builds a list from `(name, value)` pairs, validating each one.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut list = Self::new();
        for (name, value) in pairs {
            list.set_name_value(name, value)?;
        }
        Ok(list)
    }

    /// Assigns `value` to `name`, overwriting duplicate `name`s.
    ///
    /// Fails if `name` has non alphanumeric characters or `value` contains a newline.
    pub fn set_name_value(&mut self, name: &str, value: &str) -> Result<()> {
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(GdalError::BadArgument(format!(
                "Invalid characters in name: '{name}'"
            )));
        }
        if value.contains(['\n', '\r']) {
            return Err(GdalError::BadArgument(format!(
                "Invalid characters in value: '{value}'"
            )));
        }
        let psz_name = CString::new(name)?;
        let psz_value = CString::new(value)?;

        unsafe {
            self.list_ptr = CSLSetNameValue(self.list_ptr, psz_name.as_ptr(), psz_value.as_ptr());
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        (unsafe { CSLCount(self.as_ptr()) }) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the `(name, value)` entries in insertion order.
    pub fn entries(&self) -> Vec<(String, String)> {
        let count = self.len();
        if count == 0 {
            return Vec::new();
        }
        let fields = unsafe { std::slice::from_raw_parts(self.list_ptr, count) };
        fields
            .iter()
            .filter_map(|field| _string(*field))
            .filter_map(|entry| {
                entry
                    .split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
            })
            .collect()
    }

    /// Get the raw pointer to the underlying data.
    pub fn as_ptr(&self) -> gdal_sys::CSLConstList {
        self.list_ptr
    }
}

impl Drop for CslStringList {
    fn drop(&mut self) {
        unsafe { CSLDestroy(self.list_ptr) }
    }
}

impl Default for CslStringList {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CslStringList {
    fn clone(&self) -> Self {
        let list_ptr = unsafe { CSLDuplicate(self.list_ptr) };
        Self { list_ptr }
    }
}

impl Debug for CslStringList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (k, v) in self.entries() {
            f.write_fmt(format_args!("{k}={v}\n"))?;
        }
        Ok(())
    }
}

/// Scoped value that silences GDAL's thread-local error log.
///
/// Pushes `CPLQuietErrorHandler` on creation and pops it on drop, so expected
/// failures (probing a file that may not be a raster) don't reach stderr.
/// The last error number and message are still recorded by GDAL.
pub struct QuietErrorScope {
    // Make !Sync and !Send, and force use of `new`.
    _private: PhantomData<*mut c_void>,
}

impl QuietErrorScope {
    pub fn new() -> Self {
        unsafe { gdal_sys::CPLPushErrorHandler(Some(gdal_sys::CPLQuietErrorHandler)) };
        QuietErrorScope {
            _private: PhantomData,
        }
    }
}

impl Default for QuietErrorScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for QuietErrorScope {
    fn drop(&mut self) {
        unsafe { gdal_sys::CPLPopErrorHandler() };
    }
}
