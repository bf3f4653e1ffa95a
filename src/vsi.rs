//! Byte-level access through GDAL's Virtual File System.
//!
//! The structural validator reads raw TIFF bytes with these handles so the
//! same code inspects local files, `/vsimem/` buffers and remote
//! `/vsicurl/` objects.

use std::ffi::{c_int, c_void, CString};
use std::mem::{ManuallyDrop, MaybeUninit};
use std::path::Path;

use gdal_sys::{VSIFCloseL, VSIFileFromMemBuffer, VSILFILE, VSIUnlink};

use crate::driver::_register_drivers;
use crate::errors::{GdalError, Result};
use crate::utils::{_last_null_pointer_err, _path_to_c_string};

const SEEK_SET: c_int = 0;
const SEEK_END: c_int = 2;
const VSI_STAT_EXISTS_FLAG: c_int = 0x1;

/// Prefixes of VSI handlers that go over the network.
const REMOTE_PREFIXES: &[&str] = &[
    "/vsicurl",
    "/vsis3",
    "/vsigs",
    "/vsiaz",
    "/vsiadls",
    "/vsioss",
    "/vsiswift",
    "/vsiwebhdfs",
    "/vsihdfs",
    "http://",
    "https://",
    "ftp://",
];

/// Whether `path` is served by a network VSI handler.
pub fn is_remote(path: &str) -> bool {
    REMOTE_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Maps bare URLs onto `/vsicurl/`, leaving every other path untouched.
pub fn vsi_path(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("ftp://") {
        format!("/vsicurl/{path}")
    } else {
        path.to_string()
    }
}

/// Whether a file exists on any VSI file system.
pub fn path_exists(path: &str) -> Result<bool> {
    _register_drivers();
    let c_path = CString::new(path)?;
    let mut stat = MaybeUninit::<gdal_sys::VSIStatBufL>::zeroed();
    let rv = unsafe { gdal_sys::VSIStatExL(c_path.as_ptr(), stat.as_mut_ptr(), VSI_STAT_EXISTS_FLAG) };
    Ok(rv == 0)
}

/// A read-only VSI file handle, closed on drop.
#[derive(Debug)]
pub struct VsiFile {
    handle: *mut VSILFILE,
    path: String,
    size: u64,
}

impl VsiFile {
    pub fn open(path: &str) -> Result<Self> {
        _register_drivers();
        let c_path = CString::new(path)?;
        let c_mode = CString::new("rb")?;
        let handle = unsafe { gdal_sys::VSIFOpenL(c_path.as_ptr(), c_mode.as_ptr()) };
        if handle.is_null() {
            return Err(_last_null_pointer_err("VSIFOpenL"));
        }
        let mut file = Self {
            handle,
            path: path.to_string(),
            size: 0,
        };
        unsafe {
            if gdal_sys::VSIFSeekL(handle, 0, SEEK_END) != 0 {
                return Err(GdalError::BadArgument(format!("cannot seek to the end of '{path}'")));
            }
            file.size = gdal_sys::VSIFTellL(handle);
        }
        Ok(file)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads up to `buf.len()` bytes at `offset`, returning how many were read.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        unsafe {
            if gdal_sys::VSIFSeekL(self.handle, offset, SEEK_SET) != 0 {
                return Err(GdalError::BadArgument(format!(
                    "cannot seek to offset {offset} of '{}'",
                    self.path
                )));
            }
            Ok(gdal_sys::VSIFReadL(
                buf.as_mut_ptr() as *mut c_void,
                1,
                buf.len(),
                self.handle,
            ))
        }
    }
}

impl Drop for VsiFile {
    fn drop(&mut self) {
        unsafe {
            VSIFCloseL(self.handle);
        }
    }
}

/// Creates a new VSIMemFile from a given buffer.
pub fn create_mem_file(file_name: &Path, data: Vec<u8>) -> Result<()> {
    let file_name = _path_to_c_string(file_name)?;

    // ownership will be given to GDAL, so it should not be automaticly dropped
    let mut data = ManuallyDrop::new(data);

    let handle = unsafe {
        VSIFileFromMemBuffer(
            file_name.as_ptr(),
            data.as_mut_ptr(),
            data.len() as u64,
            true as i32,
        )
    };

    if handle.is_null() {
        // on error, allow dropping the data again
        ManuallyDrop::into_inner(data);
        return Err(_last_null_pointer_err("VSIFileFromMemBuffer"));
    }

    unsafe {
        VSIFCloseL(handle);
    }

    Ok(())
}

/// Unlink a VSIMemFile.
pub fn unlink_mem_file(file_name: &Path) -> Result<()> {
    let file_name_c = _path_to_c_string(file_name)?;

    let rv = unsafe { VSIUnlink(file_name_c.as_ptr()) };

    if rv != 0 {
        return Err(GdalError::UnlinkMemFile {
            file_name: file_name.display().to_string(),
        });
    }

    Ok(())
}
