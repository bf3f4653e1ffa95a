//! GDAL runtime configuration options.
//!
//! Options set here override the matching environment variables. Only the
//! thread-local flavour is exposed: pipeline workers tune GDAL for the one
//! file they are processing without affecting other threads.
//!
//! Refer to [GDAL `ConfigOptions`](https://gdal.org/user/configoptions.html) for
//! a full list of options.

use std::ffi::CString;

use crate::errors::Result;
use crate::utils::_string;

/// Set a GDAL library configuration option with **thread local** scope.
pub fn set_thread_local_config_option(key: &str, value: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    let c_val = CString::new(value.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), c_val.as_ptr());
    };
    Ok(())
}

/// Get the value of a **thread local** GDAL configuration option.
///
/// Returns `None` if the option is unset.
pub fn get_thread_local_config_option(key: &str) -> Result<Option<String>> {
    let c_key = CString::new(key.as_bytes())?;
    let rv = unsafe { gdal_sys::CPLGetThreadLocalConfigOption(c_key.as_ptr(), std::ptr::null()) };
    Ok(_string(rv))
}

/// Clear the value of a **thread local** GDAL configuration option.
pub fn clear_thread_local_config_option(key: &str) -> Result<()> {
    let c_key = CString::new(key.as_bytes())?;
    unsafe {
        gdal_sys::CPLSetThreadLocalConfigOption(c_key.as_ptr(), std::ptr::null());
    };
    Ok(())
}

/// Sets a thread-local option for the lifetime of the guard and restores the
/// previous value when dropped.
#[derive(Debug)]
pub struct ConfigOptionGuard {
    key: String,
    previous: Option<String>,
}

impl ConfigOptionGuard {
    pub fn set(key: &str, value: &str) -> Result<Self> {
        let previous = get_thread_local_config_option(key)?;
        set_thread_local_config_option(key, value)?;
        Ok(Self {
            key: key.to_string(),
            previous,
        })
    }
}

impl Drop for ConfigOptionGuard {
    fn drop(&mut self) {
        let restored = match &self.previous {
            Some(value) => set_thread_local_config_option(&self.key, value),
            None => clear_thread_local_config_option(&self.key),
        };
        if let Err(e) = restored {
            tracing::warn!(key = %self.key, error = %e, "failed to restore GDAL config option");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear_thread_local() -> Result<()> {
        set_thread_local_config_option("POG_TEST_OPTION", "42")?;
        assert_eq!(
            get_thread_local_config_option("POG_TEST_OPTION")?.as_deref(),
            Some("42")
        );
        clear_thread_local_config_option("POG_TEST_OPTION")?;
        assert_eq!(get_thread_local_config_option("POG_TEST_OPTION")?, None);
        Ok(())
    }

    #[test]
    fn test_guard_restores_previous_value() -> Result<()> {
        set_thread_local_config_option("GDAL_TIFF_OVR_BLOCKSIZE", "128")?;
        {
            let _guard = ConfigOptionGuard::set("GDAL_TIFF_OVR_BLOCKSIZE", "512")?;
            assert_eq!(
                get_thread_local_config_option("GDAL_TIFF_OVR_BLOCKSIZE")?.as_deref(),
                Some("512")
            );
        }
        assert_eq!(
            get_thread_local_config_option("GDAL_TIFF_OVR_BLOCKSIZE")?.as_deref(),
            Some("128")
        );
        clear_thread_local_config_option("GDAL_TIFF_OVR_BLOCKSIZE")?;

        {
            let _guard = ConfigOptionGuard::set("GDAL_TIFF_OVR_BLOCKSIZE", "512")?;
        }
        assert_eq!(get_thread_local_config_option("GDAL_TIFF_OVR_BLOCKSIZE")?, None);
        Ok(())
    }
}
