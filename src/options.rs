use std::ffi::c_uint;

use bitflags::bitflags;

/// Open options for [`crate::Dataset::open_ex`]
#[derive(Debug, Default)]
pub struct DatasetOptions<'a> {
    pub open_flags: GdalOpenFlags,
    pub allowed_drivers: Option<&'a [&'a str]>,
    pub open_options: Option<&'a [&'a str]>,
}

impl DatasetOptions<'_> {
    /// Raster-only, read-only access.
    pub fn raster_read_only() -> Self {
        Self {
            open_flags: GdalOpenFlags::GDAL_OF_RASTER | GdalOpenFlags::GDAL_OF_READONLY,
            ..Default::default()
        }
    }

    /// Raster-only update access.
    pub fn raster_update() -> Self {
        Self {
            open_flags: GdalOpenFlags::GDAL_OF_RASTER | GdalOpenFlags::GDAL_OF_UPDATE,
            ..Default::default()
        }
    }
}

// These are skipped by bindgen and manually updated.
bitflags! {
    /// GDAL extended open flags used by [`crate::Dataset::open_ex`].
    ///
    /// There is no `GDAL_OF_SHARED`; every [`crate::Dataset`] owns its handle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GdalOpenFlags: c_uint {
        /// Open in read-only mode (default).
        const GDAL_OF_READONLY = 0x00;
        /// Open in update mode.
        const GDAL_OF_UPDATE = 0x01;
        /// Allow raster drivers to be used.
        const GDAL_OF_RASTER = 0x02;
        /// Emit error message in case of failed open.
        const GDAL_OF_VERBOSE_ERROR = 0x40;
        /// Open as internal dataset, not registered in the global list of opened datasets.
        const GDAL_OF_INTERNAL = 0x80;
    }
}

impl Default for GdalOpenFlags {
    fn default() -> GdalOpenFlags {
        GdalOpenFlags::GDAL_OF_READONLY
    }
}
