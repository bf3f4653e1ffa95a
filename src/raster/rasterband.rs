use std::ffi::{c_int, c_void};
use std::marker::PhantomData;

use gdal_sys::{self, CPLErr, GDALMajorObjectH, GDALRWFlag, GDALRasterBandH};

use crate::dataset::Dataset;
use crate::errors::*;
use crate::metadata::{MajorObject, Metadata};
use crate::progress::{GdalProgress, ProgressReporter};
use crate::raster::types::{GDALDataType, GdalType, NoDataValue};
use crate::utils::{_last_cpl_err, _last_null_pointer_err};

/// Represents a single band of a dataset.
///
/// This object carries the lifetime of the dataset that
/// contains it. This is necessary to prevent the dataset
/// from being dropped before the band.
pub struct RasterBand<'a> {
    c_rasterband: GDALRasterBandH,
    phantom: PhantomData<&'a Dataset>,
}

/// Summary statistics of a band as computed by GDAL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticsAll {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl<'a> RasterBand<'a> {
    /// Create a RasterBand from a wrapped C pointer
    ///
    /// # Safety
    /// This method operates on a raw C pointer
    pub unsafe fn from_c_rasterband(_: &'a Dataset, c_rasterband: GDALRasterBandH) -> Self {
        RasterBand {
            c_rasterband,
            phantom: PhantomData,
        }
    }

    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_rasterband(&self) -> GDALRasterBandH {
        self.c_rasterband
    }

    /// The natural block size of this band.
    pub fn block_size(&self) -> (usize, usize) {
        let mut size_x = 0;
        let mut size_y = 0;

        unsafe { gdal_sys::GDALGetBlockSize(self.c_rasterband, &mut size_x, &mut size_y) };
        (size_x as usize, size_y as usize)
    }

    /// Get dimensions of the band.
    /// Note that this may not be the same as `size` on the
    /// owning dataset for overview bands.
    pub fn size(&self) -> (usize, usize) {
        let size_x = unsafe { gdal_sys::GDALGetRasterBandXSize(self.c_rasterband) };
        let size_y = unsafe { gdal_sys::GDALGetRasterBandYSize(self.c_rasterband) };
        (size_x as usize, size_y as usize)
    }

    pub fn band_type(&self) -> GDALDataType::Type {
        unsafe { gdal_sys::GDALGetRasterDataType(self.c_rasterband) }
    }

    /// Read a window of this band into `buffer` at full resolution.
    ///
    /// # Arguments
    /// * window - the window position from top left
    /// * window_size - the window size; `buffer` must hold exactly that many pixels
    pub fn read_into_slice<T: GdalType>(
        &self,
        window: (usize, usize),
        window_size: (usize, usize),
        buffer: &mut [T],
    ) -> Result<()> {
        self.raster_io(
            GDALRWFlag::GF_Read,
            window,
            window_size,
            buffer.as_mut_ptr() as *mut c_void,
            buffer.len(),
            T::gdal_type(),
        )
    }

    /// Write `buffer` into a window of this band at full resolution.
    pub fn write_from_slice<T: GdalType>(
        &mut self,
        window: (usize, usize),
        window_size: (usize, usize),
        buffer: &[T],
    ) -> Result<()> {
        self.raster_io(
            GDALRWFlag::GF_Write,
            window,
            window_size,
            buffer.as_ptr() as *mut c_void,
            buffer.len(),
            T::gdal_type(),
        )
    }

    fn raster_io(
        &self,
        flag: GDALRWFlag::Type,
        window: (usize, usize),
        window_size: (usize, usize),
        data: *mut c_void,
        len: usize,
        data_type: GDALDataType::Type,
    ) -> Result<()> {
        if len != window_size.0 * window_size.1 {
            return Err(GdalError::BadArgument(format!(
                "buffer of {len} pixels does not match window {}x{}",
                window_size.0, window_size.1
            )));
        }
        let rv = unsafe {
            gdal_sys::GDALRasterIO(
                self.c_rasterband,
                flag,
                window.0 as c_int,
                window.1 as c_int,
                window_size.0 as c_int,
                window_size.1 as c_int,
                data,
                window_size.0 as c_int,
                window_size.1 as c_int,
                data_type,
                0,
                0,
            )
        };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(())
    }

    /// The band no-data value, read through the accessor matching the band type.
    pub fn no_data_value(&self) -> Option<NoDataValue> {
        let mut pb_success = 0;
        match self.band_type() {
            #[cfg(gdal_has_int64)]
            GDALDataType::GDT_Int64 => {
                let v = unsafe {
                    gdal_sys::GDALGetRasterNoDataValueAsInt64(self.c_rasterband, &mut pb_success)
                };
                (pb_success == 1).then_some(NoDataValue::Int(v))
            }
            #[cfg(gdal_has_int64)]
            GDALDataType::GDT_UInt64 => {
                let v = unsafe {
                    gdal_sys::GDALGetRasterNoDataValueAsUInt64(self.c_rasterband, &mut pb_success)
                };
                (pb_success == 1).then_some(NoDataValue::UInt(v))
            }
            _ => {
                let v = unsafe {
                    gdal_sys::GDALGetRasterNoDataValue(self.c_rasterband, &mut pb_success)
                };
                (pb_success == 1).then_some(NoDataValue::Float(v))
            }
        }
    }

    pub fn set_no_data_value(&mut self, no_data: NoDataValue) -> Result<()> {
        let rv = match no_data {
            #[cfg(gdal_has_int64)]
            NoDataValue::Int(v) if self.band_type() == GDALDataType::GDT_Int64 => unsafe {
                gdal_sys::GDALSetRasterNoDataValueAsInt64(self.c_rasterband, v)
            },
            #[cfg(gdal_has_int64)]
            NoDataValue::UInt(v) if self.band_type() == GDALDataType::GDT_UInt64 => unsafe {
                gdal_sys::GDALSetRasterNoDataValueAsUInt64(self.c_rasterband, v)
            },
            other => unsafe { gdal_sys::GDALSetRasterNoDataValue(self.c_rasterband, other.as_f64()) },
        };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(())
    }

    pub fn overview_count(&self) -> usize {
        let count = unsafe { gdal_sys::GDALGetOverviewCount(self.c_rasterband) };
        count.max(0) as usize
    }

    pub fn overview(&self, overview_index: usize) -> Result<RasterBand<'a>> {
        let c_band = unsafe { gdal_sys::GDALGetOverview(self.c_rasterband, overview_index as c_int) };
        if c_band.is_null() {
            return Err(_last_null_pointer_err("GDALGetOverview"));
        }
        Ok(RasterBand {
            c_rasterband: c_band,
            phantom: PhantomData,
        })
    }

    /// Compute statistics by scanning every pixel (or a subsample when `approx_ok`).
    ///
    /// GDAL stores the result as `STATISTICS_*` metadata on the band.
    pub fn compute_statistics(
        &mut self,
        approx_ok: bool,
        progress: &mut dyn ProgressReporter,
    ) -> Result<StatisticsAll> {
        let mut min = 0.0;
        let mut max = 0.0;
        let mut mean = 0.0;
        let mut std_dev = 0.0;
        let mut gdal_progress = GdalProgress::new(progress);
        let rv = unsafe {
            gdal_sys::GDALComputeRasterStatistics(
                self.c_rasterband,
                c_int::from(approx_ok),
                &mut min,
                &mut max,
                &mut mean,
                &mut std_dev,
                gdal_progress.callback(),
                gdal_progress.user_data(),
            )
        };
        if rv != CPLErr::CE_None {
            return Err(_last_cpl_err(rv));
        }
        Ok(StatisticsAll {
            min,
            max,
            mean,
            std_dev,
        })
    }
}

impl MajorObject for RasterBand<'_> {
    fn gdal_object_ptr(&self) -> GDALMajorObjectH {
        self.c_rasterband
    }
}

impl Metadata for RasterBand<'_> {}
