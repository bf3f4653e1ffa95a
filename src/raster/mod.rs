//! GDAL Raster Data

mod rasterband;
mod types;

pub use rasterband::{RasterBand, StatisticsAll};
pub use types::{data_type_name, GDALDataType, GdalType, NoDataValue};
