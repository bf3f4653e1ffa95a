//! Pixel-type, compression and resampling conventions of pyramid rasters.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::{GdalError, Result};
use crate::raster::{GDALDataType, NoDataValue};

/// Default square tile edge of a finalized container.
pub const BLOCK_SIZE: usize = 512;

/// Pixel types a pyramid raster may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
}

impl PixelType {
    pub const ALL: [PixelType; 10] = [
        PixelType::UInt8,
        PixelType::Int8,
        PixelType::UInt16,
        PixelType::Int16,
        PixelType::UInt32,
        PixelType::Int32,
        PixelType::UInt64,
        PixelType::Int64,
        PixelType::Float32,
        PixelType::Float64,
    ];

    /// Integer types hold class codes; floating types hold measurements.
    pub fn is_categorical(self) -> bool {
        !matches!(self, PixelType::Float32 | PixelType::Float64)
    }

    /// The sentinel every band of this type must declare.
    pub fn canonical_no_data(self) -> NoDataValue {
        match self {
            PixelType::UInt8 => NoDataValue::UInt(u8::MAX.into()),
            PixelType::UInt16 => NoDataValue::UInt(u16::MAX.into()),
            PixelType::UInt32 => NoDataValue::UInt(u32::MAX.into()),
            PixelType::UInt64 => NoDataValue::UInt(u64::MAX),
            PixelType::Int8 => NoDataValue::Int(i8::MIN.into()),
            PixelType::Int16 | PixelType::Int32 | PixelType::Int64 => NoDataValue::Int(-9999),
            PixelType::Float32 | PixelType::Float64 => NoDataValue::Float(-9999.0),
        }
    }

    /// The name GDAL and `gdal_translate -ot` use.
    pub fn gdal_name(self) -> &'static str {
        match self {
            PixelType::UInt8 => "Byte",
            PixelType::Int8 => "Int8",
            PixelType::UInt16 => "UInt16",
            PixelType::Int16 => "Int16",
            PixelType::UInt32 => "UInt32",
            PixelType::Int32 => "Int32",
            PixelType::UInt64 => "UInt64",
            PixelType::Int64 => "Int64",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
        }
    }

    /// The GDAL type code, if the linked GDAL knows this type.
    pub fn gdal_type(self) -> Result<GDALDataType::Type> {
        let code = match self {
            PixelType::UInt8 => GDALDataType::GDT_Byte,
            #[cfg(gdal_has_int8)]
            PixelType::Int8 => GDALDataType::GDT_Int8,
            PixelType::UInt16 => GDALDataType::GDT_UInt16,
            PixelType::Int16 => GDALDataType::GDT_Int16,
            PixelType::UInt32 => GDALDataType::GDT_UInt32,
            PixelType::Int32 => GDALDataType::GDT_Int32,
            #[cfg(gdal_has_int64)]
            PixelType::UInt64 => GDALDataType::GDT_UInt64,
            #[cfg(gdal_has_int64)]
            PixelType::Int64 => GDALDataType::GDT_Int64,
            PixelType::Float32 => GDALDataType::GDT_Float32,
            PixelType::Float64 => GDALDataType::GDT_Float64,
            #[allow(unreachable_patterns)]
            other => return Err(GdalError::UnsupportedDataType(other.gdal_name().to_string())),
        };
        Ok(code)
    }

    /// Maps a GDAL type code back; complex types have no counterpart.
    pub fn from_gdal(data_type: GDALDataType::Type) -> Option<PixelType> {
        PixelType::ALL
            .into_iter()
            .find(|t| t.gdal_type().ok() == Some(data_type))
    }
}

impl Display for PixelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.gdal_name())
    }
}

impl FromStr for PixelType {
    type Err = GdalError;

    /// Accepts GDAL names (`Byte`, `Float32`) and Rust-style aliases (`u8`, `f32`).
    fn from_str(s: &str) -> Result<Self> {
        let t = match s.trim().to_ascii_lowercase().as_str() {
            "byte" | "uint8" | "u8" => PixelType::UInt8,
            "int8" | "i8" => PixelType::Int8,
            "uint16" | "u16" => PixelType::UInt16,
            "int16" | "i16" => PixelType::Int16,
            "uint32" | "u32" => PixelType::UInt32,
            "int32" | "i32" => PixelType::Int32,
            "uint64" | "u64" => PixelType::UInt64,
            "int64" | "i64" => PixelType::Int64,
            "float32" | "f32" => PixelType::Float32,
            "float64" | "f64" => PixelType::Float64,
            _ => return Err(GdalError::UnsupportedDataType(s.to_string())),
        };
        Ok(t)
    }
}

/// The two codecs a finalized container may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    Zstd,
    /// Fallback for GDAL builds without ZSTD.
    Lzw,
}

impl Compression {
    pub fn name(self) -> &'static str {
        match self {
            Compression::Zstd => "ZSTD",
            Compression::Lzw => "LZW",
        }
    }

    /// Case-insensitive match of a codec name as GDAL reports it.
    pub fn from_name(name: &str) -> Option<Compression> {
        match name.trim().to_ascii_uppercase().as_str() {
            "ZSTD" => Some(Compression::Zstd),
            "LZW" => Some(Compression::Lzw),
            _ => None,
        }
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = GdalError;

    fn from_str(s: &str) -> Result<Self> {
        Compression::from_name(s)
            .ok_or_else(|| GdalError::BadArgument(format!("unsupported compression '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resampling {
    Nearest,
    Bilinear,
    Mode,
    Average,
}

impl Resampling {
    /// Kernel used to warp a raster of `pixel_type` onto the canonical grid.
    pub fn for_warp(pixel_type: PixelType) -> Resampling {
        if pixel_type.is_categorical() {
            Resampling::Nearest
        } else {
            Resampling::Bilinear
        }
    }

    /// Kernel used to derive overviews of a raster of `pixel_type`.
    pub fn for_overviews(pixel_type: PixelType) -> Resampling {
        if pixel_type.is_categorical() {
            Resampling::Mode
        } else {
            Resampling::Average
        }
    }

    /// Spelling accepted by `gdalwarp -r` and the COG `RESAMPLING` option.
    pub fn warp_name(self) -> &'static str {
        match self {
            Resampling::Nearest => "near",
            Resampling::Bilinear => "bilinear",
            Resampling::Mode => "mode",
            Resampling::Average => "average",
        }
    }

    /// Spelling accepted by `GDALBuildOverviews` and `OVERVIEW_RESAMPLING`.
    pub fn overview_name(self) -> &'static str {
        match self {
            Resampling::Nearest => "NEAREST",
            Resampling::Bilinear => "BILINEAR",
            Resampling::Mode => "MODE",
            Resampling::Average => "AVERAGE",
        }
    }
}
