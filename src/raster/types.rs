use std::fmt::{Display, Formatter};

pub use gdal_sys::GDALDataType;
use gdal_sys::GDALGetDataTypeName;

use crate::utils::_string;

/// Type-level constraint for limiting which primitive numeric values can be passed
/// to functions needing target data type.
///
/// Besides the GDAL type code, implementors provide the exact conversions the
/// no-data rewrite needs: a sentinel is only usable for a band if it is
/// representable in the band's type without loss.
pub trait GdalType: Copy + PartialEq + PartialOrd + 'static {
    fn gdal_type() -> GDALDataType::Type;

    /// Converts `value` if it is representable exactly.
    fn from_f64_exact(value: f64) -> Option<Self>;

    /// Converts `value` if it is representable exactly.
    fn from_i128_exact(value: i128) -> Option<Self>;

    fn to_f64_lossy(self) -> f64;
}

macro_rules! impl_integer_gdal_type {
    ($($ty:ty => $code:ident),* $(,)?) => {
        $(
            impl GdalType for $ty {
                fn gdal_type() -> GDALDataType::Type {
                    GDALDataType::$code
                }

                fn from_f64_exact(value: f64) -> Option<Self> {
                    if !value.is_finite() || value.fract() != 0.0 {
                        return None;
                    }
                    if value < <$ty>::MIN as f64 || value > <$ty>::MAX as f64 {
                        return None;
                    }
                    Self::from_i128_exact(value as i128)
                }

                fn from_i128_exact(value: i128) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }

                fn to_f64_lossy(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

macro_rules! impl_float_gdal_type {
    ($($ty:ty => $code:ident),* $(,)?) => {
        $(
            impl GdalType for $ty {
                fn gdal_type() -> GDALDataType::Type {
                    GDALDataType::$code
                }

                fn from_f64_exact(value: f64) -> Option<Self> {
                    let cast = value as $ty;
                    (cast as f64 == value).then_some(cast)
                }

                fn from_i128_exact(value: i128) -> Option<Self> {
                    let cast = value as $ty;
                    (cast as i128 == value).then_some(cast)
                }

                fn to_f64_lossy(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_integer_gdal_type!(
    u8 => GDT_Byte,
    u16 => GDT_UInt16,
    i16 => GDT_Int16,
    u32 => GDT_UInt32,
    i32 => GDT_Int32,
);

#[cfg(gdal_has_int8)]
impl_integer_gdal_type!(i8 => GDT_Int8);

#[cfg(gdal_has_int64)]
impl_integer_gdal_type!(u64 => GDT_UInt64, i64 => GDT_Int64);

impl_float_gdal_type!(f32 => GDT_Float32, f64 => GDT_Float64);

/// A band no-data value in the representation GDAL stores for the band type.
///
/// 64-bit integer bands keep their sentinel outside of `f64` because values
/// such as `u64::MAX` don't survive the round trip through a double.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoDataValue {
    Float(f64),
    Int(i64),
    UInt(u64),
}

impl NoDataValue {
    /// The value as a double, exact for all but the largest 64-bit integers.
    pub fn as_f64(&self) -> f64 {
        match *self {
            NoDataValue::Float(v) => v,
            NoDataValue::Int(v) => v as f64,
            NoDataValue::UInt(v) => v as f64,
        }
    }

    /// Converts the sentinel into a pixel value of type `T`, if representable.
    pub fn cast<T: GdalType>(&self) -> Option<T> {
        match *self {
            NoDataValue::Float(v) => T::from_f64_exact(v),
            NoDataValue::Int(v) => T::from_i128_exact(v as i128),
            NoDataValue::UInt(v) => T::from_i128_exact(v as i128),
        }
    }

    /// Numeric equality across representations.
    pub fn same_value(&self, other: &NoDataValue) -> bool {
        match (*self, *other) {
            (NoDataValue::Int(a), NoDataValue::Int(b)) => a == b,
            (NoDataValue::UInt(a), NoDataValue::UInt(b)) => a == b,
            (NoDataValue::Int(a), NoDataValue::UInt(b))
            | (NoDataValue::UInt(b), NoDataValue::Int(a)) => a as i128 == b as i128,
            (NoDataValue::Float(a), other) | (other, NoDataValue::Float(a)) => match other {
                NoDataValue::Float(b) => a == b,
                NoDataValue::Int(b) => a.fract() == 0.0 && a == b as f64 && i64::from_f64(a) == Some(b),
                NoDataValue::UInt(b) => a.fract() == 0.0 && a == b as f64 && u64::from_f64(a) == Some(b),
            },
        }
    }
}

impl Display for NoDataValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NoDataValue::Float(v) => write!(f, "{v}"),
            NoDataValue::Int(v) => write!(f, "{v}"),
            NoDataValue::UInt(v) => write!(f, "{v}"),
        }
    }
}

trait FromF64Checked: Sized {
    fn from_f64(value: f64) -> Option<Self>;
}

impl FromF64Checked for i64 {
    fn from_f64(value: f64) -> Option<Self> {
        // 2^63 is exactly representable; anything at or above it overflows.
        (value >= -9_223_372_036_854_775_808.0 && value < 9_223_372_036_854_775_808.0)
            .then_some(value as i64)
    }
}

impl FromF64Checked for u64 {
    fn from_f64(value: f64) -> Option<Self> {
        (value >= 0.0 && value < 18_446_744_073_709_551_616.0).then_some(value as u64)
    }
}

/// The GDAL name of a data type (`Byte`, `Int16`, `Float32`, ...).
pub fn data_type_name(data_type: GDALDataType::Type) -> String {
    _string(unsafe { GDALGetDataTypeName(data_type) }).unwrap_or_else(|| "Unknown".to_string())
}
