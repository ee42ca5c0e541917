//! Typed access to tensor storage.

use std::fmt::Debug;

use half::{bf16, f16};

use crate::dtype::DType;
use crate::storage::StorageData;

/// A scalar type that can back a tensor.
///
/// Conversions go through f32, the accumulation type of every kernel.
pub trait Element: Copy + Default + Debug + PartialEq + Send + Sync + 'static {
    const DTYPE: DType;

    fn to_f32(self) -> f32;

    fn from_f32(v: f32) -> Self;

    /// Borrow the storage as `&[Self]` if it holds this type.
    fn view(data: &StorageData) -> Option<&[Self]>;

    fn into_data(values: Vec<Self>) -> StorageData;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, |$x:ident| $to:expr, |$v:ident| $from:expr) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            #[inline(always)]
            fn to_f32(self) -> f32 {
                let $x = self;
                $to
            }

            #[inline(always)]
            fn from_f32($v: f32) -> Self {
                $from
            }

            fn view(data: &StorageData) -> Option<&[Self]> {
                match data {
                    StorageData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn into_data(values: Vec<Self>) -> StorageData {
                StorageData::$variant(values)
            }
        }
    };
}

impl_element!(f32, F32, |x| x, |v| v);
impl_element!(f64, F64, |x| x as f32, |v| v as f64);
impl_element!(f16, F16, |x| x.to_f32(), |v| f16::from_f32(v));
impl_element!(bf16, BF16, |x| x.to_f32(), |v| bf16::from_f32(v));
