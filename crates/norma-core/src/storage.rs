use std::sync::Arc;

use half::{bf16, f16};

use crate::{DType, Device, Element};

/// Typed element buffer behind a tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageData {
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl StorageData {
    fn len(&self) -> usize {
        match self {
            StorageData::F16(v) => v.len(),
            StorageData::BF16(v) => v.len(),
            StorageData::F32(v) => v.len(),
            StorageData::F64(v) => v.len(),
        }
    }
}

/// Shared, reference-counted tensor storage.
///
/// Storage is reference-counted (`Arc`) so multiple tensors can share the same
/// underlying data (e.g. a transposed view and its source).
#[derive(Debug, Clone)]
pub struct Storage {
    data: Arc<StorageData>,
    device: Device,
}

impl Storage {
    /// Wrap an owned vector as host storage.
    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        Self {
            data: Arc::new(T::into_data(values)),
            device: Device::Cpu,
        }
    }

    /// Create storage from a slice of f32 values.
    pub fn from_f32(data: &[f32]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// Allocate zero-filled host storage for `numel` elements.
    pub fn zeros(dtype: DType, numel: usize) -> Self {
        let data = match dtype {
            DType::F16 => StorageData::F16(vec![f16::ZERO; numel]),
            DType::BF16 => StorageData::BF16(vec![bf16::ZERO; numel]),
            DType::F32 => StorageData::F32(vec![0.0; numel]),
            DType::F64 => StorageData::F64(vec![0.0; numel]),
        };
        Self {
            data: Arc::new(data),
            device: Device::Cpu,
        }
    }

    /// Re-tag the residency of this storage.
    ///
    /// No data moves. Host bindings that stage accelerator buffers in host
    /// memory use this to record where the buffer logically lives.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn dtype(&self) -> DType {
        match self.data.as_ref() {
            StorageData::F16(_) => DType::F16,
            StorageData::BF16(_) => DType::BF16,
            StorageData::F32(_) => DType::F32,
            StorageData::F64(_) => DType::F64,
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Number of physical elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Borrow the elements as `&[T]`, or `None` if `T` is not the stored type.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::view(&self.data)
    }

    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        self.as_slice::<f32>()
    }

    /// Read the element at physical index `idx`, widened to f32.
    pub fn get_f32(&self, idx: usize) -> Option<f32> {
        match self.data.as_ref() {
            StorageData::F16(v) => v.get(idx).map(|x| x.to_f32()),
            StorageData::BF16(v) => v.get(idx).map(|x| x.to_f32()),
            StorageData::F32(v) => v.get(idx).copied(),
            StorageData::F64(v) => v.get(idx).map(|&x| x as f32),
        }
    }
}
