use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

use crate::dtype::DType;
use crate::device::Device;
use crate::element::Element;
use crate::error::NormaError;
use crate::shape::Shape;
use crate::storage::Storage;
use crate::Result;

/// A multi-dimensional array as seen by the norma kernels.
///
/// Tensors are row-major over reference-counted storage. A tensor may be a
/// strided view of another (see [`Tensor::transpose`]); the kernels only
/// accept tensors whose elements are in row-major order and report any
/// other view as a precondition violation instead of copying it.
///
/// # Examples
///
/// ```
/// use norma_core::Tensor;
///
/// let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
/// assert_eq!(t.shape().dims(), &[2, 2]);
/// assert!(t.is_contiguous());
///
/// let view = t.transpose().unwrap();
/// assert!(!view.is_contiguous());
/// assert_eq!(view.to_f32_vec(), vec![1.0, 3.0, 2.0, 4.0]);
/// ```
#[derive(Clone)]
pub struct Tensor {
    storage: Storage,
    shape: Shape,
    strides: SmallVec<[usize; 4]>,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a contiguous tensor that takes ownership of `data`.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        Self::from_storage(Storage::from_vec(data), shape)
    }

    /// Create a tensor from f32 data with the given shape.
    ///
    /// # Panics
    /// Panics if `data.len()` does not match the element count of `shape`.
    pub fn from_f32(data: &[f32], shape: &[usize]) -> Self {
        let s = Shape::new(shape);
        assert_eq!(
            s.numel(),
            data.len(),
            "Shape {:?} requires {} elements, got {}",
            shape,
            s.numel(),
            data.len()
        );
        let strides = s.contiguous_strides();
        Self {
            storage: Storage::from_f32(data),
            shape: s,
            strides,
        }
    }

    /// Create a tensor from pre-built storage and a shape.
    pub fn from_storage(storage: Storage, shape: &[usize]) -> Result<Self> {
        let s = Shape::new(shape);
        if s.numel() != storage.numel() {
            return Err(NormaError::StorageError(format!(
                "Shape {:?} requires {} elements, got {}",
                shape,
                s.numel(),
                storage.numel()
            )));
        }
        let strides = s.contiguous_strides();
        Ok(Self {
            storage,
            shape: s,
            strides,
        })
    }

    /// Create a tensor of zeros with the given shape and dtype.
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        let s = Shape::new(shape);
        let strides = s.contiguous_strides();
        Self {
            storage: Storage::zeros(dtype, s.numel()),
            shape: s,
            strides,
        }
    }

    /// Create a tensor of ones (f32).
    pub fn ones(shape: &[usize]) -> Self {
        let numel = Shape::new(shape).numel();
        Self::from_f32(&vec![1.0; numel], shape)
    }

    /// Create an f32 tensor filled with samples from N(0, 1).
    ///
    /// The same `seed` always yields the same values.
    pub fn randn(shape: &[usize], seed: u64) -> Self {
        let numel = Shape::new(shape).numel();
        let mut rng = StdRng::seed_from_u64(seed);
        // Box-Muller transform for normal distribution
        let data: Vec<f32> = (0..numel)
            .map(|_| {
                let u1: f32 = rng.gen_range(1e-7f32..1.0f32);
                let u2: f32 = rng.gen_range(0.0f32..std::f32::consts::TAU);
                (-2.0 * u1.ln()).sqrt() * u2.cos()
            })
            .collect();
        Self::from_f32(&data, shape)
    }

    /// Create an f32 tensor uniformly distributed in `[low, high)`.
    pub fn rand_uniform(shape: &[usize], low: f32, high: f32, seed: u64) -> Self {
        let numel = Shape::new(shape).numel();
        let mut rng = StdRng::seed_from_u64(seed);
        let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(low..high)).collect();
        Self::from_f32(&data, shape)
    }

    /// Convert to another element type, rounding through f32.
    pub fn cast<T: Element>(&self) -> Tensor {
        let data: Vec<T> = self.to_f32_vec().into_iter().map(T::from_f32).collect();
        let strides = self.shape.contiguous_strides();
        Tensor {
            storage: Storage::from_vec(data).with_device(self.device()),
            shape: self.shape.clone(),
            strides,
        }
    }

    /// Re-tag the device this tensor's storage resides on. No data moves.
    pub fn with_device(mut self, device: Device) -> Self {
        self.storage = self.storage.with_device(device);
        self
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Shape of the tensor.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn device(&self) -> Device {
        self.storage.device()
    }

    /// Whether the elements sit in storage in row-major order.
    ///
    /// Strides of size-1 dimensions never move the index, so they are
    /// ignored; an empty tensor is always contiguous.
    pub fn is_contiguous(&self) -> bool {
        if self.numel() == 0 {
            return true;
        }
        let expected = self.shape.contiguous_strides();
        self.shape
            .dims()
            .iter()
            .zip(self.strides.iter().zip(&expected))
            .all(|(&d, (s, e))| d == 1 || s == e)
    }

    // =========================================================================
    // Data access
    // =========================================================================

    /// Borrow the elements as `&[T]` (contiguous tensors of dtype `T` only).
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        if !self.is_contiguous() {
            return None;
        }
        self.storage.as_slice::<T>()
    }

    /// Get the underlying f32 data as a slice (contiguous tensors only).
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        self.as_slice::<f32>()
    }

    /// Get a single element by logical flat index, widened to f32.
    pub fn get_f32(&self, flat_index: usize) -> Option<f32> {
        let physical = self.flat_to_physical(flat_index)?;
        self.storage.get_f32(physical)
    }

    /// Copy every element, in logical row-major order, widened to f32.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        (0..self.numel())
            .filter_map(|i| self.get_f32(i))
            .collect()
    }

    /// Convert a logical flat index to a physical storage index.
    fn flat_to_physical(&self, flat_index: usize) -> Option<usize> {
        if self.shape.is_scalar() {
            return (flat_index == 0).then_some(0);
        }

        if flat_index >= self.numel() {
            return None;
        }

        let mut remaining = flat_index;
        let mut physical = 0;
        let contiguous_strides = self.shape.contiguous_strides();

        for (i, &cs) in contiguous_strides.iter().enumerate() {
            let idx = remaining / cs;
            remaining %= cs;
            physical += idx * self.strides[i];
        }

        Some(physical)
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Transpose the last two dimensions (zero-copy view).
    pub fn transpose(&self) -> Result<Tensor> {
        let new_shape = self.shape.transpose().ok_or(NormaError::InvalidAxis {
            axis: 1,
            ndim: self.ndim(),
        })?;

        let ndim = self.ndim();
        let mut new_strides = self.strides.clone();
        new_strides.swap(ndim - 2, ndim - 1);

        Ok(Tensor {
            storage: self.storage.clone(),
            shape: new_shape,
            strides: new_strides,
        })
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, device={}, contiguous={})",
            self.shape,
            self.dtype(),
            self.device(),
            self.is_contiguous(),
        )
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.numel();
        if n <= 20 {
            write!(f, "tensor({:?}, shape={})", self.to_f32_vec(), self.shape)
        } else {
            let first = self.get_f32(0).unwrap_or(f32::NAN);
            let second = self.get_f32(1).unwrap_or(f32::NAN);
            let last = self.get_f32(n - 1).unwrap_or(f32::NAN);
            write!(
                f,
                "tensor([{first:.4}, {second:.4}, ..., {last:.4}], shape={}, dtype={})",
                self.shape,
                self.dtype()
            )
        }
    }
}
