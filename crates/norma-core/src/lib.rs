//! # norma-core
//!
//! Array surface for the norma layer normalization kernels.
//!
//! Provides the minimal `Tensor` type the kernels consume and produce:
//! - Float dtypes (F16, BF16, F32, F64) behind the `Element` trait
//! - Row-major storage with zero-copy strided views (transpose)
//! - A device residency tag so callers can detect misplaced operands
//! - The shared `NormaError` error type

pub mod dtype;
pub mod element;
pub mod device;
pub mod storage;
pub mod shape;
pub mod tensor;
pub mod error;
pub mod prelude;

pub use dtype::DType;
pub use element::Element;
pub use device::Device;
pub use storage::Storage;
pub use shape::Shape;
pub use tensor::Tensor;
pub use error::NormaError;

pub use half::{bf16, f16};

pub type Result<T> = std::result::Result<T, NormaError>;
