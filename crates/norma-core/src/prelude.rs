//! Convenience re-exports for common norma-core types.
//!
//! ```rust
//! use norma_core::prelude::*;
//! ```

pub use crate::Tensor;
pub use crate::DType;
pub use crate::Device;
pub use crate::Element;
pub use crate::Shape;
pub use crate::NormaError;
pub use crate::Result;
