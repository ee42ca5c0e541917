//! # norma-kernels
//!
//! CPU layer normalization kernels.
//!
//! Provides:
//! - Shape decomposition of an input into `n1` instances of `n2` elements
//! - Forward normalization with per-instance mean / inverse std statistics
//! - Backward pass for the input and the optional affine parameters, with a
//!   two-phase partial-sum reduction for the parameter gradients
//! - Four monomorphized affine variants (none, shift, scale, both) selected
//!   once per call
//! - Rayon parallelism across instances above a configurable size

pub mod config;
pub mod decompose;
pub mod stats;
pub mod affine;
mod precondition;
pub mod forward;
pub mod backward;
mod reduce;
pub mod dispatch;
pub mod layer_norm;

pub use config::{LayerNormConfig, VarianceMode};
pub use decompose::{decompose, Decomposition};
pub use affine::AffineMode;
pub use forward::{forward, forward_with_config, ForwardOutput};
pub use backward::{backward, backward_with_config, BackwardOutput};
pub use dispatch::{
    backward_none_affine, backward_with_bias_affine, backward_with_both_affine,
    backward_with_weight_affine, forward_none_affine, forward_with_bias_affine,
    forward_with_both_affine, forward_with_weight_affine,
};
pub use layer_norm::LayerNorm;
