//! Layer Normalization handle.
//!
//! Bundles a normalized shape with a [`LayerNormConfig`] so callers that
//! apply the same normalization repeatedly don't thread both through every
//! call. Parameters stay with the caller: `gamma` / `beta` are passed per
//! call, and the forward statistics are handed back to `backward`.

use std::path::Path;

use norma_core::{Result, Tensor};

use crate::backward::{backward_with_config, BackwardOutput};
use crate::config::LayerNormConfig;
use crate::decompose::{decompose, Decomposition};
use crate::forward::{forward_with_config, ForwardOutput};

/// Layer normalization over a fixed set of trailing dimensions.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    normalized_shape: Vec<usize>,
    config: LayerNormConfig,
}

impl LayerNorm {
    /// Create a new LayerNorm over `normalized_shape` with the given epsilon.
    pub fn new(normalized_shape: &[usize], eps: f64) -> Self {
        Self::from_config(normalized_shape, LayerNormConfig::with_epsilon(eps))
    }

    /// Create with default eps (1e-5).
    pub fn default_new(normalized_shape: &[usize]) -> Self {
        Self::from_config(normalized_shape, LayerNormConfig::default())
    }

    pub fn from_config(normalized_shape: &[usize], config: LayerNormConfig) -> Self {
        Self {
            normalized_shape: normalized_shape.to_vec(),
            config,
        }
    }

    /// Load the config from a JSON file.
    pub fn from_config_file(normalized_shape: &[usize], path: &Path) -> Result<Self> {
        Ok(Self::from_config(
            normalized_shape,
            LayerNormConfig::from_json_file(path)?,
        ))
    }

    pub fn normalized_shape(&self) -> &[usize] {
        &self.normalized_shape
    }

    pub fn eps(&self) -> f64 {
        self.config.epsilon
    }

    pub fn config(&self) -> &LayerNormConfig {
        &self.config
    }

    /// `(n1, n2)` this layer would use for `input`.
    pub fn decompose(&self, input: &Tensor) -> Result<Decomposition> {
        decompose(input.shape(), &self.normalized_shape)
    }

    pub fn forward(
        &self,
        input: &Tensor,
        gamma: Option<&Tensor>,
        beta: Option<&Tensor>,
    ) -> Result<ForwardOutput> {
        forward_with_config(
            input,
            &self.normalized_shape,
            gamma,
            beta,
            self.config.epsilon,
            &self.config,
        )
    }

    /// Gradients for a previous `forward(input, gamma, beta)` that returned
    /// `saved`.
    pub fn backward(
        &self,
        dout: &Tensor,
        saved: &ForwardOutput,
        input: &Tensor,
        gamma: Option<&Tensor>,
        beta: Option<&Tensor>,
    ) -> Result<BackwardOutput> {
        backward_with_config(
            dout,
            &saved.mean,
            &saved.invvar,
            input,
            &self.normalized_shape,
            gamma,
            beta,
            self.config.epsilon,
            &self.config,
        )
    }
}
