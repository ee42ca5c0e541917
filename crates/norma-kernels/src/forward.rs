//! Forward layer normalization.
//!
//! For every instance `i` (a contiguous run of `n2` elements):
//!
//! ```text
//! mean_i   = sum(x) / n2
//! invvar_i = 1 / sqrt(sum((x - mean_i)^2) / n2 + eps)
//! y_j      = (x_j - mean_i) * invvar_i * gamma_j + beta_j
//! ```
//!
//! Statistics are always f32 and are returned so the backward pass can
//! reuse them.

use rayon::prelude::*;

use norma_core::{bf16, f16, DType, Element, NormaError, Result, Tensor};

use crate::affine::{with_affine_variant, AffineParams, AffineVariant};
use crate::config::{validate_epsilon, LayerNormConfig, VarianceMode};
use crate::decompose::{decompose, Decomposition};
use crate::precondition::check_input;
use crate::stats::{row_stats, RowStats};

/// Result of a forward call.
#[derive(Debug, Clone)]
pub struct ForwardOutput {
    /// Same shape and dtype as the input.
    pub output: Tensor,
    /// `[n1]` f32 per-instance means.
    pub mean: Tensor,
    /// `[n1]` f32 per-instance `1 / sqrt(var + eps)`.
    pub invvar: Tensor,
}

/// Layer norm over the trailing `normalized_shape` dimensions of `input`
/// with the default [`LayerNormConfig`].
pub fn forward(
    input: &Tensor,
    normalized_shape: &[usize],
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
    epsilon: f64,
) -> Result<ForwardOutput> {
    forward_with_config(
        input,
        normalized_shape,
        gamma,
        beta,
        epsilon,
        &LayerNormConfig::default(),
    )
}

/// Layer norm with explicit tuning. `config.epsilon` is not consulted; the
/// `epsilon` argument wins.
pub fn forward_with_config(
    input: &Tensor,
    normalized_shape: &[usize],
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
    epsilon: f64,
    config: &LayerNormConfig,
) -> Result<ForwardOutput> {
    let dims = decompose(input.shape(), normalized_shape)?;
    check_input(input)?;
    validate_epsilon(epsilon)?;
    config.validate()?;
    let affine = AffineParams::resolve(gamma, beta, input, normalized_shape, dims)?;

    tracing::debug!(
        n1 = dims.n1(),
        n2 = dims.n2(),
        dtype = %input.dtype(),
        affine = %affine.mode,
        "layer_norm forward"
    );

    let eps = epsilon as f32;
    match input.dtype() {
        DType::F32 => forward_typed::<f32>(input, dims, &affine, eps, config),
        DType::F16 => forward_typed::<f16>(input, dims, &affine, eps, config),
        DType::BF16 => forward_typed::<bf16>(input, dims, &affine, eps, config),
        other => Err(NormaError::UnsupportedDType(other)),
    }
}

fn forward_typed<T: Element>(
    input: &Tensor,
    dims: Decomposition,
    affine: &AffineParams,
    eps: f32,
    config: &LayerNormConfig,
) -> Result<ForwardOutput> {
    let x = input
        .as_slice::<T>()
        .ok_or(NormaError::UnsupportedDType(input.dtype()))?;

    let mut out = vec![T::default(); x.len()];
    let mut mean = vec![0.0f32; dims.n1()];
    let mut invvar = vec![0.0f32; dims.n1()];

    with_affine_variant!(affine.mode, |V| normalize_rows::<T, V>(
        x,
        &mut out,
        &mut mean,
        &mut invvar,
        affine,
        dims.n2(),
        eps,
        config,
    ));

    Ok(ForwardOutput {
        output: Tensor::from_vec(out, input.shape().dims())?,
        mean: Tensor::from_vec(mean, &[dims.n1()])?,
        invvar: Tensor::from_vec(invvar, &[dims.n1()])?,
    })
}

#[allow(clippy::too_many_arguments)]
fn normalize_rows<T: Element, V: AffineVariant>(
    x: &[T],
    out: &mut [T],
    mean: &mut [f32],
    invvar: &mut [f32],
    affine: &AffineParams,
    n2: usize,
    eps: f32,
    config: &LayerNormConfig,
) {
    let (gamma, beta, mode) = (&affine.gamma[..], &affine.beta[..], config.variance);

    if config.use_parallel(x.len()) {
        tracing::trace!(rows = mean.len(), "forward: rayon over instances");
        x.par_chunks(n2)
            .zip(out.par_chunks_mut(n2))
            .zip(mean.par_iter_mut().zip(invvar.par_iter_mut()))
            .for_each(|((x_row, out_row), (m, iv))| {
                let s = normalize_row::<T, V>(x_row, out_row, gamma, beta, mode, eps);
                *m = s.mean;
                *iv = s.invvar;
            });
    } else {
        x.chunks(n2)
            .zip(out.chunks_mut(n2))
            .zip(mean.iter_mut().zip(invvar.iter_mut()))
            .for_each(|((x_row, out_row), (m, iv))| {
                let s = normalize_row::<T, V>(x_row, out_row, gamma, beta, mode, eps);
                *m = s.mean;
                *iv = s.invvar;
            });
    }
}

#[inline]
fn normalize_row<T: Element, V: AffineVariant>(
    x: &[T],
    out: &mut [T],
    gamma: &[f32],
    beta: &[f32],
    mode: VarianceMode,
    eps: f32,
) -> RowStats {
    let stats = row_stats(x, mode, eps);
    for (j, (o, xj)) in out.iter_mut().zip(x).enumerate() {
        let normalized = (xj.to_f32() - stats.mean) * stats.invvar;
        *o = T::from_f32(normalized * V::scale(gamma, j) + V::shift(beta, j));
    }
    stats
}
