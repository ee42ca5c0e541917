//! Backward layer normalization.
//!
//! With `dy_j = dout_j * gamma_j` and the saved `mean_i` / `invvar_i`, each
//! instance needs two row sums before any gradient element is known:
//!
//! ```text
//! S1 = sum_j dy_j
//! S2 = sum_j dy_j * (x_j - mean_i)
//! dx_j = invvar_i * (dy_j - S1 / n2 - (x_j - mean_i) * invvar_i^2 * S2 / n2)
//! ```
//!
//! The parameter gradients sum over instances instead of within them and
//! are handled by the two-phase reduction in `reduce`.

use rayon::prelude::*;

use norma_core::{bf16, f16, DType, Element, NormaError, Result, Tensor};

use crate::affine::{with_affine_variant, AffineParams, AffineVariant};
use crate::config::{validate_epsilon, LayerNormConfig};
use crate::decompose::{decompose, Decomposition};
use crate::precondition::{check_input, check_like_input, check_stats};
use crate::reduce::{affine_grads, ParamGrads};

/// Result of a backward call.
#[derive(Debug, Clone)]
pub struct BackwardOutput {
    /// Same shape and dtype as the input.
    pub grad_input: Tensor,
    /// Present iff `gamma` was passed; same shape as `gamma`.
    pub grad_gamma: Option<Tensor>,
    /// Present iff `beta` was passed; same shape as `beta`.
    pub grad_beta: Option<Tensor>,
}

/// Gradients of a forward call with the default [`LayerNormConfig`].
///
/// `mean` and `invvar` must be the statistics that forward returned for the
/// same `input`, and `gamma` / `beta` must be passed exactly when they were
/// passed to forward. `epsilon` is checked but otherwise unused: the saved
/// `invvar` already includes it.
#[allow(clippy::too_many_arguments)]
pub fn backward(
    dout: &Tensor,
    mean: &Tensor,
    invvar: &Tensor,
    input: &Tensor,
    normalized_shape: &[usize],
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
    epsilon: f64,
) -> Result<BackwardOutput> {
    backward_with_config(
        dout,
        mean,
        invvar,
        input,
        normalized_shape,
        gamma,
        beta,
        epsilon,
        &LayerNormConfig::default(),
    )
}

#[allow(clippy::too_many_arguments)]
pub fn backward_with_config(
    dout: &Tensor,
    mean: &Tensor,
    invvar: &Tensor,
    input: &Tensor,
    normalized_shape: &[usize],
    gamma: Option<&Tensor>,
    beta: Option<&Tensor>,
    epsilon: f64,
    config: &LayerNormConfig,
) -> Result<BackwardOutput> {
    let dims = decompose(input.shape(), normalized_shape)?;
    check_input(input)?;
    check_like_input("dout", dout, input)?;
    check_stats("mean", mean, input, dims.n1())?;
    check_stats("invvar", invvar, input, dims.n1())?;
    validate_epsilon(epsilon)?;
    config.validate()?;
    let affine = AffineParams::resolve(gamma, beta, input, normalized_shape, dims)?;

    tracing::debug!(
        n1 = dims.n1(),
        n2 = dims.n2(),
        dtype = %input.dtype(),
        affine = %affine.mode,
        "layer_norm backward"
    );

    let saved = SavedStats {
        mean: stats_slice("mean", mean)?,
        invvar: stats_slice("invvar", invvar)?,
    };
    let (grad_input, sums) = match input.dtype() {
        DType::F32 => backward_typed::<f32>(dout, input, &saved, &affine, dims, config)?,
        DType::F16 => backward_typed::<f16>(dout, input, &saved, &affine, dims, config)?,
        DType::BF16 => backward_typed::<bf16>(dout, input, &saved, &affine, dims, config)?,
        other => return Err(NormaError::UnsupportedDType(other)),
    };

    Ok(BackwardOutput {
        grad_input,
        grad_gamma: gamma
            .map(|g| param_grad(sums.gamma, g, input.dtype()))
            .transpose()?,
        grad_beta: beta
            .map(|b| param_grad(sums.beta, b, input.dtype()))
            .transpose()?,
    })
}

struct SavedStats<'a> {
    mean: &'a [f32],
    invvar: &'a [f32],
}

fn stats_slice<'a>(name: &str, t: &'a Tensor) -> Result<&'a [f32]> {
    t.as_f32_slice()
        .ok_or_else(|| NormaError::precondition(format!("{name} must be a contiguous f32 tensor")))
}

fn backward_typed<T: Element>(
    dout: &Tensor,
    input: &Tensor,
    saved: &SavedStats<'_>,
    affine: &AffineParams,
    dims: Decomposition,
    config: &LayerNormConfig,
) -> Result<(Tensor, ParamGrads)> {
    let x = input
        .as_slice::<T>()
        .ok_or(NormaError::UnsupportedDType(input.dtype()))?;
    let dy = dout
        .as_slice::<T>()
        .ok_or(NormaError::UnsupportedDType(dout.dtype()))?;

    let mut gx = vec![T::default(); x.len()];
    let sums = with_affine_variant!(affine.mode, |V| {
        input_grad_rows::<T, V>(x, dy, saved, &affine.gamma, &mut gx, dims.n2(), config);
        affine_grads::<T, V>(x, dy, saved.mean, saved.invvar, dims.n2(), config)
    });

    Ok((Tensor::from_vec(gx, input.shape().dims())?, sums))
}

fn input_grad_rows<T: Element, V: AffineVariant>(
    x: &[T],
    dout: &[T],
    saved: &SavedStats<'_>,
    gamma: &[f32],
    gx: &mut [T],
    n2: usize,
    config: &LayerNormConfig,
) {
    let row = |(i, out): (usize, &mut [T])| {
        let r = i * n2..(i + 1) * n2;
        input_grad_row::<T, V>(
            &x[r.clone()],
            &dout[r],
            gamma,
            saved.mean[i],
            saved.invvar[i],
            out,
        );
    };

    if config.use_parallel(x.len()) {
        tracing::trace!(rows = saved.mean.len(), "backward: rayon over instances");
        gx.par_chunks_mut(n2).enumerate().for_each(row);
    } else {
        gx.chunks_mut(n2).enumerate().for_each(row);
    }
}

#[inline]
fn input_grad_row<T: Element, V: AffineVariant>(
    x: &[T],
    dout: &[T],
    gamma: &[f32],
    mean: f32,
    invvar: f32,
    gx: &mut [T],
) {
    let n = x.len() as f32;

    // Phase 1: row sums.
    let mut s1 = 0.0f32;
    let mut s2 = 0.0f32;
    for (j, (xj, dj)) in x.iter().zip(dout).enumerate() {
        let dy = dj.to_f32() * V::scale(gamma, j);
        s1 += dy;
        s2 += dy * (xj.to_f32() - mean);
    }

    // Phase 2: per-element gradient.
    let c1 = s1 / n;
    let c2 = invvar * invvar * s2 / n;
    for (j, ((o, xj), dj)) in gx.iter_mut().zip(x).zip(dout).enumerate() {
        let dy = dj.to_f32() * V::scale(gamma, j);
        *o = T::from_f32(invvar * (dy - c1 - (xj.to_f32() - mean) * c2));
    }
}

/// Round an f32 parameter gradient to the input dtype, shaped like the
/// parameter.
fn param_grad(values: Vec<f32>, param: &Tensor, dtype: DType) -> Result<Tensor> {
    let dims = param.shape().dims();
    match dtype {
        DType::F32 => Tensor::from_vec(values, dims),
        DType::F16 => Tensor::from_vec(values.into_iter().map(f16::from_f32).collect(), dims),
        DType::BF16 => Tensor::from_vec(values.into_iter().map(bf16::from_f32).collect(), dims),
        other => Err(NormaError::UnsupportedDType(other)),
    }
}
