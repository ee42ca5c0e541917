//! Named entry points, one per affine combination.
//!
//! These mirror the way host frameworks usually bind the kernel: instead of
//! passing optional parameters, the caller picks the entry point whose
//! signature matches the parameters it has. Each one forwards to the
//! generic [`forward`] / [`backward`], which resolve the variant once.

use norma_core::{Result, Tensor};

use crate::backward::{backward, BackwardOutput};
use crate::forward::{forward, ForwardOutput};

pub fn forward_none_affine(
    input: &Tensor,
    normalized_shape: &[usize],
    epsilon: f64,
) -> Result<ForwardOutput> {
    forward(input, normalized_shape, None, None, epsilon)
}

/// Normalize, then add `beta`.
pub fn forward_with_bias_affine(
    input: &Tensor,
    normalized_shape: &[usize],
    beta: &Tensor,
    epsilon: f64,
) -> Result<ForwardOutput> {
    forward(input, normalized_shape, None, Some(beta), epsilon)
}

/// Normalize, then scale by `gamma`.
pub fn forward_with_weight_affine(
    input: &Tensor,
    normalized_shape: &[usize],
    gamma: &Tensor,
    epsilon: f64,
) -> Result<ForwardOutput> {
    forward(input, normalized_shape, Some(gamma), None, epsilon)
}

pub fn forward_with_both_affine(
    input: &Tensor,
    normalized_shape: &[usize],
    gamma: &Tensor,
    beta: &Tensor,
    epsilon: f64,
) -> Result<ForwardOutput> {
    forward(input, normalized_shape, Some(gamma), Some(beta), epsilon)
}

/// Only `grad_input` is produced.
pub fn backward_none_affine(
    dout: &Tensor,
    mean: &Tensor,
    invvar: &Tensor,
    input: &Tensor,
    normalized_shape: &[usize],
    epsilon: f64,
) -> Result<BackwardOutput> {
    backward(dout, mean, invvar, input, normalized_shape, None, None, epsilon)
}

/// Produces `grad_input` and `grad_beta`.
pub fn backward_with_bias_affine(
    dout: &Tensor,
    mean: &Tensor,
    invvar: &Tensor,
    input: &Tensor,
    normalized_shape: &[usize],
    beta: &Tensor,
    epsilon: f64,
) -> Result<BackwardOutput> {
    backward(dout, mean, invvar, input, normalized_shape, None, Some(beta), epsilon)
}

/// Produces `grad_input` and `grad_gamma`.
pub fn backward_with_weight_affine(
    dout: &Tensor,
    mean: &Tensor,
    invvar: &Tensor,
    input: &Tensor,
    normalized_shape: &[usize],
    gamma: &Tensor,
    epsilon: f64,
) -> Result<BackwardOutput> {
    backward(dout, mean, invvar, input, normalized_shape, Some(gamma), None, epsilon)
}

#[allow(clippy::too_many_arguments)]
pub fn backward_with_both_affine(
    dout: &Tensor,
    mean: &Tensor,
    invvar: &Tensor,
    input: &Tensor,
    normalized_shape: &[usize],
    gamma: &Tensor,
    beta: &Tensor,
    epsilon: f64,
) -> Result<BackwardOutput> {
    backward(dout, mean, invvar, input, normalized_shape, Some(gamma), Some(beta), epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_points_produce_matching_grads() {
        let input = Tensor::randn(&[8, 6], 21);
        let gamma = Tensor::randn(&[6], 22);
        let beta = Tensor::randn(&[6], 23);
        let dout = Tensor::randn(&[8, 6], 24);
        let ns = [6];

        let f = forward_none_affine(&input, &ns, 1e-5).unwrap();
        let g = backward_none_affine(&dout, &f.mean, &f.invvar, &input, &ns, 1e-5).unwrap();
        assert!(g.grad_gamma.is_none() && g.grad_beta.is_none());

        let f = forward_with_bias_affine(&input, &ns, &beta, 1e-5).unwrap();
        let g = backward_with_bias_affine(&dout, &f.mean, &f.invvar, &input, &ns, &beta, 1e-5)
            .unwrap();
        assert!(g.grad_gamma.is_none() && g.grad_beta.is_some());

        let f = forward_with_weight_affine(&input, &ns, &gamma, 1e-5).unwrap();
        let g = backward_with_weight_affine(&dout, &f.mean, &f.invvar, &input, &ns, &gamma, 1e-5)
            .unwrap();
        assert!(g.grad_gamma.is_some() && g.grad_beta.is_none());

        let f = forward_with_both_affine(&input, &ns, &gamma, &beta, 1e-5).unwrap();
        let g = backward_with_both_affine(
            &dout, &f.mean, &f.invvar, &input, &ns, &gamma, &beta, 1e-5,
        )
        .unwrap();
        assert!(g.grad_gamma.is_some() && g.grad_beta.is_some());
    }

    #[test]
    fn test_bias_only_shifts_output() {
        let input = Tensor::randn(&[4, 5], 31);
        let beta = Tensor::from_f32(&[1.0, -1.0, 0.5, 0.0, 2.0], &[5]);
        let plain = forward_none_affine(&input, &[5], 1e-5).unwrap();
        let shifted = forward_with_bias_affine(&input, &[5], &beta, 1e-5).unwrap();
        let p = plain.output.as_f32_slice().unwrap();
        let s = shifted.output.as_f32_slice().unwrap();
        for (idx, (pv, sv)) in p.iter().zip(s).enumerate() {
            let b = beta.get_f32(idx % 5).unwrap();
            assert!((pv + b - sv).abs() < 1e-6);
        }
    }
}
