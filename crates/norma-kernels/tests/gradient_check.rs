//! Finite-difference gradient checks for the backward kernel.

use norma_core::prelude::*;
use norma_kernels::{backward, forward};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EPS: f64 = 1e-5;
const STEP: f32 = 1e-2;

fn random_vec(len: usize, seed: u64, scale: f32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-scale..scale)).collect()
}

/// `sum(dout * forward(x, gamma, beta))`, accumulated in f64.
fn loss(
    x: &[f32],
    dims: &[usize],
    normalized_shape: &[usize],
    gamma: Option<&[f32]>,
    beta: Option<&[f32]>,
    dout: &[f32],
) -> f32 {
    let input = Tensor::from_f32(x, dims);
    let gamma = gamma.map(|g| Tensor::from_f32(g, normalized_shape));
    let beta = beta.map(|b| Tensor::from_f32(b, normalized_shape));
    let out = forward(&input, normalized_shape, gamma.as_ref(), beta.as_ref(), EPS).unwrap();
    out.output
        .as_f32_slice()
        .unwrap()
        .iter()
        .zip(dout)
        .map(|(&y, &d)| y as f64 * d as f64)
        .sum::<f64>() as f32
}

/// Numerical gradient via central finite differences.
fn numerical_grad(f: &dyn Fn(&[f32]) -> f32, param: &[f32], step: f32) -> Vec<f32> {
    let mut buf = param.to_vec();
    let mut grad = vec![0.0f32; param.len()];
    for i in 0..param.len() {
        let orig = buf[i];
        buf[i] = orig + step;
        let fp = f(&buf);
        buf[i] = orig - step;
        let fm = f(&buf);
        buf[i] = orig;
        grad[i] = (fp - fm) / (2.0 * step);
    }
    grad
}

fn check_close(analytic: &[f32], numerical: &[f32], tol: f32, name: &str) {
    assert_eq!(analytic.len(), numerical.len(), "{name}: length mismatch");
    for i in 0..analytic.len() {
        let abs_err = (analytic[i] - numerical[i]).abs();
        // absolute tolerance near zero
        if abs_err < 2e-3 {
            continue;
        }
        let scale = numerical[i].abs().max(analytic[i].abs()).max(1e-7);
        let rel = abs_err / scale;
        assert!(
            rel < tol,
            "{name}[{i}]: analytic={:.6}, numerical={:.6}, rel_err={:.6}",
            analytic[i],
            numerical[i],
            rel
        );
    }
}

fn run_case(with_gamma: bool, with_beta: bool, seed: u64) {
    let dims = [3, 2, 4];
    let ns = [2, 4];
    let n = 24;

    let x = random_vec(n, seed, 2.0);
    let dout = random_vec(n, seed + 1, 1.0);
    let gamma = with_gamma.then(|| {
        random_vec(8, seed + 2, 0.5)
            .into_iter()
            .map(|g| g + 1.0)
            .collect::<Vec<_>>()
    });
    let beta = with_beta.then(|| random_vec(8, seed + 3, 0.5));

    let input = Tensor::from_f32(&x, &dims);
    let dout_t = Tensor::from_f32(&dout, &dims);
    let gamma_t = gamma.as_deref().map(|g| Tensor::from_f32(g, &ns));
    let beta_t = beta.as_deref().map(|b| Tensor::from_f32(b, &ns));

    let saved = forward(&input, &ns, gamma_t.as_ref(), beta_t.as_ref(), EPS).unwrap();
    let grads = backward(
        &dout_t,
        &saved.mean,
        &saved.invvar,
        &input,
        &ns,
        gamma_t.as_ref(),
        beta_t.as_ref(),
        EPS,
    )
    .unwrap();

    let g = gamma.as_deref();
    let b = beta.as_deref();

    let num_dx = numerical_grad(&|xs| loss(xs, &dims, &ns, g, b, &dout), &x, STEP);
    check_close(grads.grad_input.as_f32_slice().unwrap(), &num_dx, 2e-2, "grad_input");

    match (&gamma, grads.grad_gamma) {
        (Some(gv), Some(dg)) => {
            let num = numerical_grad(&|gs| loss(&x, &dims, &ns, Some(gs), b, &dout), gv, STEP);
            check_close(dg.as_f32_slice().unwrap(), &num, 2e-2, "grad_gamma");
        }
        (None, None) => {}
        _ => panic!("grad_gamma presence does not follow gamma"),
    }

    match (&beta, grads.grad_beta) {
        (Some(bv), Some(db)) => {
            let num = numerical_grad(&|bs| loss(&x, &dims, &ns, g, Some(bs), &dout), bv, STEP);
            check_close(db.as_f32_slice().unwrap(), &num, 2e-2, "grad_beta");
        }
        (None, None) => {}
        _ => panic!("grad_beta presence does not follow beta"),
    }
}

#[test]
fn grad_check_no_affine() {
    run_case(false, false, 10);
}

#[test]
fn grad_check_shift_only() {
    run_case(false, true, 20);
}

#[test]
fn grad_check_scale_only() {
    run_case(true, false, 30);
}

#[test]
fn grad_check_scale_and_shift() {
    run_case(true, true, 40);
}

#[test]
fn grad_check_parallel_path() {
    use norma_kernels::{backward_with_config, forward_with_config, LayerNormConfig};

    // Force every stage onto the rayon pool with tiny tiles.
    let cfg = LayerNormConfig {
        par_threshold: 1,
        reduction_tile_rows: 2,
        ..LayerNormConfig::default()
    };
    let dims = [5, 6];
    let x = random_vec(30, 50, 1.5);
    let dout = random_vec(30, 51, 1.0);
    let gamma: Vec<f32> = random_vec(6, 52, 0.5).iter().map(|g| g + 1.0).collect();

    let input = Tensor::from_f32(&x, &dims);
    let gamma_t = Tensor::from_f32(&gamma, &[6]);
    let saved = forward_with_config(&input, &[6], Some(&gamma_t), None, EPS, &cfg).unwrap();
    let grads = backward_with_config(
        &Tensor::from_f32(&dout, &dims),
        &saved.mean,
        &saved.invvar,
        &input,
        &[6],
        Some(&gamma_t),
        None,
        EPS,
        &cfg,
    )
    .unwrap();

    let num_dx = numerical_grad(&|xs| loss(xs, &dims, &[6], Some(&gamma), None, &dout), &x, STEP);
    check_close(grads.grad_input.as_f32_slice().unwrap(), &num_dx, 2e-2, "grad_input");

    let num_dg = numerical_grad(&|gs| loss(&x, &dims, &[6], Some(gs), None, &dout), &gamma, STEP);
    check_close(
        grads.grad_gamma.unwrap().as_f32_slice().unwrap(),
        &num_dg,
        2e-2,
        "grad_gamma",
    );
}
