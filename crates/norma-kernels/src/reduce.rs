//! Cross-instance reduction for `grad_gamma` / `grad_beta`.
//!
//! Every instance contributes to the same `n2` outputs, so instances are
//! grouped into tiles of `reduction_tile_rows`. Phase one gives each tile a
//! private slot in a single arena buffer and fills the slots independently
//! (in parallel when the problem is large enough). Phase two sums the slots
//! in tile order. Tiling does not depend on the rayon pool size, so the
//! result is bit-identical run to run and between the parallel and
//! sequential paths.

use rayon::prelude::*;

use norma_core::Element;

use crate::affine::AffineVariant;
use crate::config::LayerNormConfig;

/// Parameter gradients in f32. A vector is empty when its parameter is
/// absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ParamGrads {
    pub gamma: Vec<f32>,
    pub beta: Vec<f32>,
}

pub(crate) fn affine_grads<T: Element, V: AffineVariant>(
    x: &[T],
    dout: &[T],
    mean: &[f32],
    invvar: &[f32],
    n2: usize,
    config: &LayerNormConfig,
) -> ParamGrads {
    let gamma_len = if V::HAS_GAMMA { n2 } else { 0 };
    let beta_len = if V::HAS_BETA { n2 } else { 0 };
    let width = gamma_len + beta_len;
    if width == 0 {
        return ParamGrads::default();
    }

    let n1 = mean.len();
    let tile_rows = config.reduction_tile_rows;
    let num_tiles = n1.div_ceil(tile_rows);

    // Slot layout: [gamma partial (gamma_len) | beta partial (beta_len)]
    let mut arena = vec![0.0f32; num_tiles * width];

    let fill = |(tile, slot): (usize, &mut [f32])| {
        let first = tile * tile_rows;
        let last = (first + tile_rows).min(n1);
        let (g_acc, b_acc) = slot.split_at_mut(gamma_len);
        for i in first..last {
            let row = i * n2..(i + 1) * n2;
            accumulate_row::<T, V>(&x[row.clone()], &dout[row], mean[i], invvar[i], g_acc, b_acc);
        }
    };

    if config.use_parallel(x.len()) {
        tracing::trace!(num_tiles, tile_rows, "affine grads: parallel partial sums");
        arena.par_chunks_mut(width).enumerate().for_each(fill);
    } else {
        arena.chunks_mut(width).enumerate().for_each(fill);
    }

    let mut total = vec![0.0f32; width];
    for slot in arena.chunks(width) {
        for (acc, &v) in total.iter_mut().zip(slot) {
            *acc += v;
        }
    }

    let beta = total.split_off(gamma_len);
    ParamGrads { gamma: total, beta }
}

#[inline]
fn accumulate_row<T: Element, V: AffineVariant>(
    x: &[T],
    dout: &[T],
    mean: f32,
    invvar: f32,
    g_acc: &mut [f32],
    b_acc: &mut [f32],
) {
    if V::HAS_GAMMA {
        for ((acc, xj), dj) in g_acc.iter_mut().zip(x).zip(dout) {
            *acc += dj.to_f32() * (xj.to_f32() - mean) * invvar;
        }
    }
    if V::HAS_BETA {
        for (acc, dj) in b_acc.iter_mut().zip(dout) {
            *acc += dj.to_f32();
        }
    }
}
