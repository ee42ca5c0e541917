//! Shape decomposition.
//!
//! A layer norm over the trailing `k` dimensions of an input treats the
//! input as a `[n1, n2]` matrix: `n1` independent instances (the product of
//! the leading dimensions) of `n2` elements each (the product of the
//! normalized dimensions). Instance `i` occupies the contiguous range
//! `i * n2 .. (i + 1) * n2` of a row-major buffer.

use std::ops::Range;

use norma_core::{NormaError, Result, Shape};

/// `(n1, n2)` factorization of an input shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decomposition {
    n1: usize,
    n2: usize,
}

impl Decomposition {
    /// Number of independent normalization instances.
    pub fn n1(&self) -> usize {
        self.n1
    }

    /// Number of elements normalized together in one instance.
    pub fn n2(&self) -> usize {
        self.n2
    }

    /// Total element count, `n1 * n2`.
    pub fn numel(&self) -> usize {
        self.n1 * self.n2
    }

    /// Flat element range of instance `i`.
    pub fn instance_range(&self, i: usize) -> Range<usize> {
        i * self.n2..(i + 1) * self.n2
    }
}

/// Validate `normalized_shape` against `input_shape` and factor the input.
///
/// Fails with `InvalidNormalizedShape` if `normalized_shape` is empty or has
/// a zero-sized dimension, and with `ShapeMismatch` if it is not a suffix of
/// `input_shape`. Pure: no numeric work happens here.
pub fn decompose(input_shape: &Shape, normalized_shape: &[usize]) -> Result<Decomposition> {
    if normalized_shape.is_empty() || normalized_shape.contains(&0) {
        return Err(NormaError::InvalidNormalizedShape {
            normalized_shape: normalized_shape.to_vec(),
        });
    }

    let mismatch = || NormaError::ShapeMismatch {
        normalized_shape: normalized_shape.to_vec(),
        input_shape: input_shape.dims().to_vec(),
    };

    let (leading, trailing) = input_shape
        .split_trailing(normalized_shape.len())
        .ok_or_else(mismatch)?;
    if trailing != normalized_shape {
        return Err(mismatch());
    }

    Ok(Decomposition {
        n1: leading.iter().product(),
        n2: trailing.iter().product(),
    })
}
