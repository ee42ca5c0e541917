//! Operand checks run before any numeric work.

use norma_core::{DType, NormaError, Result, Tensor};

/// The input decides dtype and device for every other operand.
pub(crate) fn check_input(input: &Tensor) -> Result<()> {
    match input.dtype() {
        DType::F32 | DType::F16 | DType::BF16 => {}
        other => return Err(NormaError::UnsupportedDType(other)),
    }
    if !input.device().is_cpu() {
        return Err(NormaError::precondition(format!(
            "input must be a cpu tensor, got device {}",
            input.device()
        )));
    }
    check_contiguous("input", input)
}

pub(crate) fn check_contiguous(name: &str, t: &Tensor) -> Result<()> {
    if !t.is_contiguous() {
        return Err(NormaError::precondition(format!("{name} must be contiguous")));
    }
    Ok(())
}

fn check_device(name: &str, t: &Tensor, input: &Tensor) -> Result<()> {
    if t.device() != input.device() {
        return Err(NormaError::precondition(format!(
            "{name} is on {} but input is on {}",
            t.device(),
            input.device()
        )));
    }
    Ok(())
}

fn check_dtype(name: &str, t: &Tensor, expected: DType) -> Result<()> {
    if t.dtype() != expected {
        return Err(NormaError::precondition(format!(
            "{name} has dtype {}, expected {expected}",
            t.dtype()
        )));
    }
    Ok(())
}

/// An operand shaped exactly like the input (the upstream gradient).
pub(crate) fn check_like_input(name: &str, t: &Tensor, input: &Tensor) -> Result<()> {
    check_device(name, t, input)?;
    check_contiguous(name, t)?;
    check_dtype(name, t, input.dtype())?;
    if t.shape() != input.shape() {
        return Err(NormaError::precondition(format!(
            "{name} has shape {} but input has shape {}",
            t.shape(),
            input.shape()
        )));
    }
    Ok(())
}

/// `gamma` / `beta`: `n2` elements laid out either as the normalized shape
/// or flat.
pub(crate) fn check_affine_param(
    name: &str,
    t: &Tensor,
    input: &Tensor,
    normalized_shape: &[usize],
    n2: usize,
) -> Result<()> {
    check_device(name, t, input)?;
    check_contiguous(name, t)?;
    check_dtype(name, t, input.dtype())?;
    let dims = t.shape().dims();
    if dims != normalized_shape && dims != [n2].as_slice() {
        return Err(NormaError::precondition(format!(
            "{name} has shape {} but must have shape {normalized_shape:?} ({n2} elements)",
            t.shape()
        )));
    }
    Ok(())
}

/// Saved `mean` / `invvar`: f32, one value per instance.
pub(crate) fn check_stats(name: &str, t: &Tensor, input: &Tensor, n1: usize) -> Result<()> {
    check_device(name, t, input)?;
    check_contiguous(name, t)?;
    check_dtype(name, t, DType::F32)?;
    if t.numel() != n1 {
        return Err(NormaError::precondition(format!(
            "{name} has {} elements, expected one per instance ({n1})",
            t.numel()
        )));
    }
    Ok(())
}
