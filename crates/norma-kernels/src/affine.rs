//! Affine variant selection.
//!
//! `gamma` and `beta` are each optional, giving four combinations. Each
//! combination is a zero-sized marker type implementing [`AffineVariant`];
//! the kernels are generic over the marker, so every combination compiles to
//! its own loop and presence is never tested per element. [`AffineMode`] is
//! the runtime tag, resolved once per call and turned into a marker by
//! `with_affine_variant!`.

use std::fmt;

use norma_core::{Result, Tensor};

use crate::decompose::Decomposition;
use crate::precondition::check_affine_param;

/// Which affine parameters take part in a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AffineMode {
    /// Plain normalization.
    None,
    /// `beta` only.
    ShiftOnly,
    /// `gamma` only.
    ScaleOnly,
    /// `gamma` and `beta`.
    Both,
}

impl AffineMode {
    pub fn from_presence(has_gamma: bool, has_beta: bool) -> Self {
        match (has_gamma, has_beta) {
            (false, false) => AffineMode::None,
            (false, true) => AffineMode::ShiftOnly,
            (true, false) => AffineMode::ScaleOnly,
            (true, true) => AffineMode::Both,
        }
    }

    pub const fn has_gamma(self) -> bool {
        matches!(self, AffineMode::ScaleOnly | AffineMode::Both)
    }

    pub const fn has_beta(self) -> bool {
        matches!(self, AffineMode::ShiftOnly | AffineMode::Both)
    }
}

impl fmt::Display for AffineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffineMode::None => write!(f, "none"),
            AffineMode::ShiftOnly => write!(f, "bias"),
            AffineMode::ScaleOnly => write!(f, "weight"),
            AffineMode::Both => write!(f, "both"),
        }
    }
}

/// Compile-time affine combination.
///
/// `scale` and `shift` read from the parameter slices only when the
/// parameter exists; otherwise they return the identity and the slice is
/// never touched (it is empty).
pub trait AffineVariant: Send + Sync + 'static {
    const MODE: AffineMode;
    const HAS_GAMMA: bool = Self::MODE.has_gamma();
    const HAS_BETA: bool = Self::MODE.has_beta();

    #[inline(always)]
    fn scale(gamma: &[f32], j: usize) -> f32 {
        if Self::HAS_GAMMA {
            gamma[j]
        } else {
            1.0
        }
    }

    #[inline(always)]
    fn shift(beta: &[f32], j: usize) -> f32 {
        if Self::HAS_BETA {
            beta[j]
        } else {
            0.0
        }
    }
}

pub struct NoAffine;
pub struct ShiftOnly;
pub struct ScaleOnly;
pub struct ScaleShift;

impl AffineVariant for NoAffine {
    const MODE: AffineMode = AffineMode::None;
}

impl AffineVariant for ShiftOnly {
    const MODE: AffineMode = AffineMode::ShiftOnly;
}

impl AffineVariant for ScaleOnly {
    const MODE: AffineMode = AffineMode::ScaleOnly;
}

impl AffineVariant for ScaleShift {
    const MODE: AffineMode = AffineMode::Both;
}

/// Expand `$body` once per affine variant with `$v` bound to the marker
/// type matching `$mode`.
macro_rules! with_affine_variant {
    ($mode:expr, |$v:ident| $body:expr) => {
        match $mode {
            $crate::affine::AffineMode::None => {
                type $v = $crate::affine::NoAffine;
                $body
            }
            $crate::affine::AffineMode::ShiftOnly => {
                type $v = $crate::affine::ShiftOnly;
                $body
            }
            $crate::affine::AffineMode::ScaleOnly => {
                type $v = $crate::affine::ScaleOnly;
                $body
            }
            $crate::affine::AffineMode::Both => {
                type $v = $crate::affine::ScaleShift;
                $body
            }
        }
    };
}

pub(crate) use with_affine_variant;

/// Validated affine parameters widened to f32. An absent parameter is an
/// empty vector.
#[derive(Debug, Clone)]
pub(crate) struct AffineParams {
    pub mode: AffineMode,
    pub gamma: Vec<f32>,
    pub beta: Vec<f32>,
}

impl AffineParams {
    pub fn resolve(
        gamma: Option<&Tensor>,
        beta: Option<&Tensor>,
        input: &Tensor,
        normalized_shape: &[usize],
        dims: Decomposition,
    ) -> Result<Self> {
        let widen = |name: &str, param: Option<&Tensor>| -> Result<Vec<f32>> {
            match param {
                Some(t) => {
                    check_affine_param(name, t, input, normalized_shape, dims.n2())?;
                    Ok(t.to_f32_vec())
                }
                None => Ok(Vec::new()),
            }
        };
        Ok(Self {
            mode: AffineMode::from_presence(gamma.is_some(), beta.is_some()),
            gamma: widen("gamma", gamma)?,
            beta: widen("beta", beta)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_presence() {
        assert_eq!(AffineMode::from_presence(false, false), AffineMode::None);
        assert_eq!(AffineMode::from_presence(false, true), AffineMode::ShiftOnly);
        assert_eq!(AffineMode::from_presence(true, false), AffineMode::ScaleOnly);
        assert_eq!(AffineMode::from_presence(true, true), AffineMode::Both);
    }

    #[test]
    fn test_marker_constants() {
        assert!(!NoAffine::HAS_GAMMA && !NoAffine::HAS_BETA);
        assert!(!ShiftOnly::HAS_GAMMA && ShiftOnly::HAS_BETA);
        assert!(ScaleOnly::HAS_GAMMA && !ScaleOnly::HAS_BETA);
        assert!(ScaleShift::HAS_GAMMA && ScaleShift::HAS_BETA);
    }

    #[test]
    fn test_identity_when_absent() {
        assert_eq!(NoAffine::scale(&[], 5), 1.0);
        assert_eq!(NoAffine::shift(&[], 5), 0.0);
        assert_eq!(ScaleShift::scale(&[2.0, 3.0], 1), 3.0);
        assert_eq!(ScaleShift::shift(&[-1.0], 0), -1.0);
    }

    fn mode_of<V: AffineVariant>() -> AffineMode {
        V::MODE
    }

    #[test]
    fn test_macro_selects_matching_marker() {
        for mode in [
            AffineMode::None,
            AffineMode::ShiftOnly,
            AffineMode::ScaleOnly,
            AffineMode::Both,
        ] {
            let selected = with_affine_variant!(mode, |V| mode_of::<V>());
            assert_eq!(selected, mode);
        }
    }

    #[test]
    fn test_resolve() {
        let input = Tensor::ones(&[2, 3]);
        let dims = crate::decompose::decompose(input.shape(), &[3]).unwrap();
        let beta = Tensor::from_f32(&[0.5, 0.0, -0.5], &[3]);
        let p = AffineParams::resolve(None, Some(&beta), &input, &[3], dims).unwrap();
        assert_eq!(p.mode, AffineMode::ShiftOnly);
        assert!(p.gamma.is_empty());
        assert_eq!(p.beta, vec![0.5, 0.0, -0.5]);

        let bad = Tensor::ones(&[4]);
        assert!(AffineParams::resolve(Some(&bad), None, &input, &[3], dims).is_err());
    }
}
