//! Kernel configuration.

use std::path::Path;

use norma_core::{NormaError, Result};
use serde::{Deserialize, Serialize};

/// How the per-instance variance is accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceMode {
    /// Mean first, then the mean of squared deviations. Stable for large rows.
    #[default]
    TwoPass,
    /// Welford's online algorithm: one pass over the row.
    Welford,
}

/// Tuning knobs shared by the forward and backward kernels.
///
/// Every field has a default, so a JSON document only needs the fields it
/// overrides:
///
/// ```
/// use norma_kernels::{LayerNormConfig, VarianceMode};
///
/// let cfg = LayerNormConfig::from_json_str(r#"{ "variance": "welford" }"#).unwrap();
/// assert_eq!(cfg.variance, VarianceMode::Welford);
/// assert_eq!(cfg.epsilon, 1e-5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerNormConfig {
    /// Added to the variance before the reciprocal square root.
    pub epsilon: f64,

    /// Variance accumulation strategy.
    pub variance: VarianceMode,

    /// Minimum element count (`n1 * n2`) before instances are spread over
    /// the rayon pool. Smaller inputs run on the calling thread.
    pub par_threshold: usize,

    /// Instances folded into one partial accumulator during the
    /// `grad_gamma` / `grad_beta` reduction.
    pub reduction_tile_rows: usize,
}

impl Default for LayerNormConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            variance: VarianceMode::TwoPass,
            par_threshold: 8192,
            reduction_tile_rows: 64,
        }
    }
}

impl LayerNormConfig {
    /// Default config with a different epsilon.
    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            epsilon,
            ..Self::default()
        }
    }

    /// Config that never spawns rayon work. Useful as a reference in tests.
    pub fn sequential() -> Self {
        Self {
            par_threshold: usize::MAX,
            ..Self::default()
        }
    }

    /// Check invariants the kernels rely on.
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(NormaError::InvalidConfig(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        if self.reduction_tile_rows == 0 {
            return Err(NormaError::InvalidConfig(
                "reduction_tile_rows must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| NormaError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            NormaError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| NormaError::InvalidConfig(e.to_string()))
    }

    /// Whether a problem of `numel` elements should use the rayon pool.
    pub(crate) fn use_parallel(&self, numel: usize) -> bool {
        numel >= self.par_threshold
    }
}

/// Epsilon must be a finite, non-negative number.
pub(crate) fn validate_epsilon(epsilon: f64) -> Result<()> {
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(NormaError::precondition(format!(
            "epsilon must be finite and non-negative, got {epsilon}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = LayerNormConfig::default();
        assert_eq!(cfg.epsilon, 1e-5);
        assert_eq!(cfg.variance, VarianceMode::TwoPass);
        assert_eq!(cfg.par_threshold, 8192);
        assert_eq!(cfg.reduction_tile_rows, 64);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let cfg = LayerNormConfig::from_json_str(r#"{ "epsilon": 1e-6, "reduction_tile_rows": 8 }"#)
            .unwrap();
        assert_eq!(cfg.epsilon, 1e-6);
        assert_eq!(cfg.reduction_tile_rows, 8);
        assert_eq!(cfg.par_threshold, 8192);
    }

    #[test]
    fn test_json_round_trip() {
        let cfg = LayerNormConfig {
            variance: VarianceMode::Welford,
            par_threshold: 1,
            ..LayerNormConfig::default()
        };
        let text = cfg.to_json_string().unwrap();
        assert!(text.contains("\"welford\""));
        assert_eq!(LayerNormConfig::from_json_str(&text).unwrap(), cfg);
    }

    #[test]
    fn test_rejects_zero_tile() {
        let err = LayerNormConfig::from_json_str(r#"{ "reduction_tile_rows": 0 }"#).unwrap_err();
        assert!(matches!(err, NormaError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_bad_epsilon() {
        assert!(LayerNormConfig::with_epsilon(-1.0).validate().is_err());
        assert!(LayerNormConfig::with_epsilon(f64::NAN).validate().is_err());
        assert!(LayerNormConfig::with_epsilon(0.0).validate().is_ok());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = LayerNormConfig::from_json_str("{ epsilon: }").unwrap_err();
        assert!(matches!(err, NormaError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_missing_file() {
        let err = LayerNormConfig::from_json_file(Path::new("/nonexistent/norma.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_sequential_never_parallel() {
        let cfg = LayerNormConfig::sequential();
        assert!(!cfg.use_parallel(1 << 30));
        assert!(LayerNormConfig::default().use_parallel(8192));
    }
}
