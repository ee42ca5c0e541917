//! Per-instance mean and inverse standard deviation.

use norma_core::Element;

use crate::config::VarianceMode;

/// Statistics of one normalization instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowStats {
    pub mean: f32,
    /// `1 / sqrt(var + epsilon)`
    pub invvar: f32,
}

/// Compute the mean and inverse standard deviation of `row`, accumulating
/// in f32 and using the biased (population) variance.
///
/// `row` must be non-empty.
pub fn row_stats<T: Element>(row: &[T], mode: VarianceMode, epsilon: f32) -> RowStats {
    let (mean, var) = match mode {
        VarianceMode::TwoPass => two_pass(row),
        VarianceMode::Welford => welford(row),
    };
    RowStats {
        mean,
        invvar: 1.0 / (var + epsilon).sqrt(),
    }
}

fn two_pass<T: Element>(row: &[T]) -> (f32, f32) {
    let n = row.len() as f32;
    let mean = row.iter().map(|x| x.to_f32()).sum::<f32>() / n;
    let var = row
        .iter()
        .map(|x| {
            let d = x.to_f32() - mean;
            d * d
        })
        .sum::<f32>()
        / n;
    (mean, var)
}

fn welford<T: Element>(row: &[T]) -> (f32, f32) {
    let mut mean = 0.0f32;
    let mut m2 = 0.0f32;
    for (i, x) in row.iter().enumerate() {
        let x = x.to_f32();
        let delta = x - mean;
        mean += delta / (i + 1) as f32;
        m2 += delta * (x - mean);
    }
    (mean, m2 / row.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use norma_core::bf16;

    #[test]
    fn test_known_row() {
        let s = row_stats(&[1.0f32, 2.0, 3.0], VarianceMode::TwoPass, 1e-5);
        assert!((s.mean - 2.0).abs() < 1e-6);
        let expected = 1.0 / (2.0f32 / 3.0 + 1e-5).sqrt();
        assert!((s.invvar - expected).abs() < 1e-5, "invvar={}", s.invvar);
    }

    #[test]
    fn test_welford_matches_two_pass() {
        let row: Vec<f32> = (0..257).map(|i| ((i * 37 % 101) as f32) * 0.173 - 4.0).collect();
        let a = row_stats(&row, VarianceMode::TwoPass, 1e-5);
        let b = row_stats(&row, VarianceMode::Welford, 1e-5);
        assert!((a.mean - b.mean).abs() < 1e-4);
        assert!((a.invvar - b.invvar).abs() / a.invvar < 1e-4);
    }

    #[test]
    fn test_large_offset_stays_stable() {
        // Variance 2/3 on top of a large constant; a naive E[x^2] - E[x]^2
        // loses it entirely in f32.
        let row = [10_000.0f32, 10_001.0, 10_002.0];
        for mode in [VarianceMode::TwoPass, VarianceMode::Welford] {
            let s = row_stats(&row, mode, 0.0);
            let var = 1.0 / (s.invvar * s.invvar);
            assert!((var - 2.0 / 3.0).abs() < 1e-2, "{mode:?}: var={var}");
        }
    }

    #[test]
    fn test_constant_row_uses_epsilon() {
        let s = row_stats(&[4.0f32; 8], VarianceMode::TwoPass, 1e-4);
        assert_eq!(s.mean, 4.0);
        assert!((s.invvar - 100.0).abs() < 1e-2);
    }

    #[test]
    fn test_larger_epsilon_lowers_invvar() {
        let row = [0.5f32, -1.0, 2.0, 0.0];
        let mut prev = f32::INFINITY;
        for eps in [0.0, 1e-5, 1e-3, 1e-1, 1.0] {
            let s = row_stats(&row, VarianceMode::TwoPass, eps);
            assert!(s.invvar < prev);
            prev = s.invvar;
        }
    }

    #[test]
    fn test_half_input_accumulates_in_f32() {
        let row: Vec<bf16> = [1.0f32, 2.0, 3.0].iter().map(|&v| bf16::from_f32(v)).collect();
        let s = row_stats(&row, VarianceMode::TwoPass, 1e-5);
        assert!((s.mean - 2.0).abs() < 1e-6);
    }
}
