//! Kruskal-Wallis H test for k independent groups.

use super::rank::rank_with_ties;
use crate::error::{DiversityError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Outcome of a Kruskal-Wallis test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KruskalWallis {
    /// Tie-corrected H statistic.
    pub statistic: f64,
    /// Degrees of freedom (k - 1).
    pub df: usize,
    /// Chi-square survival probability of `statistic`.
    pub p_value: f64,
    /// Tie correction factor `1 - Σ(t³-t)/(N³-N)`.
    pub tie_correction: f64,
}

/// Kruskal-Wallis test on `groups`.
///
/// H = 12 / (N(N+1)) Σ R_g² / n_g - 3(N+1), divided by the tie correction
/// factor and referred to a chi-square distribution with k - 1 degrees of
/// freedom. When every value is tied H is 0 and the p-value 1.
pub fn kruskal_wallis(groups: &[&[f64]]) -> Result<KruskalWallis> {
    let k = groups.len();
    if k < 2 {
        return Err(DiversityError::InsufficientGroupSize(format!(
            "Kruskal-Wallis needs at least 2 groups, got {}",
            k
        )));
    }
    if let Some(pos) = groups.iter().position(|g| g.is_empty()) {
        return Err(DiversityError::InsufficientGroupSize(format!(
            "Kruskal-Wallis group {} is empty",
            pos
        )));
    }

    let pooled: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let n = pooled.len() as f64;
    let ranks = rank_with_ties(&pooled);

    let mut offset = 0;
    let mut sum_term = 0.0;
    for group in groups {
        let r: f64 = ranks.ranks[offset..offset + group.len()].iter().sum();
        sum_term += r * r / group.len() as f64;
        offset += group.len();
    }

    let h = 12.0 / (n * (n + 1.0)) * sum_term - 3.0 * (n + 1.0);
    let tie_correction = 1.0 - ranks.tie_sum() / (n * n * n - n);
    let df = k - 1;

    if tie_correction <= 0.0 {
        return Ok(KruskalWallis {
            statistic: 0.0,
            df,
            p_value: 1.0,
            tie_correction: 0.0,
        });
    }

    let statistic = (h / tie_correction).max(0.0);
    let chi2 = ChiSquared::new(df as f64)
        .map_err(|e| DiversityError::Numerical(format!("chi-square distribution: {}", e)))?;
    let p_value = chi2.sf(statistic).clamp(0.0, 1.0);

    Ok(KruskalWallis {
        statistic,
        df,
        p_value,
        tie_correction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identical_groups() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [1.0, 2.0, 3.0, 4.0];
        let result = kruskal_wallis(&[&a, &b]).unwrap();
        assert_relative_eq!(result.statistic, 0.0, epsilon = 1e-12);
        assert_relative_eq!(result.p_value, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_known_value() {
        // No ties: ranks A = 1,2,3 (R=6), B = 4,5,6 (R=15)
        // H = 12/42 * (36/3 + 225/3) - 21 = 3.857142857
        let a = [1.0, 2.0, 3.0];
        let b = [10.0, 11.0, 12.0];
        let result = kruskal_wallis(&[&a, &b]).unwrap();
        assert_relative_eq!(result.statistic, 27.0 / 7.0, epsilon = 1e-12);
        assert_eq!(result.df, 1);
        assert_relative_eq!(result.tie_correction, 1.0);
        // chi2(1) survival at 3.857 ≈ 0.0495
        assert!((result.p_value - 0.0495).abs() < 1e-3);
    }

    #[test]
    fn test_tie_correction_applied() {
        let a = [1.0, 1.0, 2.0];
        let b = [2.0, 3.0, 3.0];
        let result = kruskal_wallis(&[&a, &b]).unwrap();
        // Three tie groups of size 2: 1 - 18/210
        assert_relative_eq!(result.tie_correction, 1.0 - 18.0 / 210.0, epsilon = 1e-12);
        assert!(result.p_value > 0.0 && result.p_value < 1.0);
    }

    #[test]
    fn test_all_values_tied() {
        let a = [5.0, 5.0];
        let b = [5.0, 5.0, 5.0];
        let result = kruskal_wallis(&[&a, &b]).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_three_groups() {
        let a = [2.9, 3.0, 2.5, 2.6, 3.2];
        let b = [3.8, 2.7, 4.0, 2.4];
        let c = [2.8, 3.4, 3.7, 2.2, 2.0];
        let result = kruskal_wallis(&[&a, &b, &c]).unwrap();
        // Reference value from the classic Hollander & Wolfe example
        assert_relative_eq!(result.statistic, 0.7714, epsilon = 1e-3);
        assert_eq!(result.df, 2);
        assert!((result.p_value - 0.68).abs() < 0.01);
    }

    #[test]
    fn test_tiny_p_value_not_rounded_to_zero() {
        let a: Vec<f64> = (0..150).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..150).map(|i| 1000.0 + i as f64).collect();
        let result = kruskal_wallis(&[&a, &b]).unwrap();
        assert!(result.statistic > 200.0);
        assert!(result.p_value > 0.0);
        assert!(result.p_value < 1e-40);
    }

    #[test]
    fn test_requires_two_groups() {
        let a = [1.0, 2.0];
        assert!(matches!(
            kruskal_wallis(&[&a]),
            Err(DiversityError::InsufficientGroupSize(_))
        ));
        let empty: [f64; 0] = [];
        assert!(matches!(
            kruskal_wallis(&[&a, &empty]),
            Err(DiversityError::InsufficientGroupSize(_))
        ));
    }
}
