//! Hurlbert's expected richness under subsampling without replacement.

use crate::error::{DiversityError, Result};
use statrs::function::gamma::ln_gamma;

/// Natural log of the binomial coefficient `C(n, k)`, for `k <= n`.
#[inline]
pub fn ln_binomial(n: u64, k: u64) -> f64 {
    ln_gamma(n as f64 + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma((n - k) as f64 + 1.0)
}

/// Integral counts of one sample, validated for rarefaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleCounts {
    /// Counts of the present features.
    pub counts: Vec<u64>,
    /// Total reads `N`.
    pub total: u64,
}

impl SampleCounts {
    /// Build from the abundances of one sample; zeros are dropped.
    ///
    /// Fails with `MalformedInput` when an abundance is not a whole number.
    pub fn from_abundances(sample_id: &str, abundances: &[f64]) -> Result<Self> {
        let mut counts = Vec::with_capacity(abundances.len());
        for &x in abundances {
            if x.fract() != 0.0 {
                return Err(DiversityError::MalformedInput(format!(
                    "Rarefaction needs integer counts; sample '{}' has {}",
                    sample_id, x
                )));
            }
            if x > 0.0 {
                counts.push(x as u64);
            }
        }
        let total = counts.iter().sum();
        Ok(Self { counts, total })
    }

    /// Number of features observed.
    pub fn observed(&self) -> usize {
        self.counts.len()
    }

    /// Expected number of features in a random subsample of `depth` reads.
    ///
    /// `E[S(d)] = S_obs - Σ C(N - n_i, d) / C(N, d)`, evaluated in log space.
    /// Returns `None` when `depth` exceeds the total.
    pub fn expected_richness(&self, depth: u64) -> Result<Option<f64>> {
        let n = self.total;
        if depth > n {
            return Ok(None);
        }
        let s_obs = self.counts.len() as f64;
        if depth == 0 {
            return Ok(Some(0.0));
        }
        if depth == n {
            return Ok(Some(s_obs));
        }

        let ln_total = ln_binomial(n, depth);
        let mut absent = 0.0;
        for &count in &self.counts {
            let rest = n - count;
            // C(rest, d) = 0: the feature is certain to be drawn
            if rest < depth {
                continue;
            }
            absent += (ln_binomial(rest, depth) - ln_total).exp();
        }

        let expected = s_obs - absent;
        if !expected.is_finite() {
            return Err(DiversityError::Numerical(format!(
                "Expected richness at depth {} is not finite",
                depth
            )));
        }
        Ok(Some(expected.clamp(0.0, s_obs)))
    }
}
