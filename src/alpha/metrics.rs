//! Per-sample alpha diversity metrics.

use crate::error::{DiversityError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alpha diversity metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaMetric {
    /// Shannon entropy, natural log.
    #[default]
    Shannon,
    /// Gini-Simpson index, `1 - Σ p²`.
    Simpson,
    /// Number of features present.
    Observed,
    /// Chao1 bias-corrected richness estimator.
    Chao1,
}

impl AlphaMetric {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlphaMetric::Shannon => "shannon",
            AlphaMetric::Simpson => "simpson",
            AlphaMetric::Observed => "observed",
            AlphaMetric::Chao1 => "chao1",
        }
    }

    /// Human-readable metric name.
    pub fn display_name(&self) -> &'static str {
        match self {
            AlphaMetric::Shannon => "Shannon",
            AlphaMetric::Simpson => "Simpson",
            AlphaMetric::Observed => "Observed features",
            AlphaMetric::Chao1 => "Chao1",
        }
    }

    /// Compute the metric for one sample's abundances.
    pub fn compute(&self, sample_id: &str, abundances: &[f64]) -> Result<f64> {
        match self {
            AlphaMetric::Shannon => shannon(sample_id, abundances),
            AlphaMetric::Simpson => simpson(sample_id, abundances),
            AlphaMetric::Observed => Ok(observed(abundances)),
            AlphaMetric::Chao1 => Ok(chao1(abundances)),
        }
    }

    /// Qualitative reading of a metric value.
    pub fn interpret(&self, value: f64) -> Interpretation {
        let (level, text) = match self {
            AlphaMetric::Shannon => {
                if value < 1.5 {
                    (DiversityLevel::Low, "Low diversity: community dominated by few taxa")
                } else if value < 2.5 {
                    (DiversityLevel::Moderate, "Moderate diversity: relatively even community")
                } else if value < 3.5 {
                    (DiversityLevel::High, "High diversity: well balanced community")
                } else {
                    (DiversityLevel::VeryHigh, "Very high diversity: highly complex community")
                }
            }
            AlphaMetric::Simpson => {
                if value < 0.5 {
                    (DiversityLevel::Low, "Low diversity: strong dominance by few taxa")
                } else if value < 0.8 {
                    (DiversityLevel::Moderate, "Moderate diversity")
                } else {
                    (DiversityLevel::High, "High diversity: low dominance")
                }
            }
            AlphaMetric::Observed | AlphaMetric::Chao1 => {
                if value < 100.0 {
                    (DiversityLevel::Low, "Low richness: few taxa detected")
                } else if value < 300.0 {
                    (DiversityLevel::Moderate, "Moderate richness")
                } else {
                    (DiversityLevel::High, "High richness: many taxa detected")
                }
            }
        };
        Interpretation {
            level,
            description: text.to_string(),
        }
    }
}

impl fmt::Display for AlphaMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlphaMetric {
    type Err = DiversityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shannon" | "shannon_entropy" => Ok(AlphaMetric::Shannon),
            "simpson" | "gini_simpson" => Ok(AlphaMetric::Simpson),
            "observed" | "observed_features" | "observed_otus" | "richness" => {
                Ok(AlphaMetric::Observed)
            }
            "chao1" => Ok(AlphaMetric::Chao1),
            other => Err(DiversityError::InvalidParameter(format!(
                "Unknown alpha metric '{}'. Available: shannon, simpson, observed, chao1",
                other
            ))),
        }
    }
}

/// Qualitative diversity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

/// Band and description of a metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub level: DiversityLevel,
    pub description: String,
}

fn total_or_empty(sample_id: &str, abundances: &[f64]) -> Result<f64> {
    let total: f64 = abundances.iter().sum();
    if total <= 0.0 {
        return Err(DiversityError::EmptySample {
            sample_id: sample_id.to_string(),
        });
    }
    Ok(total)
}

/// Shannon entropy `-Σ p ln p` over present features.
pub fn shannon(sample_id: &str, abundances: &[f64]) -> Result<f64> {
    let total = total_or_empty(sample_id, abundances)?;
    let h = -abundances
        .iter()
        .filter(|&&x| x > 0.0)
        .map(|&x| {
            let p = x / total;
            p * p.ln()
        })
        .sum::<f64>();
    // -0.0 for a single present feature
    Ok(h.max(0.0))
}

/// Gini-Simpson index `1 - Σ p²`.
pub fn simpson(sample_id: &str, abundances: &[f64]) -> Result<f64> {
    let total = total_or_empty(sample_id, abundances)?;
    let dominance: f64 = abundances
        .iter()
        .map(|&x| {
            let p = x / total;
            p * p
        })
        .sum();
    Ok((1.0 - dominance).max(0.0))
}

/// Number of features with abundance > 0.
pub fn observed(abundances: &[f64]) -> f64 {
    abundances.iter().filter(|&&x| x > 0.0).count() as f64
}

/// Chao1 richness `S_obs + f1(f1-1) / (2(f2+1))`.
///
/// Singletons and doubletons are features with abundance exactly 1 and 2.
pub fn chao1(abundances: &[f64]) -> f64 {
    let s_obs = observed(abundances);
    let f1 = abundances.iter().filter(|&&x| x == 1.0).count() as f64;
    let f2 = abundances.iter().filter(|&&x| x == 2.0).count() as f64;
    s_obs + f1 * (f1 - 1.0) / (2.0 * (f2 + 1.0))
}
