//! Tunable parameters for every analysis.
//!
//! Configuration is an explicit value passed into each analyzer; nothing in the
//! crate reads process-wide settings. The whole tree can be round-tripped
//! through YAML.

use crate::error::{DiversityError, Result};
use serde::{Deserialize, Serialize};

/// Parameters of the rarefaction analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RarefactionConfig {
    /// Number of points in the default geometric depth progression.
    pub depth_steps: usize,
    /// A depth is past the knee once the mean local slope drops below
    /// this fraction of the maximum mean slope.
    pub saturation_fraction: f64,
    /// Fraction of a sample's maximum expected richness that counts as plateau.
    pub plateau_fraction: f64,
    /// Saturation ratio above which a sample counts as saturated in summaries.
    pub saturation_cutoff: f64,
}

impl Default for RarefactionConfig {
    fn default() -> Self {
        Self {
            depth_steps: 10,
            saturation_fraction: 0.05,
            plateau_fraction: 0.95,
            saturation_cutoff: 0.95,
        }
    }
}

/// Parameters of the PCoA engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdinationConfig {
    /// Eigenvalues with `|λ| <= eigen_tolerance * max|λ|` are treated as zero.
    pub eigen_tolerance: f64,
}

impl Default for OrdinationConfig {
    fn default() -> Self {
        Self {
            eigen_tolerance: 1e-10,
        }
    }
}

/// Largest accepted `exact_threshold`; the exact U distribution grows with
/// `(n1 * n2)^2`.
pub const MAX_EXACT_THRESHOLD: usize = 50;

/// Parameters of the statistical comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Mann-Whitney uses the exact null distribution when both groups have at
    /// most this many samples and there are no ties.
    pub exact_threshold: usize,
    /// Level used for the `significant` flag.
    pub significance_level: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 8,
            significance_level: 0.05,
        }
    }
}

/// Parameters of the visualization spec builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Maximum number of rarefaction curves drawn.
    pub max_curves: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self { max_curves: 20 }
    }
}

/// Configuration for all analyzers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rarefaction: RarefactionConfig,
    pub ordination: OrdinationConfig,
    pub comparison: ComparisonConfig,
    pub visualization: VisualizationConfig,
}

impl EngineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DiversityError::from)
    }

    /// Check that every parameter is in range.
    pub fn validate(&self) -> Result<()> {
        let r = &self.rarefaction;
        if r.depth_steps == 0 {
            return Err(DiversityError::InvalidParameter(
                "rarefaction.depth_steps must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("rarefaction.saturation_fraction", r.saturation_fraction),
            ("rarefaction.plateau_fraction", r.plateau_fraction),
            ("rarefaction.saturation_cutoff", r.saturation_cutoff),
            ("comparison.significance_level", self.comparison.significance_level),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(DiversityError::InvalidParameter(format!(
                    "{} must be in (0, 1), got {}",
                    name, value
                )));
            }
        }
        if self.comparison.exact_threshold > MAX_EXACT_THRESHOLD {
            return Err(DiversityError::InvalidParameter(format!(
                "comparison.exact_threshold must be at most {}, got {}",
                MAX_EXACT_THRESHOLD, self.comparison.exact_threshold
            )));
        }
        if !(self.ordination.eigen_tolerance >= 0.0) {
            return Err(DiversityError::InvalidParameter(
                "ordination.eigen_tolerance must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
