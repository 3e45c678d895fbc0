//! Rarefaction curves and sequencing-depth recommendation.

use super::hurlbert::SampleCounts;
use crate::config::RarefactionConfig;
use crate::data::FeatureTable;
use crate::error::{DiversityError, Result};
use crate::test::describe::{mean, median};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Expected richness at one depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub depth: u64,
    pub expected: f64,
}

/// State of a sample at the recommended depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthStatus {
    /// Local slope already below the saturation threshold.
    Saturated,
    /// Still gaining features at the recommended depth, or no local slope
    /// can be measured there (only one evaluable point).
    Unsaturated,
    /// Fewer reads than the recommended depth.
    InsufficientDepth,
}

/// Rarefaction curve of one sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleCurve {
    pub sample_id: String,
    /// Total reads.
    pub total: u64,
    /// Features observed at full depth.
    pub observed: usize,
    /// Points at every requested depth not above `total`.
    pub points: Vec<CurvePoint>,
    /// `1 - min(|E_last - E_prev| / E_last, 1)`; 0 with fewer than two points.
    pub saturation: f64,
    /// First depth reaching the plateau fraction of the sample's maximum.
    pub plateau_depth: Option<u64>,
    /// Status at the recommended depth.
    pub status: DepthStatus,
    /// Local slope at the recommended depth, when it can be evaluated.
    pub slope_at_recommended: Option<f64>,
}

impl SampleCurve {
    /// Local slope at point `k`: forward difference, backward at the last point.
    fn local_slope(&self, k: usize) -> Option<f64> {
        let p = &self.points;
        if k + 1 < p.len() {
            Some(slope(p[k], p[k + 1]))
        } else if k >= 1 && k < p.len() {
            Some(slope(p[k - 1], p[k]))
        } else {
            None
        }
    }

    /// Expected richness at a depth, if evaluated.
    pub fn expected_at(&self, depth: u64) -> Option<f64> {
        self.points.iter().find(|p| p.depth == depth).map(|p| p.expected)
    }
}

fn slope(a: CurvePoint, b: CurvePoint) -> f64 {
    (b.expected - a.expected) / (b.depth - a.depth) as f64
}

/// Where the averaged curve flattens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthRecommendation {
    /// Recommended depth `d*`.
    pub depth: u64,
    /// Largest mean local slope across depths.
    pub max_mean_slope: f64,
    /// `saturation_fraction * max_mean_slope`.
    pub slope_threshold: f64,
    /// Whether the mean slope actually dropped below the threshold.
    pub plateau_reached: bool,
    /// Samples with at least `depth` reads.
    pub samples_retained: usize,
    /// Samples with fewer than `depth` reads.
    pub samples_insufficient: usize,
}

/// Curves of every sample plus the recommended depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarefactionCurve {
    /// Depths in ascending order.
    pub depths: Vec<u64>,
    /// Mean local slope at each depth over the samples evaluable there.
    pub mean_slopes: Vec<Option<f64>>,
    pub samples: Vec<SampleCurve>,
    pub recommended: DepthRecommendation,
}

/// Aggregate view of a rarefaction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarefactionSummary {
    pub n_samples: usize,
    pub min_depth: u64,
    pub max_depth: u64,
    pub mean_saturation: f64,
    pub median_saturation: f64,
    /// Samples whose saturation exceeds the configured cut-off.
    pub samples_saturated: usize,
    pub recommended_depth: u64,
    pub samples_retained: usize,
    pub samples_insufficient: usize,
}

impl RarefactionCurve {
    /// Curve of one sample.
    pub fn sample(&self, sample_id: &str) -> Option<&SampleCurve> {
        self.samples.iter().find(|s| s.sample_id == sample_id)
    }

    /// Samples with fewer reads than the recommended depth.
    pub fn insufficient_samples(&self) -> Vec<&str> {
        self.samples
            .iter()
            .filter(|s| s.status == DepthStatus::InsufficientDepth)
            .map(|s| s.sample_id.as_str())
            .collect()
    }

    /// Summarize saturation and retention.
    pub fn summary(&self, config: &RarefactionConfig) -> RarefactionSummary {
        let saturations: Vec<f64> = self.samples.iter().map(|s| s.saturation).collect();
        RarefactionSummary {
            n_samples: self.samples.len(),
            min_depth: self.depths.first().copied().unwrap_or(0),
            max_depth: self.depths.last().copied().unwrap_or(0),
            mean_saturation: mean(&saturations),
            median_saturation: median(&saturations),
            samples_saturated: saturations
                .iter()
                .filter(|&&s| s > config.saturation_cutoff)
                .count(),
            recommended_depth: self.recommended.depth,
            samples_retained: self.recommended.samples_retained,
            samples_insufficient: self.recommended.samples_insufficient,
        }
    }
}

/// Geometric progression from 1 to `max_depth` with `steps` points, rounded
/// and deduplicated.
pub fn default_depths(max_depth: u64, steps: usize) -> Vec<u64> {
    if max_depth <= 1 || steps <= 1 {
        return vec![max_depth.max(1)];
    }
    let ln_max = (max_depth as f64).ln();
    let mut depths: Vec<u64> = (0..steps)
        .map(|k| {
            let d = (ln_max * k as f64 / (steps - 1) as f64).exp().round() as u64;
            d.clamp(1, max_depth)
        })
        .collect();
    // The last point must be exactly the maximum
    if let Some(last) = depths.last_mut() {
        *last = max_depth;
    }
    depths.dedup();
    depths
}

/// Build rarefaction curves for every sample of `table`.
///
/// With `depths = None` a default progression up to the smallest nonzero
/// sample total is used. Samples are evaluated only at depths not above their
/// own total.
///
/// A sample that reaches the recommended depth but has a single evaluable
/// point has no local slope; it is reported as `Unsaturated` with
/// `slope_at_recommended = None`, since a plateau cannot be shown.
///
/// # Errors
/// * `MalformedInput` for non-integer abundances
/// * `InvalidParameter` for an empty depth list
/// * `EmptySample` when every sample has zero reads
#[instrument(skip(table, depths, config), fields(n_samples = table.n_samples()))]
pub fn analyze_rarefaction(
    table: &FeatureTable,
    depths: Option<&[u64]>,
    config: &RarefactionConfig,
) -> Result<RarefactionCurve> {
    let counts: Vec<SampleCounts> = (0..table.n_samples())
        .into_par_iter()
        .map(|i| SampleCounts::from_abundances(&table.sample_ids()[i], &table.sample_nonzero(i)))
        .collect::<Result<Vec<_>>>()?;

    let min_nonzero = counts
        .iter()
        .map(|c| c.total)
        .filter(|&t| t > 0)
        .min()
        .ok_or_else(|| DiversityError::EmptySample {
            sample_id: table.sample_ids().first().cloned().unwrap_or_default(),
        })?;

    let depths: Vec<u64> = match depths {
        Some(supplied) => {
            if supplied.is_empty() {
                return Err(DiversityError::InvalidParameter(
                    "Depth list must not be empty".to_string(),
                ));
            }
            let mut sorted = supplied.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            sorted
        }
        None => default_depths(min_nonzero, config.depth_steps),
    };

    debug!(n_depths = depths.len(), min_depth = depths[0], "rarefaction depths");

    let mut samples: Vec<SampleCurve> = counts
        .par_iter()
        .enumerate()
        .map(|(i, c)| build_curve(&table.sample_ids()[i], c, &depths, config))
        .collect::<Result<Vec<_>>>()?;

    // Mean local slope per depth over the samples evaluable there
    let mean_slopes: Vec<Option<f64>> = (0..depths.len())
        .map(|k| {
            let slopes: Vec<f64> = samples.iter().filter_map(|s| s.local_slope(k)).collect();
            if slopes.is_empty() {
                None
            } else {
                Some(mean(&slopes))
            }
        })
        .collect();

    let max_mean_slope = mean_slopes
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    let (k_star, slope_threshold, plateau_reached) = if !max_mean_slope.is_finite() {
        // Single depth: no slope can be measured
        (0, 0.0, false)
    } else if max_mean_slope <= 0.0 {
        (0, 0.0, true)
    } else {
        let threshold = config.saturation_fraction * max_mean_slope;
        match mean_slopes
            .iter()
            .position(|s| matches!(s, Some(v) if *v < threshold))
        {
            Some(k) => (k, threshold, true),
            None => (depths.len() - 1, threshold, false),
        }
    };
    let recommended_depth = depths[k_star];

    for sample in samples.iter_mut() {
        if sample.total < recommended_depth {
            sample.status = DepthStatus::InsufficientDepth;
            continue;
        }
        let slope = sample.local_slope(k_star);
        sample.slope_at_recommended = slope;
        sample.status = match slope {
            Some(s) if s <= 0.0 || s < slope_threshold => DepthStatus::Saturated,
            _ => DepthStatus::Unsaturated,
        };
    }

    let samples_insufficient = samples
        .iter()
        .filter(|s| s.status == DepthStatus::InsufficientDepth)
        .count();
    if samples_insufficient > 0 {
        warn!(
            samples_insufficient,
            depth = recommended_depth,
            "samples below recommended depth"
        );
    }

    Ok(RarefactionCurve {
        recommended: DepthRecommendation {
            depth: recommended_depth,
            max_mean_slope: if max_mean_slope.is_finite() { max_mean_slope } else { 0.0 },
            slope_threshold,
            plateau_reached,
            samples_retained: samples.len() - samples_insufficient,
            samples_insufficient,
        },
        depths,
        mean_slopes,
        samples,
    })
}

fn build_curve(
    sample_id: &str,
    counts: &SampleCounts,
    depths: &[u64],
    config: &RarefactionConfig,
) -> Result<SampleCurve> {
    let mut points = Vec::with_capacity(depths.len());
    for &depth in depths {
        match counts.expected_richness(depth)? {
            Some(expected) => points.push(CurvePoint { depth, expected }),
            // Depths are ascending, so every later one is above the total too
            None => break,
        }
    }

    let saturation = match points.as_slice() {
        [.., prev, last] => {
            let change = if last.expected > 0.0 {
                (last.expected - prev.expected).abs() / last.expected
            } else {
                0.0
            };
            1.0 - change.min(1.0)
        }
        _ => 0.0,
    };

    let max_expected = points.iter().map(|p| p.expected).fold(0.0f64, f64::max);
    let plateau_depth = points
        .iter()
        .find(|p| p.expected >= config.plateau_fraction * max_expected)
        .map(|p| p.depth);

    Ok(SampleCurve {
        sample_id: sample_id.to_string(),
        total: counts.total,
        observed: counts.observed(),
        points,
        saturation,
        plateau_depth,
        status: DepthStatus::Unsaturated,
        slope_at_recommended: None,
    })
}
