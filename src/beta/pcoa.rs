//! Principal Coordinates Analysis (classical multidimensional scaling).
//!
//! The squared distance matrix is double-centered into
//! `B = -1/2 J D² J` with `J = I - 11ᵗ/n`, and `B` is eigendecomposed.
//! Every eigenpair is kept in the result: axes with a positive eigenvalue are
//! [`AxisStatus::Retained`] and carry coordinates `v sqrt(λ)`, while zero or
//! negative eigenvalues (common with non-Euclidean metrics such as
//! Bray-Curtis) are [`AxisStatus::Discarded`] with zero-filled coordinates.

use super::distance::{DistanceMatrix, DistanceMetric};
use crate::config::OrdinationConfig;
use crate::error::{DiversityError, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Whether an axis contributes coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisStatus {
    /// Positive eigenvalue; coordinates are populated.
    Retained,
    /// Zero or negative eigenvalue; coordinates are all zero.
    Discarded,
}

/// One principal coordinate axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenAxis {
    /// 1-based axis number (PC1, PC2, ...).
    pub index: usize,
    /// Eigenvalue of the centered matrix.
    pub eigenvalue: f64,
    /// Share of the retained eigenvalue mass; 0 for discarded axes.
    pub proportion_explained: f64,
    pub status: AxisStatus,
    /// Coordinate of each sample, in sample order.
    pub coordinates: Vec<f64>,
}

impl EigenAxis {
    pub fn is_retained(&self) -> bool {
        self.status == AxisStatus::Retained
    }

    /// Axis title such as `PC1 (42.0%)`.
    pub fn label(&self) -> String {
        format!("PC{} ({:.1}%)", self.index, self.proportion_explained * 100.0)
    }
}

/// Fewer positive eigenvalues than requested axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegenerateOrdination {
    pub requested: usize,
    pub available: usize,
}

impl DegenerateOrdination {
    pub fn message(&self) -> String {
        format!(
            "Requested {} axes but only {} positive eigenvalues are available; remaining axes are zero-padded",
            self.requested, self.available
        )
    }
}

/// PCoA of a distance matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinationResult {
    /// Metric of the source distance matrix.
    pub metric: DistanceMetric,
    /// Sample ids in coordinate order.
    pub sample_ids: Vec<String>,
    /// Number of axes requested for display (2 or 3).
    pub requested_axes: usize,
    /// Every eigenpair, sorted by descending eigenvalue.
    pub axes: Vec<EigenAxis>,
    /// Present when fewer than `requested_axes` axes are retained.
    pub degenerate: Option<DegenerateOrdination>,
}

impl OrdinationResult {
    /// Axes with a positive eigenvalue.
    pub fn retained(&self) -> impl Iterator<Item = &EigenAxis> {
        self.axes.iter().filter(|a| a.is_retained())
    }

    /// Axes with a zero or negative eigenvalue.
    pub fn discarded(&self) -> impl Iterator<Item = &EigenAxis> {
        self.axes.iter().filter(|a| !a.is_retained())
    }

    /// The first `requested_axes` axes, the ones that are plotted.
    pub fn plotted_axes(&self) -> &[EigenAxis] {
        &self.axes[..self.requested_axes.min(self.axes.len())]
    }

    /// Plotted coordinates of one sample.
    pub fn coordinates(&self, sample: usize) -> Vec<f64> {
        self.plotted_axes()
            .iter()
            .map(|a| a.coordinates[sample])
            .collect()
    }

    /// Sum of all eigenvalues, positive and negative.
    pub fn eigenvalue_sum(&self) -> f64 {
        self.axes.iter().map(|a| a.eigenvalue).sum()
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate.is_some()
    }
}

/// Double-centered matrix `B = -1/2 J D² J`.
pub fn centered_gram(distances: &DistanceMatrix) -> DMatrix<f64> {
    let n = distances.len();
    let a = DMatrix::from_fn(n, n, |i, j| {
        let d = distances.get(i, j);
        -0.5 * d * d
    });
    let nf = n as f64;
    let row_means: Vec<f64> = (0..n).map(|i| a.row(i).iter().sum::<f64>() / nf).collect();
    let grand_mean = row_means.iter().sum::<f64>() / nf;
    // A is symmetric, so column means equal row means
    DMatrix::from_fn(n, n, |i, j| a[(i, j)] - row_means[i] - row_means[j] + grand_mean)
}

/// Run PCoA on `distances`, reporting `axes` (2 or 3) axes for display.
///
/// # Errors
/// * `InvalidParameter` when `axes` is not 2 or 3
/// * `MalformedInput` for an empty matrix
/// * `Numerical` when the eigendecomposition does not produce finite values
#[instrument(skip(distances, config), fields(n_samples = distances.len()))]
pub fn compute_ordination(
    distances: &DistanceMatrix,
    axes: usize,
    config: &OrdinationConfig,
) -> Result<OrdinationResult> {
    if axes != 2 && axes != 3 {
        return Err(DiversityError::InvalidParameter(format!(
            "Ordination axes must be 2 or 3, got {}",
            axes
        )));
    }
    let n = distances.len();
    if n == 0 {
        return Err(DiversityError::MalformedInput(
            "Cannot ordinate an empty distance matrix".to_string(),
        ));
    }

    let b = centered_gram(distances);
    let eigen = SymmetricEigen::try_new(b, f64::EPSILON, 0).ok_or_else(|| {
        DiversityError::Numerical("Eigendecomposition did not converge".to_string())
    })?;
    if eigen.eigenvalues.iter().any(|v| !v.is_finite()) {
        return Err(DiversityError::Numerical(
            "Eigendecomposition produced non-finite eigenvalues".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let max_abs = eigen.eigenvalues.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let cutoff = config.eigen_tolerance * max_abs;
    let positive_mass: f64 = eigen.eigenvalues.iter().filter(|&&v| v > cutoff).sum();

    let mut result_axes: Vec<EigenAxis> = order
        .iter()
        .enumerate()
        .map(|(k, &col)| {
            let eigenvalue = eigen.eigenvalues[col];
            if eigenvalue > cutoff && positive_mass > 0.0 {
                let mut vector: Vec<f64> = eigen.eigenvectors.column(col).iter().copied().collect();
                normalize_sign(&mut vector);
                let scale = eigenvalue.sqrt();
                EigenAxis {
                    index: k + 1,
                    eigenvalue,
                    proportion_explained: eigenvalue / positive_mass,
                    status: AxisStatus::Retained,
                    coordinates: vector.into_iter().map(|v| v * scale).collect(),
                }
            } else {
                EigenAxis {
                    index: k + 1,
                    eigenvalue,
                    proportion_explained: 0.0,
                    status: AxisStatus::Discarded,
                    coordinates: vec![0.0; n],
                }
            }
        })
        .collect();

    // Fewer samples than requested axes: pad with empty axes
    while result_axes.len() < axes {
        result_axes.push(EigenAxis {
            index: result_axes.len() + 1,
            eigenvalue: 0.0,
            proportion_explained: 0.0,
            status: AxisStatus::Discarded,
            coordinates: vec![0.0; n],
        });
    }

    let available = result_axes.iter().filter(|a| a.is_retained()).count();
    let degenerate = if available < axes {
        let diagnostic = DegenerateOrdination {
            requested: axes,
            available,
        };
        warn!(requested = axes, available, "degenerate ordination");
        Some(diagnostic)
    } else {
        None
    };

    debug!(
        retained = available,
        discarded = result_axes.len() - available,
        "ordination computed"
    );

    Ok(OrdinationResult {
        metric: distances.metric,
        sample_ids: distances.sample_ids.clone(),
        requested_axes: axes,
        axes: result_axes,
        degenerate,
    })
}

/// Flip the vector so its largest-magnitude component is positive.
fn normalize_sign(vector: &mut [f64]) {
    let mut pivot = 0.0f64;
    for &v in vector.iter() {
        if v.abs() > pivot.abs() {
            pivot = v;
        }
    }
    if pivot < 0.0 {
        for v in vector.iter_mut() {
            *v = -*v;
        }
    }
}
