//! Pairwise between-sample distances.

use crate::data::FeatureTable;
use crate::error::{DiversityError, Result};
use crate::test::describe::{mean, median, population_std};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Symmetric-matrix tolerance for externally supplied distances.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Dissimilarity between two samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `Σ|x-y| / Σ(x+y)` on abundances.
    #[default]
    BrayCurtis,
    /// `1 - |A∩B| / |A∪B|` on presence.
    Jaccard,
    /// Supplied by the caller.
    Precomputed,
}

impl DistanceMetric {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::BrayCurtis => "bray_curtis",
            DistanceMetric::Jaccard => "jaccard",
            DistanceMetric::Precomputed => "precomputed",
        }
    }

    /// Human-readable metric name.
    pub fn display_name(&self) -> &'static str {
        match self {
            DistanceMetric::BrayCurtis => "Bray-Curtis",
            DistanceMetric::Jaccard => "Jaccard",
            DistanceMetric::Precomputed => "Precomputed",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = DiversityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "bray_curtis" | "braycurtis" | "bray" => Ok(DistanceMetric::BrayCurtis),
            "jaccard" => Ok(DistanceMetric::Jaccard),
            other => Err(DiversityError::InvalidParameter(format!(
                "Unknown distance metric '{}'. Available: bray_curtis, jaccard",
                other
            ))),
        }
    }
}

/// Bray-Curtis dissimilarity; 0 when both samples are empty.
pub fn bray_curtis(x: &[f64], y: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (&a, &b) in x.iter().zip(y) {
        num += (a - b).abs();
        den += a + b;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Jaccard distance on presence; 0 when both samples are empty.
pub fn jaccard(x: &[bool], y: &[bool]) -> f64 {
    let mut intersection = 0usize;
    let mut union = 0usize;
    for (&a, &b) in x.iter().zip(y) {
        if a && b {
            intersection += 1;
        }
        if a || b {
            union += 1;
        }
    }
    if union == 0 {
        0.0
    } else {
        1.0 - intersection as f64 / union as f64
    }
}

/// Summary of the upper-triangle distances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceStats {
    /// Number of sample pairs.
    pub n_pairs: usize,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Symmetric sample × sample distance matrix with zero diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    /// Metric the distances were computed with.
    pub metric: DistanceMetric,
    /// Sample ids in row/column order.
    pub sample_ids: Vec<String>,
    /// Row-major distances.
    pub distances: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Validate a caller-supplied matrix.
    ///
    /// Rows must be square, symmetric, finite, non-negative and have a zero
    /// diagonal; otherwise `MalformedInput`.
    pub fn from_precomputed(sample_ids: Vec<String>, distances: Vec<Vec<f64>>) -> Result<Self> {
        let n = sample_ids.len();
        if distances.len() != n || distances.iter().any(|row| row.len() != n) {
            return Err(DiversityError::MalformedInput(format!(
                "Distance matrix must be {}x{} to match the sample ids",
                n, n
            )));
        }
        for i in 0..n {
            if distances[i][i] != 0.0 {
                return Err(DiversityError::MalformedInput(format!(
                    "Non-zero diagonal for sample '{}'",
                    sample_ids[i]
                )));
            }
            for j in (i + 1)..n {
                let d = distances[i][j];
                if !d.is_finite() || d < 0.0 {
                    return Err(DiversityError::MalformedInput(format!(
                        "Invalid distance {} between '{}' and '{}'",
                        d, sample_ids[i], sample_ids[j]
                    )));
                }
                if (d - distances[j][i]).abs() > SYMMETRY_TOLERANCE {
                    return Err(DiversityError::MalformedInput(format!(
                        "Distance matrix is not symmetric at '{}'/'{}'",
                        sample_ids[i], sample_ids[j]
                    )));
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = sample_ids.iter().find(|s| !seen.insert(s.as_str())) {
            return Err(DiversityError::MalformedInput(format!("Duplicate sample id '{}'", dup)));
        }

        Ok(Self {
            metric: DistanceMetric::Precomputed,
            sample_ids,
            distances,
        })
    }

    /// Load a square distance matrix TSV (QIIME `distance-matrix.tsv` layout).
    ///
    /// The header row lists sample ids after an ignored first cell; each row
    /// starts with a sample id, in the same order as the header.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let sample_ids: Vec<String> = reader
            .headers()?
            .iter()
            .skip(1)
            .map(|s| s.trim().to_string())
            .collect();

        let mut distances = Vec::with_capacity(sample_ids.len());
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let row_id = record.get(0).unwrap_or("").trim();
            let expected = sample_ids.get(distances.len()).map(String::as_str);
            if expected != Some(row_id) {
                return Err(DiversityError::MalformedInput(format!(
                    "Row '{}' does not match the header order (expected {:?})",
                    row_id, expected
                )));
            }
            let row = record
                .iter()
                .skip(1)
                .map(|raw| {
                    raw.trim().parse::<f64>().map_err(|_| {
                        DiversityError::MalformedInput(format!(
                            "Invalid distance '{}' in row '{}'",
                            raw, row_id
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            distances.push(row);
        }

        Self::from_precomputed(sample_ids, distances)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    /// Distance between two samples by index.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.distances[i][j]
    }

    /// Distance between two samples by id.
    pub fn between(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.sample_ids.iter().position(|s| s == a)?;
        let j = self.sample_ids.iter().position(|s| s == b)?;
        Some(self.distances[i][j])
    }

    /// Upper-triangle distances, row by row.
    pub fn condensed(&self) -> Vec<f64> {
        let n = self.len();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            out.extend_from_slice(&self.distances[i][i + 1..]);
        }
        out
    }

    /// Statistics over all sample pairs; `None` with fewer than two samples.
    pub fn stats(&self) -> Option<DistanceStats> {
        let values = self.condensed();
        if values.is_empty() {
            return None;
        }
        Some(DistanceStats {
            n_pairs: values.len(),
            mean: mean(&values),
            median: median(&values),
            std: population_std(&values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    /// The `n` samples nearest to `sample_id`, closest first.
    ///
    /// Equal distances keep matrix order.
    pub fn closest(&self, sample_id: &str, n: usize) -> Result<Vec<(String, f64)>> {
        let i = self
            .sample_ids
            .iter()
            .position(|s| s == sample_id)
            .ok_or_else(|| {
                DiversityError::InvalidParameter(format!("Sample '{}' not found", sample_id))
            })?;
        let mut others: Vec<(String, f64)> = self
            .sample_ids
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(j, id)| (id.clone(), self.distances[i][j]))
            .collect();
        others.sort_by(|a, b| a.1.total_cmp(&b.1));
        others.truncate(n);
        Ok(others)
    }
}

/// Compute the pairwise distance matrix of every sample in `table`.
///
/// Rows are computed in parallel and mirrored, so the result is exactly
/// symmetric with a zero diagonal.
#[instrument(skip(table), fields(n_samples = table.n_samples(), n_features = table.n_features()))]
pub fn compute_distances(table: &FeatureTable, metric: DistanceMetric) -> Result<DistanceMatrix> {
    let n = table.n_samples();
    let upper: Vec<Vec<f64>> = match metric {
        DistanceMetric::BrayCurtis => {
            let rows: Vec<Vec<f64>> = (0..n).into_par_iter().map(|i| table.sample_row(i)).collect();
            (0..n)
                .into_par_iter()
                .map(|i| ((i + 1)..n).map(|j| bray_curtis(&rows[i], &rows[j])).collect())
                .collect()
        }
        DistanceMetric::Jaccard => {
            let rows: Vec<Vec<bool>> = (0..n).into_par_iter().map(|i| table.presence(i)).collect();
            (0..n)
                .into_par_iter()
                .map(|i| ((i + 1)..n).map(|j| jaccard(&rows[i], &rows[j])).collect())
                .collect()
        }
        DistanceMetric::Precomputed => {
            return Err(DiversityError::InvalidParameter(
                "Precomputed distances cannot be computed from a table; supply the matrix in an ordination request".to_string(),
            ));
        }
    };

    let mut distances = vec![vec![0.0; n]; n];
    for (i, row) in upper.iter().enumerate() {
        for (offset, &d) in row.iter().enumerate() {
            let j = i + 1 + offset;
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }

    debug!(metric = metric.as_str(), "distance matrix computed");
    Ok(DistanceMatrix {
        metric,
        sample_ids: table.sample_ids().to_vec(),
        distances,
    })
}
