//! Alpha diversity profiles and optional group comparison.

use super::metrics::{AlphaMetric, Interpretation};
use crate::config::ComparisonConfig;
use crate::data::FeatureTable;
use crate::error::Result;
use crate::test::{compare, ComparisonResult, SummaryStats, TestKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Metric value of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleValue {
    pub sample_id: String,
    pub value: f64,
}

/// One alpha metric evaluated for every sample, in table order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversityProfile {
    /// Metric that was computed.
    pub metric: AlphaMetric,
    /// Per-sample values in table sample order.
    pub values: Vec<SampleValue>,
}

impl DiversityProfile {
    /// Value of one sample.
    pub fn get(&self, sample_id: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|v| v.sample_id == sample_id)
            .map(|v| v.value)
    }

    /// Values keyed by sample id.
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .map(|v| (v.sample_id.clone(), v.value))
            .collect()
    }

    /// Values in sample order.
    pub fn raw_values(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.value).collect()
    }

    /// Descriptive statistics across samples.
    pub fn summary(&self) -> Option<SummaryStats> {
        SummaryStats::from_values(&self.raw_values())
    }

    /// Qualitative reading of the profile mean.
    pub fn interpretation(&self) -> Option<Interpretation> {
        self.summary().map(|s| self.metric.interpret(s.mean))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parameters of an alpha diversity request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlphaOptions {
    /// Metric to compute.
    pub metric: AlphaMetric,
    /// Metadata column whose groups are compared.
    #[serde(default)]
    pub group_column: Option<String>,
    /// Test used when a group column is given.
    #[serde(default)]
    pub test: TestKind,
}

impl AlphaOptions {
    pub fn new(metric: AlphaMetric) -> Self {
        Self {
            metric,
            ..Default::default()
        }
    }

    /// Compare groups of the given metadata column.
    pub fn grouped_by(mut self, column: impl Into<String>) -> Self {
        self.group_column = Some(column.into());
        self
    }

    pub fn with_test(mut self, test: TestKind) -> Self {
        self.test = test;
        self
    }
}

/// Alpha profile plus the group comparison when one was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaAnalysis {
    pub profile: DiversityProfile,
    /// Summary statistics across all samples.
    pub summary: Option<SummaryStats>,
    pub interpretation: Option<Interpretation>,
    pub comparison: Option<ComparisonResult>,
    /// Sample id -> group label used for the comparison.
    #[serde(default)]
    pub groups: BTreeMap<String, String>,
}

/// Compute an alpha metric for every sample of `table`.
///
/// Samples are evaluated in parallel; the profile keeps table order. Any
/// zero-total sample fails Shannon and Simpson with `EmptySample`.
#[instrument(skip(table), fields(n_samples = table.n_samples()))]
pub fn compute_profile(table: &FeatureTable, metric: AlphaMetric) -> Result<DiversityProfile> {
    let values = (0..table.n_samples())
        .into_par_iter()
        .map(|i| {
            let sample_id = &table.sample_ids()[i];
            let value = metric.compute(sample_id, &table.sample_nonzero(i))?;
            Ok(SampleValue {
                sample_id: sample_id.clone(),
                value,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(metric = metric.as_str(), "alpha profile computed");
    Ok(DiversityProfile { metric, values })
}

/// Compute an alpha profile and, when `options.group_column` is set, compare
/// the metric between the column's groups.
///
/// Fails with `UnknownMetadataColumn` when the column is absent or the table
/// carries no metadata.
pub fn compute_alpha(
    table: &FeatureTable,
    options: &AlphaOptions,
    config: &ComparisonConfig,
) -> Result<AlphaAnalysis> {
    // Resolve the grouping before any numeric work
    let labels = match &options.group_column {
        Some(column) => Some(table.group_labels(column)?),
        None => None,
    };

    let profile = compute_profile(table, options.metric)?;

    let (comparison, groups) = match labels {
        Some(labels) => {
            let result = compare(&profile.as_map(), &labels.labels, options.test, config)?
                .with_metric(options.metric.as_str());
            (Some(result), labels.labels)
        }
        None => (None, BTreeMap::new()),
    };

    Ok(AlphaAnalysis {
        summary: profile.summary(),
        interpretation: profile.interpretation(),
        profile,
        comparison,
        groups,
    })
}
