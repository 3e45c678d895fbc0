//! Analysis requests as serializable values.

use crate::alpha::AlphaMetric;
use crate::beta::DistanceMetric;
use crate::error::{DiversityError, Result};
use crate::taxonomy::TaxonomicRank;
use crate::test::TestKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_axes() -> usize {
    2
}

fn default_top_n() -> usize {
    10
}

/// One analysis to run against a feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum AnalysisRequest {
    /// Per-sample alpha metric, optionally compared between groups.
    Alpha {
        #[serde(default)]
        metric: AlphaMetric,
        #[serde(default)]
        group_column: Option<String>,
        #[serde(default)]
        test: Option<TestKind>,
    },
    /// Distance matrix and PCoA.
    Beta {
        #[serde(default)]
        metric: DistanceMetric,
        #[serde(default = "default_axes")]
        axes: usize,
        #[serde(default)]
        group_column: Option<String>,
    },
    /// PCoA of a caller-supplied distance matrix.
    Ordination {
        sample_ids: Vec<String>,
        /// Square, symmetric, row-major distances in `sample_ids` order.
        distances: Vec<Vec<f64>>,
        #[serde(default = "default_axes")]
        axes: usize,
        /// Metadata column of the table used to colour samples.
        #[serde(default)]
        group_column: Option<String>,
    },
    /// Distance matrix only.
    Distances {
        #[serde(default)]
        metric: DistanceMetric,
    },
    /// Rarefaction curves; default depths when `depths` is absent.
    Rarefaction {
        #[serde(default)]
        depths: Option<Vec<u64>>,
    },
    /// Compare caller-supplied per-sample values between metadata groups.
    Compare {
        values: BTreeMap<String, f64>,
        group_column: String,
        #[serde(default)]
        test: TestKind,
    },
    /// Taxonomic composition; table lineages are used when `lineages` is absent.
    Taxonomy {
        #[serde(default)]
        lineages: Option<BTreeMap<String, String>>,
        #[serde(default)]
        rank: TaxonomicRank,
        #[serde(default = "default_top_n")]
        top_n: usize,
        /// Per-sample stacked composition instead of the feature-count summary.
        #[serde(default)]
        per_sample: bool,
    },
}

impl AnalysisRequest {
    /// Alpha request without grouping.
    pub fn alpha(metric: AlphaMetric) -> Self {
        AnalysisRequest::Alpha {
            metric,
            group_column: None,
            test: None,
        }
    }

    /// Beta request without grouping.
    pub fn beta(metric: DistanceMetric, axes: usize) -> Self {
        AnalysisRequest::Beta {
            metric,
            axes,
            group_column: None,
        }
    }

    pub fn rarefaction(depths: Option<Vec<u64>>) -> Self {
        AnalysisRequest::Rarefaction { depths }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisRequest::Alpha { .. } => "alpha",
            AnalysisRequest::Beta { .. } => "beta",
            AnalysisRequest::Ordination { .. } => "ordination",
            AnalysisRequest::Distances { .. } => "distances",
            AnalysisRequest::Rarefaction { .. } => "rarefaction",
            AnalysisRequest::Compare { .. } => "compare",
            AnalysisRequest::Taxonomy { .. } => "taxonomy",
        }
    }

    /// Parse a request from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(DiversityError::from)
    }
}

/// A named list of requests, loadable from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBatch {
    /// Name of the batch.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Requests in execution order.
    pub requests: Vec<AnalysisRequest>,
}

impl RequestBatch {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DiversityError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DiversityError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let request = AnalysisRequest::from_json(r#"{"analysis": "beta"}"#).unwrap();
        assert_eq!(request, AnalysisRequest::beta(DistanceMetric::BrayCurtis, 2));

        let request =
            AnalysisRequest::from_json(r#"{"analysis": "alpha", "metric": "chao1", "group_column": "site"}"#)
                .unwrap();
        match request {
            AnalysisRequest::Alpha { metric, group_column, test } => {
                assert_eq!(metric, AlphaMetric::Chao1);
                assert_eq!(group_column.as_deref(), Some("site"));
                assert_eq!(test, None);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_ordination_from_json() {
        let json = r#"{"analysis": "ordination", "sample_ids": ["a", "b"], "distances": [[0, 0.5], [0.5, 0]]}"#;
        match AnalysisRequest::from_json(json).unwrap() {
            AnalysisRequest::Ordination { sample_ids, distances, axes, group_column } => {
                assert_eq!(sample_ids, vec!["a", "b"]);
                assert_eq!(distances[0][1], 0.5);
                assert_eq!(axes, 2);
                assert_eq!(group_column, None);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_unknown_analysis_rejected() {
        assert!(AnalysisRequest::from_json(r#"{"analysis": "unifrac"}"#).is_err());
    }

    #[test]
    fn test_batch_yaml_roundtrip() {
        let batch = RequestBatch {
            name: "overview".to_string(),
            description: None,
            requests: vec![
                AnalysisRequest::alpha(AlphaMetric::Shannon),
                AnalysisRequest::rarefaction(Some(vec![10, 100])),
                AnalysisRequest::Taxonomy {
                    lineages: None,
                    rank: TaxonomicRank::Genus,
                    top_n: 5,
                    per_sample: true,
                },
            ],
        };
        let yaml = batch.to_yaml().unwrap();
        let loaded = RequestBatch::from_yaml(&yaml).unwrap();
        assert_eq!(loaded, batch);
    }
}
