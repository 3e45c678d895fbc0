//! Dispatch of analysis requests to the analyzers.

use super::request::{AnalysisRequest, RequestBatch};
use crate::alpha::{compute_alpha, AlphaOptions};
use crate::beta::{
    analyze_beta, analyze_precomputed, compute_distances, BetaOptions, DistanceMatrix,
    DistanceStats,
};
use crate::config::EngineConfig;
use crate::data::{FeatureTable, Metadata};
use crate::error::{DiversityError, Result};
use crate::rarefaction::{analyze_rarefaction, RarefactionCurve, RarefactionSummary};
use crate::taxonomy::{aggregate_by_taxon, summarize_taxonomy};
use crate::test::compare;
use crate::viz::{VisualizationSpec, Visualize};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

/// Result of one request: structured data plus its chart.
///
/// Both fields are always serialized; `visualization_spec` is `null` when no
/// chart applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub data: serde_json::Value,
    pub visualization_spec: Option<VisualizationSpec>,
}

impl AnalysisResponse {
    fn from_result<T: Serialize + Visualize>(result: &T, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_value(result)?,
            visualization_spec: Some(result.visualize(&config.visualization)),
        })
    }
}

#[derive(Serialize)]
struct DistancesData<'a> {
    #[serde(flatten)]
    matrix: &'a DistanceMatrix,
    stats: Option<DistanceStats>,
}

#[derive(Serialize)]
struct RarefactionData<'a> {
    #[serde(flatten)]
    curve: &'a RarefactionCurve,
    summary: RarefactionSummary,
}

/// Run one request against `table`.
///
/// The configuration is validated first, so values built in code get the
/// same checks as YAML-loaded ones.
pub fn run_request(
    table: &FeatureTable,
    request: &AnalysisRequest,
    config: &EngineConfig,
) -> Result<AnalysisResponse> {
    config.validate()?;
    dispatch(table, request, config)
}

/// PCoA response for a caller-supplied distance matrix.
///
/// Samples are coloured by `group_column` read from `metadata`.
pub fn run_precomputed(
    distances: DistanceMatrix,
    axes: usize,
    group_column: Option<&str>,
    metadata: Option<&Metadata>,
    config: &EngineConfig,
) -> Result<AnalysisResponse> {
    config.validate()?;
    let analysis = analyze_precomputed(distances, axes, group_column, metadata, &config.ordination)?;
    AnalysisResponse::from_result(&analysis, config)
}

fn dispatch(
    table: &FeatureTable,
    request: &AnalysisRequest,
    config: &EngineConfig,
) -> Result<AnalysisResponse> {
    let _span = info_span!("request", analysis = request.name()).entered();
    debug!(?request, "running request");

    match request {
        AnalysisRequest::Alpha {
            metric,
            group_column,
            test,
        } => {
            let options = AlphaOptions {
                metric: *metric,
                group_column: group_column.clone(),
                test: test.unwrap_or_default(),
            };
            let analysis = compute_alpha(table, &options, &config.comparison)?;
            AnalysisResponse::from_result(&analysis, config)
        }
        AnalysisRequest::Beta {
            metric,
            axes,
            group_column,
        } => {
            let options = BetaOptions {
                metric: *metric,
                axes: *axes,
                group_column: group_column.clone(),
            };
            let analysis = analyze_beta(table, &options, &config.ordination)?;
            AnalysisResponse::from_result(&analysis, config)
        }
        AnalysisRequest::Ordination {
            sample_ids,
            distances,
            axes,
            group_column,
        } => {
            let matrix = DistanceMatrix::from_precomputed(sample_ids.clone(), distances.clone())?;
            let analysis = analyze_precomputed(
                matrix,
                *axes,
                group_column.as_deref(),
                table.metadata(),
                &config.ordination,
            )?;
            AnalysisResponse::from_result(&analysis, config)
        }
        AnalysisRequest::Distances { metric } => {
            let matrix = compute_distances(table, *metric)?;
            let data = DistancesData {
                matrix: &matrix,
                stats: matrix.stats(),
            };
            Ok(AnalysisResponse {
                data: serde_json::to_value(&data)?,
                visualization_spec: Some(matrix.visualize(&config.visualization)),
            })
        }
        AnalysisRequest::Rarefaction { depths } => {
            let curve = analyze_rarefaction(table, depths.as_deref(), &config.rarefaction)?;
            let data = RarefactionData {
                curve: &curve,
                summary: curve.summary(&config.rarefaction),
            };
            Ok(AnalysisResponse {
                data: serde_json::to_value(&data)?,
                visualization_spec: Some(curve.visualize(&config.visualization)),
            })
        }
        AnalysisRequest::Compare {
            values,
            group_column,
            test,
        } => {
            let labels = table.group_labels(group_column)?;
            let result = compare(values, &labels.labels, *test, &config.comparison)?;
            AnalysisResponse::from_result(&result, config)
        }
        AnalysisRequest::Taxonomy {
            lineages,
            rank,
            top_n,
            per_sample,
        } => {
            let lineages = lineages.as_ref().unwrap_or_else(|| table.lineages());
            if lineages.is_empty() {
                return Err(DiversityError::MalformedInput(
                    "No taxonomy lineages supplied or attached to the table".to_string(),
                ));
            }
            if *per_sample {
                let composition = aggregate_by_taxon(table, lineages, *rank, *top_n)?;
                AnalysisResponse::from_result(&composition, config)
            } else {
                let summary = summarize_taxonomy(lineages, *rank, *top_n)?;
                AnalysisResponse::from_result(&summary, config)
            }
        }
    }
}

/// Run independent requests in parallel.
///
/// Results are returned in request order; one failing request does not affect
/// the others. An invalid configuration fails every request.
pub fn run_batch(
    table: &FeatureTable,
    requests: &[AnalysisRequest],
    config: &EngineConfig,
) -> Vec<Result<AnalysisResponse>> {
    if let Err(e) = config.validate() {
        let message = e.to_string();
        return requests
            .iter()
            .map(|_| Err(DiversityError::InvalidParameter(message.clone())))
            .collect();
    }
    requests
        .par_iter()
        .map(|request| dispatch(table, request, config))
        .collect()
}

impl RequestBatch {
    /// Run every request of the batch.
    pub fn run(&self, table: &FeatureTable, config: &EngineConfig) -> Vec<Result<AnalysisResponse>> {
        debug!(batch = %self.name, n_requests = self.requests.len(), "running batch");
        run_batch(table, &self.requests, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alpha::AlphaMetric;
    use crate::beta::DistanceMetric;
    use crate::data::Metadata;
    use crate::taxonomy::TaxonomicRank;
    use crate::test::TestKind;
    use std::collections::BTreeMap;

    fn create_test_table() -> FeatureTable {
        let table = FeatureTable::from_rows(
            vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()],
            vec!["f1".into(), "f2".into(), "f3".into()],
            vec![
                vec![10.0, 0.0, 0.0],
                vec![8.0, 2.0, 0.0],
                vec![0.0, 5.0, 5.0],
                vec![0.0, 4.0, 6.0],
            ],
        )
        .unwrap();
        let metadata = Metadata::from_groups(
            "group",
            [("s1", "A"), ("s2", "A"), ("s3", "B"), ("s4", "B")],
        );
        table.with_metadata(metadata).unwrap()
    }

    #[test]
    fn test_response_has_both_fields() {
        let table = create_test_table();
        let response = run_request(
            &table,
            &AnalysisRequest::alpha(AlphaMetric::Shannon),
            &EngineConfig::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&response).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("data"));
        assert!(obj.contains_key("visualization_spec"));
        assert_eq!(json["data"]["profile"]["metric"], "shannon");
    }

    #[test]
    fn test_distances_and_rarefaction_payloads() {
        let table = create_test_table();
        let config = EngineConfig::default();

        let response = run_request(
            &table,
            &AnalysisRequest::Distances {
                metric: DistanceMetric::Jaccard,
            },
            &config,
        )
        .unwrap();
        assert_eq!(response.data["metric"], "jaccard");
        assert_eq!(response.data["stats"]["n_pairs"], 6);

        let response = run_request(&table, &AnalysisRequest::rarefaction(None), &config).unwrap();
        assert!(response.data["recommended"]["depth"].is_u64());
        assert_eq!(response.data["summary"]["n_samples"], 4);
    }

    #[test]
    fn test_compare_request() {
        let table = create_test_table();
        let values: BTreeMap<String, f64> = [("s1", 1.0), ("s2", 2.0), ("s3", 3.0), ("s4", 4.0)]
            .iter()
            .map(|(s, v)| (s.to_string(), *v))
            .collect();
        let request = AnalysisRequest::Compare {
            values,
            group_column: "group".to_string(),
            test: TestKind::MannWhitney,
        };
        let response = run_request(&table, &request, &EngineConfig::default()).unwrap();
        assert_eq!(response.data["test"], "mann_whitney");
        assert_eq!(response.data["exact"], true);
    }

    #[test]
    fn test_taxonomy_without_lineages() {
        let table = create_test_table();
        let request = AnalysisRequest::Taxonomy {
            lineages: None,
            rank: TaxonomicRank::Phylum,
            top_n: 10,
            per_sample: false,
        };
        let err = run_request(&table, &request, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, DiversityError::MalformedInput(_)));
    }

    #[test]
    fn test_ordination_request_end_to_end() {
        let table = create_test_table();
        let request = AnalysisRequest::from_json(
            r#"{
                "analysis": "ordination",
                "sample_ids": ["s1", "s2", "s3", "s4"],
                "distances": [
                    [0.0, 0.2, 1.0, 1.0],
                    [0.2, 0.0, 0.8, 0.84],
                    [1.0, 0.8, 0.0, 0.1],
                    [1.0, 0.84, 0.1, 0.0]
                ],
                "group_column": "group"
            }"#,
        )
        .unwrap();
        let response = run_request(&table, &request, &EngineConfig::default()).unwrap();
        assert_eq!(response.data["distances"]["metric"], "precomputed");
        assert_eq!(response.data["groups"]["s3"], "B");
        assert_eq!(response.data["ordination"]["requested_axes"], 2);

        let spec = response.visualization_spec.unwrap();
        assert_eq!(spec.kind, crate::viz::ChartKind::Scatter);
        assert_eq!(spec.traces.len(), 2);
    }

    #[test]
    fn test_ordination_request_rejects_bad_matrix() {
        let request = AnalysisRequest::Ordination {
            sample_ids: vec!["s1".into(), "s2".into()],
            distances: vec![vec![0.0, 0.3], vec![0.4, 0.0]],
            axes: 2,
            group_column: None,
        };
        let err = run_request(&create_test_table(), &request, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, DiversityError::MalformedInput(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let table = create_test_table();
        let mut config = EngineConfig::default();
        config.comparison.significance_level = 2.0;

        let err = run_request(&table, &AnalysisRequest::alpha(AlphaMetric::Shannon), &config).unwrap_err();
        assert!(matches!(err, DiversityError::InvalidParameter(_)));

        let requests = vec![
            AnalysisRequest::alpha(AlphaMetric::Shannon),
            AnalysisRequest::rarefaction(None),
        ];
        let results = run_batch(&table, &requests, &config);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, Err(DiversityError::InvalidParameter(_)))));
    }

    #[test]
    fn test_batch_preserves_order() {
        let table = create_test_table();
        let requests = vec![
            AnalysisRequest::alpha(AlphaMetric::Observed),
            AnalysisRequest::beta(DistanceMetric::BrayCurtis, 5),
            AnalysisRequest::beta(DistanceMetric::BrayCurtis, 2),
        ];
        let results = run_batch(&table, &requests, &EngineConfig::default());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(DiversityError::InvalidParameter(_))));
        assert!(results[2].is_ok());
    }
}
