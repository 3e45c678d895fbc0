//! Beta diversity: between-sample distances and ordination.

pub mod distance;
pub mod pcoa;

pub use distance::{
    bray_curtis, compute_distances, jaccard, DistanceMatrix, DistanceMetric, DistanceStats,
};
pub use pcoa::{
    centered_gram, compute_ordination, AxisStatus, DegenerateOrdination, EigenAxis,
    OrdinationResult,
};

use crate::config::OrdinationConfig;
use crate::data::{FeatureTable, GroupLabels, Metadata};
use crate::error::{DiversityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_axes() -> usize {
    2
}

/// Parameters of a beta diversity request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaOptions {
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Number of ordination axes to display (2 or 3).
    #[serde(default = "default_axes")]
    pub axes: usize,
    /// Metadata column used to colour samples.
    #[serde(default)]
    pub group_column: Option<String>,
}

impl Default for BetaOptions {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::BrayCurtis,
            axes: default_axes(),
            group_column: None,
        }
    }
}

/// Distances, their ordination and optional sample grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaAnalysis {
    pub distances: DistanceMatrix,
    pub ordination: OrdinationResult,
    pub distance_stats: Option<DistanceStats>,
    /// Metadata column the groups were read from.
    pub group_column: Option<String>,
    /// Sample id -> group label.
    #[serde(default)]
    pub groups: BTreeMap<String, String>,
    /// Samples without a group label.
    #[serde(default)]
    pub unassigned: Vec<String>,
}

/// Distance matrix plus PCoA for `table`.
///
/// Group labels are resolved before any numeric work so that an unknown column
/// fails fast.
pub fn analyze_beta(
    table: &FeatureTable,
    options: &BetaOptions,
    config: &OrdinationConfig,
) -> Result<BetaAnalysis> {
    let labels = match &options.group_column {
        Some(column) => Some(table.group_labels(column)?),
        None => None,
    };
    let distances = compute_distances(table, options.metric)?;
    let ordination = compute_ordination(&distances, options.axes, config)?;
    let (groups, unassigned) = labels
        .map(|l| (l.labels, l.unassigned))
        .unwrap_or_default();

    Ok(BetaAnalysis {
        distance_stats: distances.stats(),
        distances,
        ordination,
        group_column: options.group_column.clone(),
        groups,
        unassigned,
    })
}

/// PCoA of a caller-supplied distance matrix.
///
/// When `group_column` is given, labels come from `metadata` for the matrix's
/// own sample ids; a missing column (or no metadata) is
/// `UnknownMetadataColumn`.
pub fn analyze_precomputed(
    distances: DistanceMatrix,
    axes: usize,
    group_column: Option<&str>,
    metadata: Option<&Metadata>,
    config: &OrdinationConfig,
) -> Result<BetaAnalysis> {
    let labels: Option<GroupLabels> = match (group_column, metadata) {
        (Some(column), Some(metadata)) => Some(metadata.group_labels(column, &distances.sample_ids)?),
        (Some(column), None) => {
            return Err(DiversityError::UnknownMetadataColumn(column.to_string()));
        }
        (None, _) => None,
    };
    let ordination = compute_ordination(&distances, axes, config)?;
    let (groups, unassigned) = labels
        .map(|l| (l.labels, l.unassigned))
        .unwrap_or_default();

    Ok(BetaAnalysis {
        distance_stats: distances.stats(),
        distances,
        ordination,
        group_column: group_column.map(str::to_string),
        groups,
        unassigned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_table() -> FeatureTable {
        FeatureTable::from_rows(
            vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()],
            vec!["f1".into(), "f2".into(), "f3".into()],
            vec![
                vec![10.0, 0.0, 0.0],
                vec![8.0, 2.0, 0.0],
                vec![0.0, 5.0, 5.0],
                vec![0.0, 4.0, 6.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_analyze_beta_with_groups() {
        let metadata = Metadata::from_groups(
            "group",
            [("s1", "A"), ("s2", "A"), ("s3", "B"), ("s4", "B")],
        );
        let table = create_test_table().with_metadata(metadata).unwrap();
        let options = BetaOptions {
            group_column: Some("group".into()),
            ..Default::default()
        };
        let analysis = analyze_beta(&table, &options, &OrdinationConfig::default()).unwrap();
        assert_eq!(analysis.groups.get("s3").map(String::as_str), Some("B"));
        assert_eq!(analysis.ordination.requested_axes, 2);
        assert_eq!(analysis.distance_stats.unwrap().n_pairs, 6);
    }

    #[test]
    fn test_group_column_without_metadata() {
        let options = BetaOptions {
            group_column: Some("group".into()),
            ..Default::default()
        };
        let err = analyze_beta(&create_test_table(), &options, &OrdinationConfig::default()).unwrap_err();
        assert!(matches!(err, DiversityError::UnknownMetadataColumn(_)));
    }

    #[test]
    fn test_precomputed_with_groups() {
        let ids: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let distances = DistanceMatrix::from_precomputed(
            ids,
            vec![
                vec![0.0, 0.1, 0.9, 0.8],
                vec![0.1, 0.0, 0.85, 0.9],
                vec![0.9, 0.85, 0.0, 0.2],
                vec![0.8, 0.9, 0.2, 0.0],
            ],
        )
        .unwrap();
        let metadata = Metadata::from_groups("site", [("a", "gut"), ("b", "gut"), ("c", "skin")]);
        let analysis = analyze_precomputed(
            distances.clone(),
            2,
            Some("site"),
            Some(&metadata),
            &OrdinationConfig::default(),
        )
        .unwrap();
        assert_eq!(analysis.distances.metric, DistanceMetric::Precomputed);
        assert_eq!(analysis.groups.len(), 3);
        assert_eq!(analysis.unassigned, vec!["d"]);
        assert_eq!(analysis.ordination.sample_ids.len(), 4);

        let err = analyze_precomputed(distances, 2, Some("site"), None, &OrdinationConfig::default())
            .unwrap_err();
        assert!(matches!(err, DiversityError::UnknownMetadataColumn(_)));
    }
}
