//! Taxonomic composition from QIIME-style lineage strings.
//!
//! Lineages look like `k__Bacteria; p__Firmicutes; c__Bacilli`. A feature
//! whose lineage has no (or an empty) entry at the requested rank is counted
//! as `Unassigned`.

use crate::data::FeatureTable;
use crate::error::{DiversityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Label for features without a name at the requested rank.
pub const UNASSIGNED: &str = "Unassigned";

/// Taxonomic rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxonomicRank {
    Kingdom,
    #[default]
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl TaxonomicRank {
    /// QIIME lineage prefix, e.g. `p__`.
    pub fn prefix(&self) -> &'static str {
        match self {
            TaxonomicRank::Kingdom => "k__",
            TaxonomicRank::Phylum => "p__",
            TaxonomicRank::Class => "c__",
            TaxonomicRank::Order => "o__",
            TaxonomicRank::Family => "f__",
            TaxonomicRank::Genus => "g__",
            TaxonomicRank::Species => "s__",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomicRank::Kingdom => "Kingdom",
            TaxonomicRank::Phylum => "Phylum",
            TaxonomicRank::Class => "Class",
            TaxonomicRank::Order => "Order",
            TaxonomicRank::Family => "Family",
            TaxonomicRank::Genus => "Genus",
            TaxonomicRank::Species => "Species",
        }
    }
}

impl fmt::Display for TaxonomicRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxonomicRank {
    type Err = DiversityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kingdom" | "domain" | "k" => Ok(TaxonomicRank::Kingdom),
            "phylum" | "p" => Ok(TaxonomicRank::Phylum),
            "class" | "c" => Ok(TaxonomicRank::Class),
            "order" | "o" => Ok(TaxonomicRank::Order),
            "family" | "f" => Ok(TaxonomicRank::Family),
            "genus" | "g" => Ok(TaxonomicRank::Genus),
            "species" | "s" => Ok(TaxonomicRank::Species),
            other => Err(DiversityError::InvalidParameter(format!(
                "Unknown taxonomic rank '{}'",
                other
            ))),
        }
    }
}

/// Taxon name at `rank`, or [`UNASSIGNED`].
pub fn extract_taxon(lineage: &str, rank: TaxonomicRank) -> String {
    let prefix = rank.prefix();
    lineage
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix(prefix))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNASSIGNED)
        .to_string()
}

/// Number of features assigned to one taxon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonCount {
    pub taxon: String,
    pub count: usize,
    /// Share of all features, in percent.
    pub percentage: f64,
}

/// Most frequent taxa at one rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomySummary {
    pub rank: TaxonomicRank,
    pub total_features: usize,
    /// Ordered by descending count, then name.
    pub top_taxa: Vec<TaxonCount>,
}

/// Per-sample abundance of the top taxa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyComposition {
    pub rank: TaxonomicRank,
    pub sample_ids: Vec<String>,
    /// Top taxa, same order as `abundances`.
    pub taxa: Vec<String>,
    /// `abundances[t][s]`: summed abundance of taxon `t` in sample `s`.
    pub abundances: Vec<Vec<f64>>,
}

/// Taxa ordered by descending feature count, ties by name.
fn ranked_taxa<'a>(taxa: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for taxon in taxa {
        *counts.entry(taxon).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(t, c)| (t.to_string(), c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Count features per taxon at `rank` and keep the `top_n` most frequent.
pub fn summarize_taxonomy(
    lineages: &BTreeMap<String, String>,
    rank: TaxonomicRank,
    top_n: usize,
) -> Result<TaxonomySummary> {
    if top_n == 0 {
        return Err(DiversityError::InvalidParameter("top_n must be at least 1".to_string()));
    }
    let taxa: Vec<String> = lineages.values().map(|l| extract_taxon(l, rank)).collect();
    let total = taxa.len();
    let top_taxa = ranked_taxa(taxa.iter().map(String::as_str))
        .into_iter()
        .take(top_n)
        .map(|(taxon, count)| TaxonCount {
            percentage: count as f64 / total as f64 * 100.0,
            taxon,
            count,
        })
        .collect();

    Ok(TaxonomySummary {
        rank,
        total_features: total,
        top_taxa,
    })
}

/// Sum abundances per sample for the `top_n` taxa with the most features.
///
/// Features of `table` without a lineage count as [`UNASSIGNED`].
pub fn aggregate_by_taxon(
    table: &FeatureTable,
    lineages: &BTreeMap<String, String>,
    rank: TaxonomicRank,
    top_n: usize,
) -> Result<TaxonomyComposition> {
    if top_n == 0 {
        return Err(DiversityError::InvalidParameter("top_n must be at least 1".to_string()));
    }
    let feature_taxa: Vec<String> = table
        .feature_ids()
        .iter()
        .map(|fid| {
            lineages
                .get(fid)
                .map(|l| extract_taxon(l, rank))
                .unwrap_or_else(|| UNASSIGNED.to_string())
        })
        .collect();

    let taxa: Vec<String> = ranked_taxa(feature_taxa.iter().map(String::as_str))
        .into_iter()
        .take(top_n)
        .map(|(t, _)| t)
        .collect();
    let position: HashMap<&str, usize> = taxa.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();

    let n_samples = table.n_samples();
    let mut abundances = vec![vec![0.0; n_samples]; taxa.len()];
    for (sample, row_vec) in table.data().outer_iterator().enumerate() {
        for (feature, &val) in row_vec.iter() {
            if let Some(&t) = position.get(feature_taxa[feature].as_str()) {
                abundances[t][sample] += val;
            }
        }
    }

    Ok(TaxonomyComposition {
        rank,
        sample_ids: table.sample_ids().to_vec(),
        taxa,
        abundances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_lineages() -> BTreeMap<String, String> {
        [
            ("f1", "k__Bacteria; p__Firmicutes; c__Bacilli"),
            ("f2", "k__Bacteria; p__Firmicutes; c__Clostridia"),
            ("f3", "k__Bacteria; p__Bacteroidetes; c__"),
            ("f4", "k__Bacteria"),
        ]
        .into_iter()
        .map(|(f, l)| (f.to_string(), l.to_string()))
        .collect()
    }

    #[test]
    fn test_extract_taxon() {
        let lineage = "k__Bacteria; p__Firmicutes; c__";
        assert_eq!(extract_taxon(lineage, TaxonomicRank::Phylum), "Firmicutes");
        assert_eq!(extract_taxon(lineage, TaxonomicRank::Class), UNASSIGNED);
        assert_eq!(extract_taxon(lineage, TaxonomicRank::Genus), UNASSIGNED);
        assert_eq!(extract_taxon("", TaxonomicRank::Kingdom), UNASSIGNED);
    }

    #[test]
    fn test_summarize() {
        let summary = summarize_taxonomy(&create_test_lineages(), TaxonomicRank::Phylum, 10).unwrap();
        assert_eq!(summary.total_features, 4);
        assert_eq!(summary.top_taxa[0].taxon, "Firmicutes");
        assert_eq!(summary.top_taxa[0].count, 2);
        assert_eq!(summary.top_taxa[0].percentage, 50.0);
        // Ties broken by name
        assert_eq!(summary.top_taxa[1].taxon, "Bacteroidetes");
        assert_eq!(summary.top_taxa[2].taxon, UNASSIGNED);

        let top1 = summarize_taxonomy(&create_test_lineages(), TaxonomicRank::Phylum, 1).unwrap();
        assert_eq!(top1.top_taxa.len(), 1);
    }

    #[test]
    fn test_aggregate_by_taxon() {
        let table = FeatureTable::from_rows(
            vec!["s1".into(), "s2".into()],
            vec!["f1".into(), "f2".into(), "f3".into(), "f5".into()],
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![0.0, 5.0, 0.0, 1.0]],
        )
        .unwrap();
        let comp = aggregate_by_taxon(&table, &create_test_lineages(), TaxonomicRank::Phylum, 2).unwrap();
        assert_eq!(comp.taxa, vec!["Firmicutes", "Bacteroidetes"]);
        assert_eq!(comp.abundances[0], vec![3.0, 5.0]);
        assert_eq!(comp.abundances[1], vec![3.0, 0.0]);
    }

    #[test]
    fn test_parse_rank() {
        assert_eq!("genus".parse::<TaxonomicRank>().unwrap(), TaxonomicRank::Genus);
        assert!("strain".parse::<TaxonomicRank>().is_err());
    }
}
