//! Feature table with sparse storage for microbiome abundance data.

use super::metadata::{GroupLabels, Metadata};
use crate::error::{DiversityError, Result};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// An immutable samples × features abundance table.
///
/// Rows are samples and columns are features. Storage is CSR so that the
/// per-sample work done by every analyzer walks contiguous memory; entries that
/// are not stored read back as explicit zeros.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Sparse matrix in CSR format (samples × features)
    data: CsMat<f64>,
    /// Sample identifiers (row names)
    sample_ids: Vec<String>,
    /// Feature identifiers (column names)
    feature_ids: Vec<String>,
    /// Optional per-sample metadata used for grouping
    metadata: Option<Metadata>,
    /// Feature id -> taxonomic lineage, when the source carried one
    lineages: BTreeMap<String, String>,
}

impl FeatureTable {
    /// Create a table from a sparse matrix and identifiers.
    ///
    /// Fails with `MalformedInput` when identifiers are duplicated, the
    /// shape does not match, or any abundance is negative or non-finite.
    pub fn new(data: CsMat<f64>, sample_ids: Vec<String>, feature_ids: Vec<String>) -> Result<Self> {
        let data = if data.is_csr() { data } else { data.to_csr() };
        let (nrows, ncols) = data.shape();
        if nrows != sample_ids.len() {
            return Err(DiversityError::MalformedInput(format!(
                "Matrix has {} rows but {} sample ids were given",
                nrows,
                sample_ids.len()
            )));
        }
        if ncols != feature_ids.len() {
            return Err(DiversityError::MalformedInput(format!(
                "Matrix has {} columns but {} feature ids were given",
                ncols,
                feature_ids.len()
            )));
        }
        check_unique("sample", &sample_ids)?;
        check_unique("feature", &feature_ids)?;

        for (row, row_vec) in data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                if !val.is_finite() || val < 0.0 {
                    return Err(DiversityError::MalformedInput(format!(
                        "Invalid abundance {} for sample '{}', feature '{}'",
                        val, sample_ids[row], feature_ids[col]
                    )));
                }
            }
        }

        Ok(Self {
            data,
            sample_ids,
            feature_ids,
            metadata: None,
            lineages: BTreeMap::new(),
        })
    }

    /// Create a table from dense rows, one per sample.
    pub fn from_rows(
        sample_ids: Vec<String>,
        feature_ids: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if rows.len() != sample_ids.len() {
            return Err(DiversityError::MalformedInput(format!(
                "{} rows given for {} samples",
                rows.len(),
                sample_ids.len()
            )));
        }
        let n_features = feature_ids.len();
        let mut tri_mat = TriMat::new((rows.len(), n_features));
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(DiversityError::MalformedInput(format!(
                    "Sample '{}' has {} abundances, expected {}",
                    sample_ids[row_idx],
                    row.len(),
                    n_features
                )));
            }
            for (col_idx, &val) in row.iter().enumerate() {
                // Negative and non-finite values are stored so that `new` rejects them
                if val != 0.0 {
                    tri_mat.add_triplet(row_idx, col_idx, val);
                }
            }
        }
        Self::new(tri_mat.to_csr(), sample_ids, feature_ids)
    }

    /// Load a feature table from a QIIME-style TSV file.
    ///
    /// Expected format:
    /// - Optional comment line (`# Constructed from biom file`)
    /// - Header: feature ID header (e.g. `#OTU ID`) followed by sample IDs,
    ///   optionally ending in a `taxonomy` column
    /// - Subsequent rows: feature ID followed by one abundance per sample
    ///
    /// The file is transposed on load so that rows become samples.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut records = reader.records();

        // Skip leading single-cell comment lines
        let header = loop {
            match records.next() {
                Some(record) => {
                    let record = record?;
                    let first = record.get(0).unwrap_or("");
                    if record.len() < 2 && first.starts_with('#') {
                        continue;
                    }
                    break record;
                }
                None => {
                    return Err(DiversityError::MalformedInput("Empty TSV file".to_string()));
                }
            }
        };

        let mut sample_ids: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();
        let has_taxonomy = sample_ids
            .last()
            .map(|s| s.eq_ignore_ascii_case("taxonomy"))
            .unwrap_or(false);
        if has_taxonomy {
            sample_ids.pop();
        }
        if sample_ids.is_empty() {
            return Err(DiversityError::MalformedInput(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let n_samples = sample_ids.len();
        let expected_fields = n_samples + 1 + usize::from(has_taxonomy);

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut feature_ids: Vec<String> = Vec::new();
        let mut lineages = BTreeMap::new();

        for (row_idx, record) in records.enumerate() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            if record.len() != expected_fields {
                return Err(DiversityError::MalformedInput(format!(
                    "Row {} has {} fields, expected {}",
                    row_idx + 1,
                    record.len(),
                    expected_fields
                )));
            }

            let feature_idx = feature_ids.len();
            let feature_id = record[0].trim().to_string();

            for col_idx in 0..n_samples {
                let value_str = record[col_idx + 1].trim();
                let value: f64 = value_str.parse().map_err(|_| {
                    DiversityError::MalformedInput(format!(
                        "Invalid abundance '{}' for feature '{}', sample '{}'",
                        value_str, feature_id, sample_ids[col_idx]
                    ))
                })?;
                if value != 0.0 {
                    triplets.push((col_idx, feature_idx, value));
                }
            }
            if has_taxonomy {
                lineages.insert(feature_id.clone(), record[n_samples + 1].trim().to_string());
            }
            feature_ids.push(feature_id);
        }

        if feature_ids.is_empty() {
            return Err(DiversityError::MalformedInput("No features in TSV".to_string()));
        }

        let mut tri_mat = TriMat::new((n_samples, feature_ids.len()));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }

        let mut table = Self::new(tri_mat.to_csr(), sample_ids, feature_ids)?;
        table.lineages = lineages;
        Ok(table)
    }

    /// Attach sample metadata.
    ///
    /// Every sample of the table must have a metadata row; extra metadata rows
    /// are allowed.
    pub fn with_metadata(mut self, metadata: Metadata) -> Result<Self> {
        let missing: Vec<&str> = self
            .sample_ids
            .iter()
            .filter(|sid| !metadata.has_sample(sid))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(DiversityError::MalformedInput(format!(
                "Samples missing from metadata: {}",
                missing.join(", ")
            )));
        }
        self.metadata = Some(metadata);
        Ok(self)
    }

    /// Get the abundance at (sample, feature), returning 0 for unstored entries.
    #[inline]
    pub fn get(&self, sample: usize, feature: usize) -> f64 {
        self.data.get(sample, feature).copied().unwrap_or(0.0)
    }

    /// Number of samples (rows).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.rows()
    }

    /// Number of features (columns).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.cols()
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Attached metadata, if any.
    #[inline]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Feature lineages, empty when the source carried none.
    #[inline]
    pub fn lineages(&self) -> &BTreeMap<String, String> {
        &self.lineages
    }

    /// Get the underlying sparse matrix.
    #[inline]
    pub fn data(&self) -> &CsMat<f64> {
        &self.data
    }

    /// Dense abundance vector of one sample.
    pub fn sample_row(&self, sample: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_features()];
        if let Some(row_vec) = self.data.outer_view(sample) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Abundances of the features present (> 0) in one sample.
    pub fn sample_nonzero(&self, sample: usize) -> Vec<f64> {
        self.data
            .outer_view(sample)
            .map(|v| v.iter().map(|(_, &val)| val).filter(|&val| val > 0.0).collect())
            .unwrap_or_default()
    }

    /// Total abundance per sample (library size).
    pub fn sample_totals(&self) -> Vec<f64> {
        (0..self.n_samples())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0.0)
            })
            .collect()
    }

    /// Presence (> 0) of each feature in one sample.
    pub fn presence(&self, sample: usize) -> Vec<bool> {
        let mut present = vec![false; self.n_features()];
        if let Some(row_vec) = self.data.outer_view(sample) {
            for (col, &val) in row_vec.iter() {
                present[col] = val > 0.0;
            }
        }
        present
    }

    /// Resolve group labels for every sample from a metadata column.
    pub fn group_labels(&self, column: &str) -> Result<GroupLabels> {
        match &self.metadata {
            Some(metadata) => metadata.group_labels(column, &self.sample_ids),
            None => Err(DiversityError::UnknownMetadataColumn(column.to_string())),
        }
    }

    /// Subset the table to the specified samples (by index).
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let n_features = self.n_features();
        let mut tri_mat = TriMat::new((indices.len(), n_features));
        let mut new_sample_ids = Vec::with_capacity(indices.len());

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_samples() {
                return Err(DiversityError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_row
                )));
            }
            new_sample_ids.push(self.sample_ids[old_row].clone());
            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    tri_mat.add_triplet(new_row, col, val);
                }
            }
        }

        let mut table = Self::new(tri_mat.to_csr(), new_sample_ids, self.feature_ids.clone())?;
        table.metadata = self.metadata.clone();
        table.lineages = self.lineages.clone();
        Ok(table)
    }
}

fn check_unique(kind: &str, ids: &[String]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(DiversityError::MalformedInput(format!(
                "Duplicate {} id '{}'",
                kind, id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    fn create_test_table() -> FeatureTable {
        FeatureTable::from_rows(
            ids("S", 4),
            ids("F", 3),
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
    fn test_dimensions() {
        let table = create_test_table();
        assert_eq!(table.n_samples(), 4);
        assert_eq!(table.n_features(), 3);
    }

    #[test]
    fn test_get_values() {
        let table = create_test_table();
        assert_eq!(table.get(0, 0), 10.0);
        assert_eq!(table.get(0, 1), 0.0);
        assert_eq!(table.get(3, 2), 6.0);
    }

    #[test]
    fn test_rows_and_totals() {
        let table = create_test_table();
        assert_eq!(table.sample_row(1), vec![8.0, 2.0, 0.0]);
        assert_eq!(table.sample_nonzero(2), vec![5.0, 5.0]);
        assert_eq!(table.sample_totals(), vec![10.0, 10.0, 10.0, 10.0]);
        assert_eq!(table.presence(0), vec![true, false, false]);
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = FeatureTable::from_rows(
            vec!["S1".into(), "S1".into()],
            ids("F", 1),
            vec![vec![1.0], vec![2.0]],
        );
        assert!(matches!(result, Err(DiversityError::MalformedInput(_))));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let result = FeatureTable::from_rows(ids("S", 2), ids("F", 2), vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(result, Err(DiversityError::MalformedInput(_))));
    }

    #[test]
    fn test_rejects_negative_abundance() {
        let result = FeatureTable::from_rows(ids("S", 1), ids("F", 2), vec![vec![1.0, -2.0]]);
        assert!(matches!(result, Err(DiversityError::MalformedInput(_))));

        let result = FeatureTable::from_rows(ids("S", 1), ids("F", 1), vec![vec![f64::NAN]]);
        assert!(matches!(result, Err(DiversityError::MalformedInput(_))));
    }

    #[test]
    fn test_from_tsv_transposes() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# Constructed from biom file").unwrap();
        writeln!(file, "#OTU ID\tS1\tS2\ttaxonomy").unwrap();
        writeln!(file, "asv1\t10\t0\tk__Bacteria; p__Firmicutes").unwrap();
        writeln!(file, "asv2\t3\t7.0\tk__Bacteria; p__Bacteroidetes").unwrap();
        file.flush().unwrap();

        let table = FeatureTable::from_tsv(file.path()).unwrap();
        assert_eq!(table.sample_ids(), &["S1", "S2"]);
        assert_eq!(table.feature_ids(), &["asv1", "asv2"]);
        assert_eq!(table.sample_row(0), vec![10.0, 3.0]);
        assert_eq!(table.sample_row(1), vec![0.0, 7.0]);
        assert_eq!(
            table.lineages().get("asv2").map(String::as_str),
            Some("k__Bacteria; p__Bacteroidetes")
        );
    }

    #[test]
    fn test_from_tsv_rejects_bad_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "#OTU ID\tS1\tS2").unwrap();
        writeln!(file, "asv1\t10\tabc").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            FeatureTable::from_tsv(file.path()),
            Err(DiversityError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_with_metadata() {
        let table = create_test_table();
        let metadata = Metadata::from_groups("group", [("S1", "A"), ("S2", "A"), ("S3", "B"), ("S4", "B")]);
        let table = table.with_metadata(metadata).unwrap();

        let groups = table.group_labels("group").unwrap();
        assert_eq!(groups.levels(), vec!["A", "B"]);
        assert!(groups.unassigned.is_empty());

        assert!(matches!(
            table.group_labels("site"),
            Err(DiversityError::UnknownMetadataColumn(_))
        ));
    }

    #[test]
    fn test_with_metadata_missing_sample() {
        let table = create_test_table();
        let metadata = Metadata::from_groups("group", [("S1", "A")]);
        assert!(matches!(
            table.with_metadata(metadata),
            Err(DiversityError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_group_labels_without_metadata() {
        let table = create_test_table();
        assert!(matches!(
            table.group_labels("group"),
            Err(DiversityError::UnknownMetadataColumn(_))
        ));
    }

    #[test]
    fn test_subset_samples() {
        let table = create_test_table();
        let subset = table.subset_samples(&[1, 3]).unwrap();
        assert_eq!(subset.sample_ids(), &["S2", "S4"]);
        assert_eq!(subset.sample_row(1), vec![0.0, 4.0, 6.0]);
    }
}
