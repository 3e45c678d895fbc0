//! Per-sample metadata used for grouping.

use crate::error::{DiversityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// A metadata value that is categorical, continuous or missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }

    /// Group label for this value.
    ///
    /// Numeric values are rendered without a trailing `.0` so that a column
    /// of `1`, `2`, `3` groups as "1", "2", "3".
    pub fn label(&self) -> Option<String> {
        match self {
            Variable::Categorical(s) => Some(s.clone()),
            Variable::Continuous(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                Some(format!("{}", *v as i64))
            }
            Variable::Continuous(v) => Some(v.to_string()),
            Variable::Missing => None,
        }
    }

    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan") {
            Variable::Missing
        } else {
            Variable::Categorical(raw.to_string())
        }
    }
}

/// Type hint for columns when loading metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

/// Group assignment of samples resolved from one metadata column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupLabels {
    /// Column the labels were read from.
    pub column: String,
    /// Sample id -> group label.
    pub labels: BTreeMap<String, String>,
    /// Requested samples with no usable value in the column.
    pub unassigned: Vec<String>,
}

impl GroupLabels {
    /// Distinct labels in sorted order.
    pub fn levels(&self) -> Vec<String> {
        self.labels
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Label of a sample, if assigned.
    pub fn get(&self, sample_id: &str) -> Option<&str> {
        self.labels.get(sample_id).map(String::as_str)
    }
}

/// Sample metadata containing variables for each sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Type hints for each column.
    column_types: HashMap<String, VariableType>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            sample_ids: Vec::new(),
            column_names: Vec::new(),
            data: HashMap::new(),
            column_types: HashMap::new(),
        }
    }

    /// Build a single categorical column from `(sample_id, label)` pairs.
    pub fn from_groups<S, L>(column: &str, groups: impl IntoIterator<Item = (S, L)>) -> Self
    where
        S: Into<String>,
        L: Into<String>,
    {
        let mut metadata = Self::new();
        for (sample_id, label) in groups {
            metadata.insert(sample_id, column, Variable::Categorical(label.into()));
        }
        metadata
    }

    /// Set one value, registering the sample and column on first use.
    pub fn insert(&mut self, sample_id: impl Into<String>, column: &str, value: Variable) {
        let sample_id = sample_id.into();
        if !self.column_names.iter().any(|c| c == column) {
            self.column_names.push(column.to_string());
            let var_type = match value {
                Variable::Continuous(_) => VariableType::Continuous,
                _ => VariableType::Categorical,
            };
            self.column_types.insert(column.to_string(), var_type);
        }
        if !self.data.contains_key(&sample_id) {
            self.sample_ids.push(sample_id.clone());
        }
        self.data
            .entry(sample_id)
            .or_default()
            .insert(column.to_string(), value);
    }

    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Optional QIIME 2 directive rows starting with `#q2:` are skipped
    /// - Subsequent rows: sample ID followed by variable values
    ///
    /// Columns are inferred as continuous if all present values parse as
    /// numbers, otherwise categorical.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(DiversityError::MalformedInput(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();

        // First pass: collect raw values to infer types
        let mut raw_data: Vec<(String, Vec<Variable>)> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let Some(sample_id) = record.get(0).map(str::trim) else {
                continue;
            };
            if sample_id.is_empty() || sample_id.starts_with("#q2:") {
                continue;
            }
            let values: Vec<Variable> = (0..column_names.len())
                .map(|i| record.get(i + 1).map(Variable::parse).unwrap_or(Variable::Missing))
                .collect();
            raw_data.push((sample_id.to_string(), values));
        }

        if raw_data.is_empty() {
            return Err(DiversityError::MalformedInput(
                "No samples in metadata".to_string(),
            ));
        }

        let mut metadata = Self::new();
        metadata.column_names = column_names.clone();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = raw_data.iter().all(|(_, values)| match &values[col_idx] {
                Variable::Categorical(s) => s.parse::<f64>().is_ok(),
                _ => true,
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            metadata.column_types.insert(col_name.clone(), var_type);
        }

        for (sample_id, values) in raw_data {
            if metadata.data.contains_key(&sample_id) {
                return Err(DiversityError::MalformedInput(format!(
                    "Duplicate sample '{}' in metadata",
                    sample_id
                )));
            }
            let mut sample_data = HashMap::new();
            for (col_name, var) in column_names.iter().zip(values) {
                let var = match (metadata.column_types.get(col_name), var) {
                    (Some(VariableType::Continuous), Variable::Categorical(s)) => s
                        .parse::<f64>()
                        .map(Variable::Continuous)
                        .unwrap_or(Variable::Missing),
                    (_, var) => var,
                };
                sample_data.insert(col_name.clone(), var);
            }
            metadata.sample_ids.push(sample_id.clone());
            metadata.data.insert(sample_id, sample_data);
        }

        Ok(metadata)
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get a variable value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Values of one column in sample order.
    pub fn column(&self, column: &str) -> Result<Vec<(&str, &Variable)>> {
        if !self.has_column(column) {
            return Err(DiversityError::UnknownMetadataColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| {
                let value = self.get(sid, column).unwrap_or(&Variable::Missing);
                (sid.as_str(), value)
            })
            .collect())
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Get unique labels of a column in sorted order.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        Ok(self.group_labels(column, &self.sample_ids)?.levels())
    }

    /// Resolve the group label of each requested sample from `column`.
    ///
    /// Samples without a value (missing or absent from the metadata) are
    /// reported in [`GroupLabels::unassigned`].
    pub fn group_labels(&self, column: &str, sample_ids: &[String]) -> Result<GroupLabels> {
        if !self.has_column(column) {
            return Err(DiversityError::UnknownMetadataColumn(column.to_string()));
        }
        let mut labels = BTreeMap::new();
        let mut unassigned = Vec::new();
        for sid in sample_ids {
            match self.get(sid, column).and_then(Variable::label) {
                Some(label) => {
                    labels.insert(sid.clone(), label);
                }
                None => unassigned.push(sid.clone()),
            }
        }
        Ok(GroupLabels {
            column: column.to_string(),
            labels,
            unassigned,
        })
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
