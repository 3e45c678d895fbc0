//! Canonical feature table and sample metadata.

mod feature_table;
mod metadata;

pub use feature_table::FeatureTable;
pub use metadata::{GroupLabels, Metadata, Variable, VariableType};
