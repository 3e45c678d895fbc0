//! Microbiome Diversity Analysis Library
//!
//! Pure, stateless numeric analyses over a sample-by-feature abundance table,
//! each paired with a renderer-agnostic visualization spec.
//!
//! # Overview
//!
//! The library is organized into independent modules:
//!
//! - **data**: Core data structures (FeatureTable, Metadata)
//! - **alpha**: Within-sample diversity (Shannon, Simpson, Observed, Chao1)
//! - **beta**: Between-sample distances (Bray-Curtis, Jaccard) and PCoA
//! - **rarefaction**: Expected richness curves and depth recommendation
//! - **test**: Rank-based group comparison (Kruskal-Wallis, Mann-Whitney U)
//! - **taxonomy**: Composition by taxonomic rank
//! - **viz**: Visualization specs for every result type
//! - **engine**: Request dispatch and the `{data, visualization_spec}` response
//!
//! # Example
//!
//! ```no_run
//! use microbiome_diversity::prelude::*;
//!
//! // Load data
//! let table = FeatureTable::from_tsv("feature-table.tsv").unwrap();
//! let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
//! let table = table.with_metadata(metadata).unwrap();
//!
//! // Compare Shannon diversity between body sites
//! let options = AlphaOptions::new(AlphaMetric::Shannon).grouped_by("body-site");
//! let analysis = compute_alpha(&table, &options, &ComparisonConfig::default()).unwrap();
//!
//! // Or go through the request layer
//! let response = run_request(
//!     &table,
//!     &AnalysisRequest::beta(DistanceMetric::BrayCurtis, 2),
//!     &EngineConfig::default(),
//! )
//! .unwrap();
//! ```

pub mod alpha;
pub mod beta;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod rarefaction;
pub mod taxonomy;
pub mod test;
pub mod viz;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::alpha::{
        compute_alpha, compute_profile, AlphaAnalysis, AlphaMetric, AlphaOptions,
        DiversityProfile,
    };
    pub use crate::beta::{
        analyze_beta, analyze_precomputed, compute_distances, compute_ordination, AxisStatus, BetaAnalysis,
        BetaOptions, DegenerateOrdination, DistanceMatrix, DistanceMetric, EigenAxis,
        OrdinationResult,
    };
    pub use crate::config::{
        ComparisonConfig, EngineConfig, OrdinationConfig, RarefactionConfig, VisualizationConfig,
    };
    pub use crate::data::{FeatureTable, GroupLabels, Metadata, Variable};
    pub use crate::engine::{
        run_batch, run_precomputed, run_request, AnalysisRequest, AnalysisResponse, RequestBatch,
    };
    pub use crate::error::{DiversityError, Result};
    pub use crate::rarefaction::{analyze_rarefaction, DepthStatus, RarefactionCurve};
    pub use crate::taxonomy::{aggregate_by_taxon, summarize_taxonomy, TaxonomicRank};
    pub use crate::test::{compare, ComparisonResult, TestKind};
    pub use crate::viz::{VisualizationSpec, Visualize};
}
