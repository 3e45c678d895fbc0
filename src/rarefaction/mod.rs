//! Rarefaction: expected richness as a function of sequencing depth.

pub mod curve;
pub mod hurlbert;

pub use curve::{
    analyze_rarefaction, default_depths, CurvePoint, DepthRecommendation, DepthStatus,
    RarefactionCurve, RarefactionSummary, SampleCurve,
};
pub use hurlbert::{ln_binomial, SampleCounts};
