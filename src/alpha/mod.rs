//! Alpha diversity: within-sample diversity metrics.

pub mod analysis;
pub mod metrics;

pub use analysis::{
    compute_alpha, compute_profile, AlphaAnalysis, AlphaOptions, DiversityProfile, SampleValue,
};
pub use metrics::{chao1, observed, shannon, simpson, AlphaMetric, DiversityLevel, Interpretation};
