//! Rank-based hypothesis tests and descriptive statistics for group comparison.

pub mod kruskal;

pub use compare::{compare, ComparisonResult, GroupSummary, TestKind};
pub use describe::SummaryStats;
pub use kruskal::{kruskal_wallis, KruskalWallis};
pub use mann_whitney::{mann_whitney_u, MannWhitney, PValueMethod};
