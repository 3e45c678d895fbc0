//! Request/response layer: one request runs exactly one analyzer and pairs
//! its result with a visualization spec.

pub mod request;
pub mod runner;

pub use request::{AnalysisRequest, RequestBatch};
pub use runner::{run_batch, run_precomputed, run_request, AnalysisResponse};
