//! `gwo-engine` — the workforce analytics engine facade.
//!
//! Owns the record snapshot, the result cache, and every model; callers
//! (dashboard pages, the HTTP API) hold one [`WorkforceEngine`] for the
//! lifetime of the process.

pub mod config;
pub mod engine;
pub mod views;

pub use config::{EngineConfig, ServerConfig};
pub use engine::{Clock, ModelKind, WorkforceEngine};
pub use views::{
    BenchmarkReport, BurnoutAssessment, ClusterReport, ClusterSummary, PredictionBenchmark, TurnoverEntry,
    TurnoverReport,
};
