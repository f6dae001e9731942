//! Output shapes returned by [`crate::WorkforceEngine`] operations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gwo_ai::{Factor, PredictionFailure, PredictionResult, Recommendation, RiskBand};
use gwo_core::{Department, EmployeeId, EngineError, SnapshotVersion};
use gwo_kpi::{BenchmarkAnnotation, BenchmarkedKpi};

/// One employee at or above the turnover threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnoverEntry {
    pub employee_id: EmployeeId,
    pub department: Department,
    pub score: f64,
    pub risk_band: RiskBand,
    pub risk_factors: Vec<Factor>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnoverReport {
    pub records_version: SnapshotVersion,
    pub risk_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    /// Highest score first.
    pub employees: Vec<TurnoverEntry>,
    pub failures: Vec<PredictionFailure>,
}

/// Burnout assessment for one employee under updated metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurnoutAssessment {
    pub employee_id: EmployeeId,
    pub department: Department,
    /// Version of the snapshot the assessment was computed on.
    pub records_version: SnapshotVersion,
    pub model_version: String,
    pub score: f64,
    pub risk_level: RiskBand,
    pub contributing_factors: Vec<Factor>,
    pub recommendations: Vec<Recommendation>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub id: usize,
    pub label: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub records_version: SnapshotVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    /// Strongest cluster first.
    pub clusters: Vec<ClusterSummary>,
    pub assignments: Vec<PredictionResult>,
    pub failures: Vec<PredictionFailure>,
}

/// Mean risk score of one department against its benchmark range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionBenchmark {
    pub metric: String,
    pub department: Department,
    pub mean_score: f64,
    pub employees: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<BenchmarkAnnotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EngineError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub records_version: SnapshotVersion,
    pub kpis: Vec<BenchmarkedKpi>,
    pub predictions: Vec<PredictionBenchmark>,
}
