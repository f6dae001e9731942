//! Tunable parameters of the custom KPI formulas.

use serde::{Deserialize, Serialize};

use gwo_core::{EngineError, EngineResult};

use crate::definition::KpiDefinition;

/// Parameters shared by every KPI computation in a batch.
///
/// Serialized into the cache fingerprint, so two calculators with different
/// parameters never share cached results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiParameters {
    /// Monthly crunch hours above which an employee joins the over-threshold cohort.
    pub crunch_threshold_hours: f64,
    /// Monthly crunch hours that normalise to 1.0.
    pub crunch_normalization_hours: f64,
    pub crunch_hours_weight: f64,
    pub satisfaction_delta_weight: f64,
    /// Minimum velocity observations for a team to count toward sprint velocity.
    pub min_team_sample: usize,
    pub innovation_weight: f64,
    pub collaboration_weight: f64,
    /// Mean cross-department collaborations that saturate the blend.
    pub collaboration_cap: f64,
    /// Relative change below which a trend is reported as stable.
    pub trend_tolerance: f64,
    /// Replaces the built-in KPI set when non-empty.
    pub definitions: Vec<KpiDefinition>,
}

impl Default for KpiParameters {
    fn default() -> Self {
        Self {
            crunch_threshold_hours: 40.0,
            crunch_normalization_hours: 100.0,
            crunch_hours_weight: 0.5,
            satisfaction_delta_weight: 0.5,
            min_team_sample: 3,
            innovation_weight: 0.7,
            collaboration_weight: 0.3,
            collaboration_cap: 5.0,
            trend_tolerance: 0.02,
            definitions: Vec::new(),
        }
    }
}

impl KpiParameters {
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("crunch_normalization_hours", self.crunch_normalization_hours),
            ("collaboration_cap", self.collaboration_cap),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(EngineError::config(format!("kpi.{name} must be > 0 (got {v})")));
            }
        }
        let non_negative = [
            ("crunch_threshold_hours", self.crunch_threshold_hours),
            ("crunch_hours_weight", self.crunch_hours_weight),
            ("satisfaction_delta_weight", self.satisfaction_delta_weight),
            ("innovation_weight", self.innovation_weight),
            ("collaboration_weight", self.collaboration_weight),
            ("trend_tolerance", self.trend_tolerance),
        ];
        for (name, v) in non_negative {
            if !(v.is_finite() && v >= 0.0) {
                return Err(EngineError::config(format!("kpi.{name} must be >= 0 (got {v})")));
            }
        }
        if self.crunch_hours_weight + self.satisfaction_delta_weight <= 0.0 {
            return Err(EngineError::config("kpi crunch weights must not both be zero"));
        }
        if self.innovation_weight <= 0.0 {
            return Err(EngineError::config("kpi.innovation_weight must be > 0"));
        }
        if self.min_team_sample == 0 {
            return Err(EngineError::config("kpi.min_team_sample must be >= 1"));
        }
        Ok(())
    }
}
