use chrono::{DateTime, Utc};
use serde::Serialize;

use gwo_core::{Department, EmployeeId, EngineError};

use crate::features::Feature;

/// Score produced by a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionScore {
    /// Risk probability in [0, 1].
    Probability(f64),
    /// Cluster assignment; `id` 0 is the strongest cluster of this run.
    Cluster { id: usize, label: String },
}

/// Presentation band for a risk score.
///
/// Bands are half-open and cover [0, 1] exactly once:
/// low [0, 0.3), moderate [0.3, 0.6), high [0.6, 0.8), critical [0.8, 1].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskBand {
    pub const MODERATE_FROM: f64 = 0.3;
    pub const HIGH_FROM: f64 = 0.6;
    pub const CRITICAL_FROM: f64 = 0.8;

    /// Band for `score`; out-of-range scores are clamped first.
    pub fn from_score(score: f64) -> Self {
        let s = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        if s >= Self::CRITICAL_FROM {
            RiskBand::Critical
        } else if s >= Self::HIGH_FROM {
            RiskBand::High
        } else if s >= Self::MODERATE_FROM {
            RiskBand::Moderate
        } else {
            RiskBand::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Moderate => "moderate",
            RiskBand::High => "high",
            RiskBand::Critical => "critical",
        }
    }
}

/// One signed contribution to a prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    /// Human-readable label, e.g. "high crunch hours".
    pub name: String,
    pub feature: Feature,
    pub impact: f64,
}

impl Factor {
    pub fn new(name: impl Into<String>, feature: Feature, impact: f64) -> Self {
        Self {
            name: name.into(),
            feature,
            impact,
        }
    }
}

/// Sort by |impact| descending; ties keep feature order. Zero impacts are dropped.
pub fn rank_factors(mut factors: Vec<Factor>) -> Vec<Factor> {
    factors.retain(|f| f.impact != 0.0);
    factors.sort_by(|a, b| {
        b.impact
            .abs()
            .total_cmp(&a.impact.abs())
            .then_with(|| a.feature.cmp(&b.feature))
    });
    factors
}

/// Output of a model for one employee.
///
/// An insight, not a record mutation: callers display or cache it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub employee_id: EmployeeId,
    pub department: Department,
    pub model: String,
    pub model_version: String,
    pub score: PredictionScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_band: Option<RiskBand>,
    /// Ranked by |impact| descending.
    pub factors: Vec<Factor>,
    pub computed_at: DateTime<Utc>,
}

impl PredictionResult {
    pub fn probability(&self) -> Option<f64> {
        match self.score {
            PredictionScore::Probability(p) => Some(p),
            PredictionScore::Cluster { .. } => None,
        }
    }

    pub fn cluster_label(&self) -> Option<&str> {
        match &self.score {
            PredictionScore::Cluster { label, .. } => Some(label),
            PredictionScore::Probability(_) => None,
        }
    }

    pub fn top_factor(&self) -> Option<&Factor> {
        self.factors.first()
    }
}

/// A per-employee model failure; the rest of the batch is unaffected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionFailure {
    pub employee_id: EmployeeId,
    pub model: String,
    pub error: EngineError,
}

/// Everything one model produced for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRun {
    pub model: String,
    pub model_version: String,
    pub results: Vec<PredictionResult>,
    pub failures: Vec<PredictionFailure>,
}

impl ModelRun {
    pub fn result_for(&self, employee_id: &EmployeeId) -> Option<&PredictionResult> {
        self.results.iter().find(|r| &r.employee_id == employee_id)
    }

    pub fn failure_for(&self, employee_id: &EmployeeId) -> Option<&EngineError> {
        self.failures
            .iter()
            .find(|f| &f.employee_id == employee_id)
            .map(|f| &f.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn band_endpoints() {
        assert_eq!(RiskBand::from_score(0.0), RiskBand::Low);
        assert_eq!(RiskBand::from_score(0.3), RiskBand::Moderate);
        assert_eq!(RiskBand::from_score(0.6), RiskBand::High);
        assert_eq!(RiskBand::from_score(0.8), RiskBand::Critical);
        assert_eq!(RiskBand::from_score(1.0), RiskBand::Critical);
    }

    #[test]
    fn factors_rank_by_absolute_impact() {
        let ranked = rank_factors(vec![
            Factor::new("low satisfaction", Feature::Satisfaction, 0.2),
            Factor::new("high crunch hours", Feature::CrunchHours, -0.5),
            Factor::new("steady sprint velocity", Feature::VelocityVolatility, 0.0),
            Factor::new("short tenure", Feature::TenureYears, 0.2),
        ]);
        let names: Vec<&str> = ranked.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["high crunch hours", "low satisfaction", "short tenure"]);
    }

    proptest! {
        #[test]
        fn bands_are_monotonic_and_cover_unit_interval(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(RiskBand::from_score(lo) <= RiskBand::from_score(hi));
        }

        #[test]
        fn each_score_lands_in_exactly_one_band(s in 0.0f64..=1.0) {
            let bounds = [
                (RiskBand::Low, 0.0, RiskBand::MODERATE_FROM),
                (RiskBand::Moderate, RiskBand::MODERATE_FROM, RiskBand::HIGH_FROM),
                (RiskBand::High, RiskBand::HIGH_FROM, RiskBand::CRITICAL_FROM),
                (RiskBand::Critical, RiskBand::CRITICAL_FROM, f64::INFINITY),
            ];
            let containing: Vec<RiskBand> = bounds
                .iter()
                .filter(|(_, lo, hi)| *lo <= s && s < *hi)
                .map(|(band, _, _)| *band)
                .collect();
            prop_assert_eq!(containing, vec![RiskBand::from_score(s)]);
        }
    }
}
