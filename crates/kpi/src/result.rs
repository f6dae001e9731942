//! KPI outputs: per-KPI results, not-computable notes, per-item failures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gwo_core::{Department, EngineError, Fingerprint, SnapshotVersion};

use crate::definition::{Direction, KpiCategory, StatusThresholds};

/// Graded position of a KPI value against its target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiStatus {
    Critical,
    Warning,
    Good,
    Excellent,
}

impl KpiStatus {
    /// Grade `value` against `target`.
    ///
    /// Attainment is `value / target`, or `target / value` for lower-is-better
    /// KPIs (a value of zero then counts as full attainment of any target).
    pub fn grade(value: f64, target: f64, direction: Direction, thresholds: &StatusThresholds) -> Self {
        let attainment = match direction {
            Direction::HigherIsBetter => value / target,
            Direction::LowerIsBetter if value <= 0.0 => f64::INFINITY,
            Direction::LowerIsBetter => target / value,
        };

        if attainment < thresholds.critical {
            KpiStatus::Critical
        } else if attainment < thresholds.warning {
            KpiStatus::Warning
        } else if attainment < thresholds.excellent {
            KpiStatus::Good
        } else {
            KpiStatus::Excellent
        }
    }

    pub fn needs_attention(&self) -> bool {
        matches!(self, KpiStatus::Critical | KpiStatus::Warning)
    }
}

/// Movement of the raw value versus the preceding window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    /// Relative change from `previous` to `current`, with `tolerance` as the
    /// dead band.
    pub fn between(previous: f64, current: f64, tolerance: f64) -> Self {
        let delta = current - previous;
        let relative = if previous.abs() > f64::EPSILON {
            delta / previous.abs()
        } else {
            delta
        };
        if relative > tolerance {
            Trend::Up
        } else if relative < -tolerance {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

/// One computed KPI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiResult {
    pub name: String,
    pub category: KpiCategory,
    pub value: f64,
    pub target: f64,
    pub direction: Direction,
    pub trend: Trend,
    pub status: KpiStatus,
    /// Per-department value; departments where the rule is not computable are omitted.
    pub department_breakdown: BTreeMap<Department, f64>,
    /// Number of records that contributed a value.
    pub sample_size: usize,
    /// Groups left out of the aggregate for lack of data.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub insufficient_data: Vec<String>,
    pub computed_at: DateTime<Utc>,
    pub fingerprint: Fingerprint,
}

/// A KPI whose inputs exist but do not support a meaningful value
/// (e.g. an empty crunch cohort).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotComputable {
    pub name: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub insufficient_data: Vec<String>,
}

/// A KPI that failed outright; reported per item, never fatal for the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiFailure {
    pub name: String,
    pub error: EngineError,
}

/// A KPI needing attention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiAlert {
    pub kpi: String,
    pub status: KpiStatus,
    pub value: f64,
    pub target: f64,
    pub message: String,
}

/// Everything computed for one (record set, query, parameters) triple.
///
/// Every selected KPI lands in exactly one of `results`, `not_computable`,
/// or `failures`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    pub fingerprint: Fingerprint,
    pub records_version: SnapshotVersion,
    pub computed_at: DateTime<Utc>,
    pub results: Vec<KpiResult>,
    pub not_computable: Vec<NotComputable>,
    pub failures: Vec<KpiFailure>,
}

impl KpiReport {
    pub fn get(&self, name: &str) -> Option<&KpiResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn failure(&self, name: &str) -> Option<&EngineError> {
        self.failures.iter().find(|f| f.name == name).map(|f| &f.error)
    }

    pub fn is_not_computable(&self, name: &str) -> bool {
        self.not_computable.iter().any(|n| n.name == name)
    }

    /// Critical and warning KPIs, critical first, then by name.
    pub fn alerts(&self) -> Vec<KpiAlert> {
        let mut alerts: Vec<KpiAlert> = self
            .results
            .iter()
            .filter(|r| r.status.needs_attention())
            .map(|r| {
                let relation = match r.direction {
                    Direction::HigherIsBetter => "below",
                    Direction::LowerIsBetter => "above",
                };
                KpiAlert {
                    kpi: r.name.clone(),
                    status: r.status,
                    value: r.value,
                    target: r.target,
                    message: format!(
                        "{} is {:.2}, {relation} its target of {:.2}",
                        r.name, r.value, r.target
                    ),
                }
            })
            .collect();
        alerts.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.kpi.cmp(&b.kpi)));
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn grading_follows_attainment() {
        let t = StatusThresholds::default();
        assert_eq!(KpiStatus::grade(6.0, 8.0, Direction::HigherIsBetter, &t), KpiStatus::Critical);
        assert_eq!(KpiStatus::grade(7.2, 8.0, Direction::HigherIsBetter, &t), KpiStatus::Warning);
        assert_eq!(KpiStatus::grade(8.0, 8.0, Direction::HigherIsBetter, &t), KpiStatus::Good);
        assert_eq!(KpiStatus::grade(9.0, 8.0, Direction::HigherIsBetter, &t), KpiStatus::Excellent);

        // crunch impact: lower is better
        assert_eq!(KpiStatus::grade(4.0, 5.0, Direction::LowerIsBetter, &t), KpiStatus::Excellent);
        assert_eq!(KpiStatus::grade(7.0, 5.0, Direction::LowerIsBetter, &t), KpiStatus::Critical);
        assert_eq!(KpiStatus::grade(0.0, 5.0, Direction::LowerIsBetter, &t), KpiStatus::Excellent);
    }

    #[test]
    fn trend_uses_relative_change_with_dead_band() {
        assert_eq!(Trend::between(10.0, 10.1, 0.02), Trend::Stable);
        assert_eq!(Trend::between(10.0, 11.0, 0.02), Trend::Up);
        assert_eq!(Trend::between(10.0, 9.0, 0.02), Trend::Down);
        assert_eq!(Trend::between(0.0, 0.0, 0.02), Trend::Stable);
    }

    proptest! {
        #[test]
        fn status_is_monotonic_in_value(a in 0.0f64..20.0, b in 0.0f64..20.0, target in 0.5f64..10.0) {
            let t = StatusThresholds::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                KpiStatus::grade(lo, target, Direction::HigherIsBetter, &t)
                    <= KpiStatus::grade(hi, target, Direction::HigherIsBetter, &t)
            );
            prop_assert!(
                KpiStatus::grade(lo, target, Direction::LowerIsBetter, &t)
                    >= KpiStatus::grade(hi, target, Direction::LowerIsBetter, &t)
            );
        }
    }
}
