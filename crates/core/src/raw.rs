//! Unvalidated record shapes as delivered by a record source.
//!
//! Every field is optional so the validator can tell "absent" apart from
//! "present but wrong" and report both against the right field.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawGamingMetrics {
    pub sprint_velocity: Option<f64>,
    pub bug_fix_rate: Option<f64>,
    pub innovation_index: Option<f64>,
    pub crunch_hours_last_month: Option<f64>,
    pub tool_proficiency: Option<Vec<String>>,
    pub team_collaboration_score: Option<f64>,
    pub cross_department_collaborations: Option<f64>,
    pub satisfaction_trend: Option<f64>,
    pub crunch_hours_trend: Option<f64>,
    pub velocity_history: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEmployeeRecord {
    pub id: Option<String>,
    pub department: Option<String>,
    pub level: Option<String>,
    pub team_id: Option<String>,
    pub salary: Option<f64>,
    pub satisfaction_score: Option<f64>,
    pub performance_score: Option<f64>,
    pub years_experience: Option<f64>,
    pub hire_date: Option<String>,
    pub recorded_on: Option<String>,
    pub metrics: Option<RawGamingMetrics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDeliveryMetrics {
    pub milestones_planned: Option<f64>,
    pub milestones_completed: Option<f64>,
    pub on_time_rate: Option<f64>,
    pub budget_variance_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProjectRecord {
    pub id: Option<String>,
    #[serde(alias = "type")]
    pub project_type: Option<String>,
    pub phase: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub team_ids: Option<Vec<String>>,
    pub delivery: Option<RawDeliveryMetrics>,
}

/// A batch of raw records plus an optional reference date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecordSet {
    pub as_of: Option<NaiveDate>,
    pub employees: Vec<RawEmployeeRecord>,
    pub projects: Vec<RawProjectRecord>,
}

/// Partial update of an employee's current metrics.
///
/// Fields left out keep the snapshot's value; supplied values go through the
/// same range checks as ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeUpdate {
    pub satisfaction_score: Option<f64>,
    pub performance_score: Option<f64>,
    #[serde(flatten)]
    pub metrics: RawGamingMetrics,
}

impl RawGamingMetrics {
    /// Field-wise overlay: values present in `update` win.
    pub fn overlay(&self, update: &RawGamingMetrics) -> RawGamingMetrics {
        RawGamingMetrics {
            sprint_velocity: update.sprint_velocity.or(self.sprint_velocity),
            bug_fix_rate: update.bug_fix_rate.or(self.bug_fix_rate),
            innovation_index: update.innovation_index.or(self.innovation_index),
            crunch_hours_last_month: update
                .crunch_hours_last_month
                .or(self.crunch_hours_last_month),
            tool_proficiency: update
                .tool_proficiency
                .clone()
                .or_else(|| self.tool_proficiency.clone()),
            team_collaboration_score: update
                .team_collaboration_score
                .or(self.team_collaboration_score),
            cross_department_collaborations: update
                .cross_department_collaborations
                .or(self.cross_department_collaborations),
            satisfaction_trend: update.satisfaction_trend.or(self.satisfaction_trend),
            crunch_hours_trend: update.crunch_hours_trend.or(self.crunch_hours_trend),
            velocity_history: update
                .velocity_history
                .clone()
                .or_else(|| self.velocity_history.clone()),
        }
    }
}

impl From<&crate::record::GamingMetrics> for RawGamingMetrics {
    fn from(m: &crate::record::GamingMetrics) -> Self {
        Self {
            sprint_velocity: m.sprint_velocity,
            bug_fix_rate: m.bug_fix_rate,
            innovation_index: m.innovation_index,
            crunch_hours_last_month: m.crunch_hours_last_month,
            tool_proficiency: Some(m.tool_proficiency.iter().cloned().collect()),
            team_collaboration_score: m.team_collaboration_score,
            cross_department_collaborations: m.cross_department_collaborations.map(f64::from),
            satisfaction_trend: m.satisfaction_trend,
            crunch_hours_trend: m.crunch_hours_trend,
            velocity_history: Some(m.velocity_history.clone()),
        }
    }
}
