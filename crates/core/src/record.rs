//! Validated workforce records.
//!
//! Records are immutable snapshots: nothing in the engine mutates them after
//! validation. Updated metrics produce a new record (and a new record-set
//! version), never an in-place patch.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::id::{EmployeeId, ProjectId, SnapshotVersion, TeamId};

/// Declares a closed, string-named enum with `ALL`, `as_str`, `Display`,
/// serde names, and a `FromStr` that reports the valid spellings as an
/// invalid-parameter error.
#[macro_export]
macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $param:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Every accepted spelling, in declaration order.
            pub fn valid_values() -> Vec<String> {
                Self::ALL.iter().map(|v| v.as_str().to_string()).collect()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $name {
            type Err = $crate::EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(needle))
                    .ok_or_else(|| $crate::EngineError::invalid_parameter($param, s, Self::valid_values()))
            }
        }
    };
}

closed_enum! {
    /// Studio department.
    Department, "department" {
        Design => "Design",
        Programming => "Programming",
        Art => "Art",
        Qa => "QA",
        Marketing => "Marketing",
        Management => "Management",
    }
}

closed_enum! {
    /// Seniority level.
    Level, "level" {
        Junior => "Junior",
        Mid => "Mid",
        Senior => "Senior",
        Lead => "Lead",
        Principal => "Principal",
    }
}

closed_enum! {
    /// Kind of game project.
    ProjectType, "project_type" {
        Aaa => "AAA",
        Indie => "Indie",
        Mobile => "Mobile",
        Vr => "VR",
        Ar => "AR",
        Engine => "Engine",
    }
}

closed_enum! {
    /// Production phase. Variants are declared in delivery order, so `Ord`
    /// follows the project lifecycle.
    ProjectPhase, "phase" {
        PreProduction => "pre-production",
        Production => "production",
        Alpha => "alpha",
        Beta => "beta",
        Launch => "launch",
        LiveOps => "live-ops",
    }
}

/// Discriminates record kinds in violation reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Employee,
    Project,
}

/// A record with a unique identifier inside its record set.
pub trait Record {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Display;

    const KIND: RecordKind;

    fn id(&self) -> &Self::Id;
}

/// Game-development metrics attached to an employee.
///
/// Every metric may be absent; KPIs needing a metric that no record carries
/// report it as missing input instead of assuming a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamingMetrics {
    pub sprint_velocity: Option<f64>,
    pub bug_fix_rate: Option<f64>,
    pub innovation_index: Option<f64>,
    pub crunch_hours_last_month: Option<f64>,
    pub tool_proficiency: BTreeSet<String>,
    pub team_collaboration_score: Option<f64>,
    pub cross_department_collaborations: Option<u32>,
    /// Satisfaction change versus the previous review period.
    pub satisfaction_trend: Option<f64>,
    /// Crunch-hours change versus the previous month.
    pub crunch_hours_trend: Option<f64>,
    /// Recent per-sprint velocities, oldest first.
    pub velocity_history: Vec<f64>,
}

/// Validated employee snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    pub department: Department,
    pub level: Level,
    pub team_id: Option<TeamId>,
    pub salary: f64,
    pub satisfaction_score: f64,
    pub performance_score: f64,
    pub years_experience: f64,
    pub hire_date: NaiveDate,
    /// Date the metrics were observed (used by time-window filters).
    pub recorded_on: Option<NaiveDate>,
    pub metrics: GamingMetrics,
}

impl EmployeeRecord {
    /// Team key used for grouping; employees without a team are grouped by
    /// department.
    pub fn team_key(&self) -> String {
        match &self.team_id {
            Some(team) => team.to_string(),
            None => format!("{}:unassigned", self.department),
        }
    }

    /// Tenure in fractional years as of `as_of` (never negative).
    pub fn tenure_years(&self, as_of: NaiveDate) -> f64 {
        let days = (as_of - self.hire_date).num_days().max(0);
        days as f64 / 365.25
    }
}

impl Record for EmployeeRecord {
    type Id = EmployeeId;

    const KIND: RecordKind = RecordKind::Employee;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Delivery metrics for a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryMetrics {
    pub milestones_planned: u32,
    pub milestones_completed: u32,
    /// Share of milestones delivered on time, 0-100.
    pub on_time_rate: Option<f64>,
    pub budget_variance_pct: Option<f64>,
}

/// Validated project snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub project_type: ProjectType,
    pub phase: ProjectPhase,
    pub platforms: BTreeSet<String>,
    pub team_ids: BTreeSet<TeamId>,
    pub delivery: DeliveryMetrics,
}

impl Record for ProjectRecord {
    type Id = ProjectId;

    const KIND: RecordKind = RecordKind::Project;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A validated, versioned collection of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub version: SnapshotVersion,
    /// Reference date for tenure and time windows.
    pub as_of: NaiveDate,
    pub employees: Vec<EmployeeRecord>,
    pub projects: Vec<ProjectRecord>,
}

#[derive(Serialize)]
struct CanonicalContent<'a> {
    as_of: NaiveDate,
    employees: &'a [EmployeeRecord],
    projects: &'a [ProjectRecord],
}

impl RecordSet {
    /// Assemble a record set, deriving its content version.
    pub fn new(
        as_of: NaiveDate,
        employees: Vec<EmployeeRecord>,
        projects: Vec<ProjectRecord>,
    ) -> Result<Self, EngineError> {
        let content = CanonicalContent {
            as_of,
            employees: &employees,
            projects: &projects,
        };
        let bytes = serde_json::to_vec(&content)
            .map_err(|e| EngineError::computation(format!("record set serialization: {e}")))?;
        Ok(Self {
            version: SnapshotVersion::from_bytes(&bytes),
            as_of,
            employees,
            projects,
        })
    }

    pub fn employee(&self, id: &EmployeeId) -> Option<&EmployeeRecord> {
        self.employees.iter().find(|e| &e.id == id)
    }

    /// New snapshot with one employee replaced.
    pub fn with_employee(&self, updated: EmployeeRecord) -> Result<Self, EngineError> {
        if self.employee(&updated.id).is_none() {
            return Err(EngineError::not_found(format!("employee {}", updated.id)));
        }
        let employees = self
            .employees
            .iter()
            .map(|e| if e.id == updated.id { updated.clone() } else { e.clone() })
            .collect();
        Self::new(self.as_of, employees, self.projects.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty() && self.projects.is_empty()
    }
}
