//! Crunch analysis per department and per project phase.
//!
//! Records carry monthly overtime (`crunch_hours_last_month`); it is spread
//! over the month's weeks on top of the contracted week to give the weekly
//! hours every threshold here is expressed in.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use gwo_core::stats::mean;
use gwo_core::{Department, EmployeeRecord, EngineError, EngineResult, ProjectPhase, RecordSet, SnapshotVersion};

const WEEKS_PER_MONTH: f64 = 52.0 / 12.0;

/// Expected load of one project phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProfile {
    pub phase: ProjectPhase,
    pub expected_weekly_hours: f64,
    /// Likelihood that a team in this phase ends up crunching, in [0, 1].
    pub crunch_probability: f64,
}

impl PhaseProfile {
    fn new(phase: ProjectPhase, expected_weekly_hours: f64, crunch_probability: f64) -> Self {
        Self {
            phase,
            expected_weekly_hours,
            crunch_probability,
        }
    }
}

/// `[crunch]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrunchParameters {
    pub contracted_weekly_hours: f64,
    /// Weekly hours above which an employee is in crunch.
    pub crunch_weekly_hours: f64,
    /// Weekly hours past which productivity starts to drop.
    pub optimal_weekly_hours: f64,
    /// Productivity lost per weekly hour past the optimum.
    pub productivity_loss_per_hour: f64,
    pub max_productivity_loss: f64,
    /// Per-phase expectations; phases not listed use the fallback values.
    pub phases: Vec<PhaseProfile>,
    pub fallback_expected_weekly_hours: f64,
    pub fallback_crunch_probability: f64,
}

impl Default for CrunchParameters {
    fn default() -> Self {
        Self {
            contracted_weekly_hours: 40.0,
            crunch_weekly_hours: 50.0,
            optimal_weekly_hours: 45.0,
            productivity_loss_per_hour: 0.02,
            max_productivity_loss: 0.5,
            phases: vec![
                PhaseProfile::new(ProjectPhase::PreProduction, 40.0, 0.15),
                PhaseProfile::new(ProjectPhase::Production, 42.0, 0.35),
                PhaseProfile::new(ProjectPhase::Alpha, 45.0, 0.60),
                PhaseProfile::new(ProjectPhase::Beta, 48.0, 0.75),
                PhaseProfile::new(ProjectPhase::Launch, 52.0, 0.90),
                PhaseProfile::new(ProjectPhase::LiveOps, 38.0, 0.25),
            ],
            fallback_expected_weekly_hours: 40.0,
            fallback_crunch_probability: 0.40,
        }
    }
}

impl CrunchParameters {
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("contracted_weekly_hours", self.contracted_weekly_hours),
            ("crunch_weekly_hours", self.crunch_weekly_hours),
            ("optimal_weekly_hours", self.optimal_weekly_hours),
            ("fallback_expected_weekly_hours", self.fallback_expected_weekly_hours),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(EngineError::config(format!("crunch.{name} must be > 0 (got {v})")));
            }
        }
        if !(self.productivity_loss_per_hour.is_finite() && self.productivity_loss_per_hour >= 0.0) {
            return Err(EngineError::config("crunch.productivity_loss_per_hour must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.max_productivity_loss) {
            return Err(EngineError::config("crunch.max_productivity_loss must be within [0, 1]"));
        }

        let mut seen = BTreeSet::new();
        let probabilities = self
            .phases
            .iter()
            .map(|p| (p.phase.as_str(), p.crunch_probability))
            .chain([("fallback", self.fallback_crunch_probability)]);
        for (name, probability) in probabilities {
            if !(0.0..=1.0).contains(&probability) {
                return Err(EngineError::config(format!(
                    "crunch probability for {name} must be within [0, 1] (got {probability})"
                )));
            }
        }
        for profile in &self.phases {
            if !seen.insert(profile.phase) {
                return Err(EngineError::config(format!("crunch.phases lists {} twice", profile.phase)));
            }
            if !(profile.expected_weekly_hours.is_finite() && profile.expected_weekly_hours > 0.0) {
                return Err(EngineError::config(format!(
                    "crunch.phases.{}.expected_weekly_hours must be > 0",
                    profile.phase
                )));
            }
        }
        Ok(())
    }

    /// Contracted hours plus monthly overtime spread over the month.
    pub fn weekly_hours(&self, record: &EmployeeRecord) -> Option<f64> {
        record
            .metrics
            .crunch_hours_last_month
            .map(|overtime| self.contracted_weekly_hours + overtime / WEEKS_PER_MONTH)
    }

    fn profile(&self, phase: ProjectPhase) -> PhaseProfile {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .cloned()
            .unwrap_or_else(|| {
                PhaseProfile::new(phase, self.fallback_expected_weekly_hours, self.fallback_crunch_probability)
            })
    }

    /// Share of productivity lost at `avg_hours`, capped at `max_productivity_loss`.
    pub fn productivity_impact(&self, avg_hours: f64) -> f64 {
        if avg_hours <= self.optimal_weekly_hours {
            return 0.0;
        }
        let impact = ((avg_hours - self.optimal_weekly_hours) * self.productivity_loss_per_hour)
            .min(self.max_productivity_loss);
        (impact * 1000.0).round() / 1000.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseBurnoutRisk {
    Low,
    Medium,
    High,
}

impl PhaseBurnoutRisk {
    /// Points for long weeks plus points for low satisfaction.
    fn assess(avg_hours: f64, avg_satisfaction: f64) -> Self {
        let hours = match avg_hours {
            h if h > 55.0 => 3,
            h if h > 50.0 => 2,
            h if h > 45.0 => 1,
            _ => 0,
        };
        let mood = match avg_satisfaction {
            s if s < 5.0 => 2,
            s if s < 6.0 => 1,
            _ => 0,
        };
        match hours + mood {
            n if n >= 4 => PhaseBurnoutRisk::High,
            n if n >= 2 => PhaseBurnoutRisk::Medium,
            _ => PhaseBurnoutRisk::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentCrunch {
    pub department: Department,
    pub total_employees: usize,
    /// Employees with recorded crunch hours.
    pub observed: usize,
    pub employees_in_crunch: usize,
    /// Share of observed employees in crunch, 0-100.
    pub crunch_percentage: f64,
    pub avg_weekly_hours: Option<f64>,
    pub max_weekly_hours: Option<f64>,
    pub avg_satisfaction: f64,
    pub productivity_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseCrunch {
    pub phase: ProjectPhase,
    /// Observed employees on at least one project in this phase.
    pub employees: usize,
    pub avg_weekly_hours: f64,
    pub expected_weekly_hours: f64,
    pub hours_deviation: f64,
    pub crunch_probability: f64,
    pub burnout_risk: PhaseBurnoutRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrunchReport {
    pub records_version: SnapshotVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    pub departments: Vec<DepartmentCrunch>,
    pub phases: Vec<PhaseCrunch>,
}

/// Crunch by department and by project phase, optionally for one department.
///
/// An employee counts toward every phase among the projects their team is
/// on; employees without a team or a project only appear per department.
pub fn analyze_crunch(records: &RecordSet, department: Option<Department>, params: &CrunchParameters) -> CrunchReport {
    let employees: Vec<&EmployeeRecord> = records
        .employees
        .iter()
        .filter(|e| department.map_or(true, |d| d == e.department))
        .collect();

    let mut by_department: BTreeMap<Department, Vec<&EmployeeRecord>> = BTreeMap::new();
    for e in &employees {
        by_department.entry(e.department).or_default().push(*e);
    }
    let departments = by_department
        .into_iter()
        .map(|(department, members)| department_crunch(department, &members, params))
        .collect();

    let mut by_phase: BTreeMap<ProjectPhase, Vec<(f64, f64)>> = BTreeMap::new();
    for e in &employees {
        let (Some(team), Some(hours)) = (e.team_id.as_ref(), params.weekly_hours(e)) else {
            continue;
        };
        let phases: BTreeSet<ProjectPhase> = records
            .projects
            .iter()
            .filter(|p| p.team_ids.contains(team))
            .map(|p| p.phase)
            .collect();
        for phase in phases {
            by_phase.entry(phase).or_default().push((hours, e.satisfaction_score));
        }
    }
    let phases = by_phase
        .into_iter()
        .filter_map(|(phase, rows)| {
            let hours: Vec<f64> = rows.iter().map(|(h, _)| *h).collect();
            let satisfaction: Vec<f64> = rows.iter().map(|(_, s)| *s).collect();
            let avg_hours = mean(&hours)?;
            let avg_satisfaction = mean(&satisfaction)?;
            let profile = params.profile(phase);
            Some(PhaseCrunch {
                phase,
                employees: rows.len(),
                avg_weekly_hours: avg_hours,
                expected_weekly_hours: profile.expected_weekly_hours,
                hours_deviation: avg_hours - profile.expected_weekly_hours,
                crunch_probability: profile.crunch_probability,
                burnout_risk: PhaseBurnoutRisk::assess(avg_hours, avg_satisfaction),
            })
        })
        .collect();

    CrunchReport {
        records_version: records.version.clone(),
        department,
        departments,
        phases,
    }
}

fn department_crunch(department: Department, members: &[&EmployeeRecord], params: &CrunchParameters) -> DepartmentCrunch {
    let hours: Vec<f64> = members.iter().filter_map(|e| params.weekly_hours(e)).collect();
    let satisfaction: Vec<f64> = members.iter().map(|e| e.satisfaction_score).collect();
    let in_crunch = hours.iter().filter(|h| **h > params.crunch_weekly_hours).count();
    let avg_weekly_hours = mean(&hours);

    DepartmentCrunch {
        department,
        total_employees: members.len(),
        observed: hours.len(),
        employees_in_crunch: in_crunch,
        crunch_percentage: if hours.is_empty() {
            0.0
        } else {
            in_crunch as f64 / hours.len() as f64 * 100.0
        },
        avg_weekly_hours,
        max_weekly_hours: hours.iter().copied().reduce(f64::max),
        avg_satisfaction: mean(&satisfaction).unwrap_or_default(),
        productivity_impact: avg_weekly_hours.map_or(0.0, |h| params.productivity_impact(h)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gwo_core::{EmployeeId, GamingMetrics, Level, ProjectId, ProjectRecord, ProjectType, TeamId};

    fn employee(id: &str, department: Department, team: Option<&str>, overtime: Option<f64>, satisfaction: f64) -> EmployeeRecord {
        EmployeeRecord {
            id: EmployeeId::new(id),
            department,
            level: Level::Mid,
            team_id: team.map(TeamId::new),
            salary: 70_000.0,
            satisfaction_score: satisfaction,
            performance_score: 3.0,
            years_experience: 4.0,
            hire_date: NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
            recorded_on: None,
            metrics: GamingMetrics {
                crunch_hours_last_month: overtime,
                ..GamingMetrics::default()
            },
        }
    }

    fn project(id: &str, phase: ProjectPhase, team: &str) -> ProjectRecord {
        ProjectRecord {
            id: ProjectId::new(id),
            project_type: ProjectType::Aaa,
            phase,
            platforms: BTreeSet::new(),
            team_ids: [TeamId::new(team)].into_iter().collect(),
            delivery: Default::default(),
        }
    }

    /// Monthly overtime giving `weekly` hours on a 40h contract.
    fn overtime_for(weekly: f64) -> Option<f64> {
        Some((weekly - 40.0) * WEEKS_PER_MONTH)
    }

    fn studio() -> RecordSet {
        RecordSet::new(
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            vec![
                employee("p1", Department::Programming, Some("engine"), overtime_for(60.0), 4.0),
                employee("p2", Department::Programming, Some("engine"), overtime_for(52.0), 5.0),
                employee("p3", Department::Programming, None, None, 8.0),
                employee("a1", Department::Art, Some("env"), overtime_for(40.0), 8.0),
                employee("a2", Department::Art, Some("env"), overtime_for(44.0), 7.0),
            ],
            vec![project("beta-game", ProjectPhase::Beta, "engine"), project("live", ProjectPhase::LiveOps, "env")],
        )
        .unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn departments_report_crunch_share_and_productivity_loss() {
        let report = analyze_crunch(&studio(), None, &CrunchParameters::default());
        assert_eq!(report.departments.len(), 2);

        let programming = report
            .departments
            .iter()
            .find(|d| d.department == Department::Programming)
            .unwrap();
        assert_eq!(programming.total_employees, 3);
        assert_eq!(programming.observed, 2);
        assert_eq!(programming.employees_in_crunch, 2);
        assert!(close(programming.crunch_percentage, 100.0));
        assert!(close(programming.avg_weekly_hours.unwrap(), 56.0));
        assert!(close(programming.max_weekly_hours.unwrap(), 60.0));
        // (56 - 45) * 0.02
        assert!(close(programming.productivity_impact, 0.22));

        let art = report.departments.iter().find(|d| d.department == Department::Art).unwrap();
        assert_eq!(art.employees_in_crunch, 0);
        assert_eq!(art.productivity_impact, 0.0);
    }

    #[test]
    fn productivity_loss_is_capped() {
        let params = CrunchParameters::default();
        assert_eq!(params.productivity_impact(45.0), 0.0);
        assert!(close(params.productivity_impact(80.0), 0.5));
    }

    #[test]
    fn phases_compare_hours_with_expectations() {
        let report = analyze_crunch(&studio(), None, &CrunchParameters::default());
        let phases: Vec<ProjectPhase> = report.phases.iter().map(|p| p.phase).collect();
        assert_eq!(phases, [ProjectPhase::Beta, ProjectPhase::LiveOps]);

        let beta = &report.phases[0];
        assert_eq!(beta.employees, 2);
        assert!(close(beta.hours_deviation, 56.0 - 48.0));
        assert!(close(beta.crunch_probability, 0.75));
        // >55h (3) + satisfaction 4.5 (2)
        assert_eq!(beta.burnout_risk, PhaseBurnoutRisk::High);

        let live = &report.phases[1];
        assert!(close(live.avg_weekly_hours, 42.0));
        assert_eq!(live.burnout_risk, PhaseBurnoutRisk::Low);
    }

    #[test]
    fn department_filter_narrows_both_views() {
        let report = analyze_crunch(&studio(), Some(Department::Art), &CrunchParameters::default());
        assert_eq!(report.departments.len(), 1);
        assert_eq!(report.phases.len(), 1);
        assert_eq!(report.phases[0].phase, ProjectPhase::LiveOps);
    }

    #[test]
    fn unlisted_phase_uses_fallback_and_duplicates_are_rejected() {
        let mut params = CrunchParameters::default();
        params.phases.retain(|p| p.phase != ProjectPhase::Beta);
        let report = analyze_crunch(&studio(), None, &params);
        assert!(close(report.phases[0].expected_weekly_hours, 40.0));
        assert!(close(report.phases[0].crunch_probability, 0.40));

        params.phases.push(PhaseProfile::new(ProjectPhase::Alpha, 45.0, 0.6));
        assert!(params.validate().is_err());
        assert!(CrunchParameters::default().validate().is_ok());
    }
}
