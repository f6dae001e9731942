//! Per-team aggregates and the projects each team works on.

use std::collections::BTreeMap;

use serde::Serialize;

use gwo_core::stats::mean;
use gwo_core::{Department, EmployeeRecord, ProjectId, ProjectPhase, ProjectType, RecordSet};

use crate::params::KpiParameters;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamProject {
    pub id: ProjectId,
    pub project_type: ProjectType,
    pub phase: ProjectPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
    pub team: String,
    /// Most common department among members (ties go to declaration order).
    pub department: Department,
    pub headcount: usize,
    pub avg_satisfaction: f64,
    pub avg_sprint_velocity: Option<f64>,
    pub avg_crunch_hours: Option<f64>,
    pub over_crunch_threshold: usize,
    pub projects: Vec<TeamProject>,
    /// Fewer velocity observations than `min_team_sample`.
    pub insufficient_data: bool,
}

/// Summarize every team, optionally restricted to one department.
///
/// Teams are keyed by [`EmployeeRecord::team_key`] and returned in key order.
pub fn summarize_teams(
    records: &RecordSet,
    department: Option<Department>,
    params: &KpiParameters,
) -> Vec<TeamSummary> {
    let mut teams: BTreeMap<String, Vec<&EmployeeRecord>> = BTreeMap::new();
    for e in &records.employees {
        teams.entry(e.team_key()).or_default().push(e);
    }

    teams
        .into_iter()
        .filter_map(|(team, members)| {
            let team_department = majority_department(&members)?;
            department
                .is_none_or(|wanted| wanted == team_department)
                .then(|| summarize(records, team, team_department, &members, params))
        })
        .collect()
}

fn majority_department(members: &[&EmployeeRecord]) -> Option<Department> {
    let mut counts: BTreeMap<Department, usize> = BTreeMap::new();
    for e in members {
        *counts.entry(e.department).or_default() += 1;
    }
    let top = counts.values().copied().max()?;
    Department::ALL
        .iter()
        .copied()
        .find(|d| counts.get(d) == Some(&top))
}

fn summarize(
    records: &RecordSet,
    team: String,
    department: Department,
    members: &[&EmployeeRecord],
    params: &KpiParameters,
) -> TeamSummary {
    let satisfaction: Vec<f64> = members.iter().map(|e| e.satisfaction_score).collect();
    let velocity: Vec<f64> = members.iter().filter_map(|e| e.metrics.sprint_velocity).collect();
    let crunch: Vec<f64> = members
        .iter()
        .filter_map(|e| e.metrics.crunch_hours_last_month)
        .collect();

    let projects = records
        .projects
        .iter()
        .filter(|p| p.team_ids.iter().any(|t| t.as_str() == team))
        .map(|p| TeamProject {
            id: p.id.clone(),
            project_type: p.project_type,
            phase: p.phase,
        })
        .collect();

    TeamSummary {
        department,
        headcount: members.len(),
        avg_satisfaction: mean(&satisfaction).unwrap_or_default(),
        avg_sprint_velocity: mean(&velocity),
        avg_crunch_hours: mean(&crunch),
        over_crunch_threshold: crunch
            .iter()
            .filter(|h| **h > params.crunch_threshold_hours)
            .count(),
        projects,
        insufficient_data: velocity.len() < params.min_team_sample,
        team,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gwo_core::{EmployeeId, GamingMetrics, Level, ProjectRecord, TeamId};
    use std::collections::BTreeSet;

    fn member(id: &str, department: Department, team: Option<&str>, crunch: f64) -> EmployeeRecord {
        EmployeeRecord {
            id: EmployeeId::new(id),
            department,
            level: Level::Senior,
            team_id: team.map(TeamId::new),
            salary: 90_000.0,
            satisfaction_score: 7.0,
            performance_score: 4.0,
            years_experience: 6.0,
            hire_date: NaiveDate::from_ymd_opt(2019, 3, 1).unwrap(),
            recorded_on: None,
            metrics: GamingMetrics {
                sprint_velocity: Some(42.0),
                crunch_hours_last_month: Some(crunch),
                ..GamingMetrics::default()
            },
        }
    }

    #[test]
    fn teams_group_members_and_link_projects() {
        let employees = vec![
            member("e1", Department::Programming, Some("engine"), 50.0),
            member("e2", Department::Programming, Some("engine"), 10.0),
            member("e3", Department::Art, Some("engine"), 20.0),
            member("e4", Department::Qa, None, 0.0),
        ];
        let project = ProjectRecord {
            id: ProjectId::new("p1"),
            project_type: ProjectType::Aaa,
            phase: ProjectPhase::Alpha,
            platforms: BTreeSet::new(),
            team_ids: [TeamId::new("engine")].into_iter().collect(),
            delivery: Default::default(),
        };
        let set = RecordSet::new(
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            employees,
            vec![project],
        )
        .unwrap();

        let all = summarize_teams(&set, None, &KpiParameters::default());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].team, "QA:unassigned");
        assert!(all[0].insufficient_data);

        let engine = &all[1];
        assert_eq!(engine.department, Department::Programming);
        assert_eq!(engine.headcount, 3);
        assert_eq!(engine.over_crunch_threshold, 1);
        assert!(!engine.insufficient_data);
        assert_eq!(engine.projects.len(), 1);
        assert_eq!(engine.projects[0].phase, ProjectPhase::Alpha);

        let art_only = summarize_teams(&set, Some(Department::Art), &KpiParameters::default());
        assert!(art_only.is_empty());
    }
}
