//! Record Validator.
//!
//! Checks every row of a raw batch and either returns a fully typed
//! [`RecordSet`] or the complete list of field-level violations. Validation
//! never stops at the first problem and never returns a partial batch.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::id::{EmployeeId, ProjectId, TeamId};
use crate::raw::{
    EmployeeUpdate, RawDeliveryMetrics, RawEmployeeRecord, RawGamingMetrics, RawProjectRecord,
    RawRecordSet,
};
use crate::record::{
    DeliveryMetrics, EmployeeRecord, GamingMetrics, ProjectRecord, Record, RecordKind, RecordSet,
};

/// One failed constraint on one field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub record_kind: RecordKind,
    /// Position of the record in its input list.
    pub index: usize,
    pub record_id: Option<String>,
    pub field: String,
    pub constraint: String,
    pub actual: String,
}

/// Validate a raw batch.
pub fn validate(raw: &RawRecordSet) -> EngineResult<RecordSet> {
    let mut violations = Vec::new();

    let employees: Vec<(usize, EmployeeRecord)> = raw
        .employees
        .iter()
        .enumerate()
        .filter_map(|(index, row)| check_employee(index, row, raw.as_of, &mut violations).map(|e| (index, e)))
        .collect();

    let projects: Vec<(usize, ProjectRecord)> = raw
        .projects
        .iter()
        .enumerate()
        .filter_map(|(index, row)| check_project(index, row, &mut violations).map(|p| (index, p)))
        .collect();

    check_unique(&employees, &mut violations);
    check_unique(&projects, &mut violations);

    if !violations.is_empty() {
        violations.sort_by(|a, b| {
            (a.record_kind as u8, a.index, &a.field).cmp(&(b.record_kind as u8, b.index, &b.field))
        });
        tracing::info!(
            employees = raw.employees.len(),
            projects = raw.projects.len(),
            violations = violations.len(),
            "record batch rejected"
        );
        return Err(EngineError::Validation(violations));
    }

    let employees: Vec<EmployeeRecord> = employees.into_iter().map(|(_, e)| e).collect();
    let projects: Vec<ProjectRecord> = projects.into_iter().map(|(_, p)| p).collect();
    let as_of = raw.as_of.unwrap_or_else(|| latest_observation(&employees));

    let set = RecordSet::new(as_of, employees, projects)?;
    tracing::debug!(
        version = %set.version,
        employees = set.employees.len(),
        projects = set.projects.len(),
        "record batch validated"
    );
    Ok(set)
}

/// Apply a partial metrics update to a validated employee, producing a new
/// snapshot. The original record is left untouched.
pub fn apply_update(
    record: &EmployeeRecord,
    update: &EmployeeUpdate,
) -> EngineResult<EmployeeRecord> {
    let mut violations = Vec::new();
    let mut row = RowChecker::new(RecordKind::Employee, 0, Some(record.id.to_string()), &mut violations);

    let satisfaction = row
        .number_in("satisfaction_score", update.satisfaction_score, 1.0, 10.0)
        .unwrap_or(record.satisfaction_score);
    let performance = row
        .number_in("performance_score", update.performance_score, 1.0, 5.0)
        .unwrap_or(record.performance_score);
    let merged = RawGamingMetrics::from(&record.metrics).overlay(&update.metrics);
    let metrics = check_metrics(&mut row, &merged);

    if !violations.is_empty() {
        return Err(EngineError::Validation(violations));
    }

    Ok(EmployeeRecord {
        satisfaction_score: satisfaction,
        performance_score: performance,
        metrics,
        ..record.clone()
    })
}

fn latest_observation(employees: &[EmployeeRecord]) -> NaiveDate {
    employees
        .iter()
        .flat_map(|e| [Some(e.hire_date), e.recorded_on])
        .flatten()
        .max()
        .unwrap_or_default()
}

fn check_unique<R: Record>(rows: &[(usize, R)], violations: &mut Vec<FieldViolation>) {
    let mut seen: HashMap<&R::Id, usize> = HashMap::new();
    for (index, record) in rows {
        if let Some(first) = seen.get(record.id()) {
            violations.push(FieldViolation {
                record_kind: R::KIND,
                index: *index,
                record_id: Some(record.id().to_string()),
                field: "id".to_string(),
                constraint: "unique within the batch".to_string(),
                actual: format!("duplicate of record at index {first}"),
            });
        } else {
            seen.insert(record.id(), *index);
        }
    }
}

fn check_employee(
    index: usize,
    raw: &RawEmployeeRecord,
    as_of: Option<NaiveDate>,
    violations: &mut Vec<FieldViolation>,
) -> Option<EmployeeRecord> {
    let mut row = RowChecker::new(RecordKind::Employee, index, raw.id.clone(), violations);

    let id = row.identifier("id", raw.id.as_deref());
    let department = row.parse_enum("department", raw.department.as_deref());
    let level = row.parse_enum("level", raw.level.as_deref());
    let team_id = match raw.team_id.as_deref() {
        Some(t) if t.trim().is_empty() => {
            row.violation("team_id", "non-empty when present", "\"\"");
            None
        }
        Some(t) => Some(TeamId::new(t.trim())),
        None => None,
    };
    let salary = row.required_number("salary", raw.salary, 0.0, f64::INFINITY);
    let satisfaction = row.required_number("satisfaction_score", raw.satisfaction_score, 1.0, 10.0);
    let performance = row.required_number("performance_score", raw.performance_score, 1.0, 5.0);
    let experience = row.required_number("years_experience", raw.years_experience, 0.0, f64::INFINITY);
    let hire_date = row.required_date("hire_date", raw.hire_date.as_deref(), as_of);
    let recorded_on = row.date("recorded_on", raw.recorded_on.as_deref(), as_of);
    let metrics = check_metrics(&mut row, &raw.metrics.clone().unwrap_or_default());

    Some(EmployeeRecord {
        id: EmployeeId::new(id?),
        department: department?,
        level: level?,
        team_id,
        salary: salary?,
        satisfaction_score: satisfaction?,
        performance_score: performance?,
        years_experience: experience?,
        hire_date: hire_date?,
        recorded_on,
        metrics,
    })
}

fn check_metrics(row: &mut RowChecker<'_>, raw: &RawGamingMetrics) -> GamingMetrics {
    let tool_proficiency = raw
        .tool_proficiency
        .iter()
        .flatten()
        .enumerate()
        .filter_map(|(i, tool)| {
            let tool = tool.trim();
            if tool.is_empty() {
                row.violation(&format!("metrics.tool_proficiency[{i}]"), "non-empty", "\"\"");
                None
            } else {
                Some(tool.to_string())
            }
        })
        .collect::<BTreeSet<_>>();

    let velocity_history = raw
        .velocity_history
        .iter()
        .flatten()
        .enumerate()
        .filter_map(|(i, v)| {
            row.number_in(
                &format!("metrics.velocity_history[{i}]"),
                Some(*v),
                0.0,
                f64::INFINITY,
            )
        })
        .collect();

    GamingMetrics {
        sprint_velocity: row.number_in("metrics.sprint_velocity", raw.sprint_velocity, 0.0, f64::INFINITY),
        bug_fix_rate: row.number_in("metrics.bug_fix_rate", raw.bug_fix_rate, 0.0, 100.0),
        innovation_index: row.number_in("metrics.innovation_index", raw.innovation_index, 0.0, 100.0),
        crunch_hours_last_month: row.number_in(
            "metrics.crunch_hours_last_month",
            raw.crunch_hours_last_month,
            0.0,
            f64::INFINITY,
        ),
        tool_proficiency,
        team_collaboration_score: row.number_in(
            "metrics.team_collaboration_score",
            raw.team_collaboration_score,
            0.0,
            10.0,
        ),
        cross_department_collaborations: row.count(
            "metrics.cross_department_collaborations",
            raw.cross_department_collaborations,
        ),
        satisfaction_trend: row.number_in("metrics.satisfaction_trend", raw.satisfaction_trend, -9.0, 9.0),
        crunch_hours_trend: row.number_in(
            "metrics.crunch_hours_trend",
            raw.crunch_hours_trend,
            f64::NEG_INFINITY,
            f64::INFINITY,
        ),
        velocity_history,
    }
}

fn check_project(
    index: usize,
    raw: &RawProjectRecord,
    violations: &mut Vec<FieldViolation>,
) -> Option<ProjectRecord> {
    let mut row = RowChecker::new(RecordKind::Project, index, raw.id.clone(), violations);

    let id = row.identifier("id", raw.id.as_deref());
    let project_type = row.parse_enum("project_type", raw.project_type.as_deref());
    let phase = row.parse_enum("phase", raw.phase.as_deref());

    let platforms = raw
        .platforms
        .iter()
        .flatten()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let team_ids = raw
        .team_ids
        .iter()
        .flatten()
        .enumerate()
        .filter_map(|(i, t)| {
            if t.trim().is_empty() {
                row.violation(&format!("team_ids[{i}]"), "non-empty", "\"\"");
                None
            } else {
                Some(TeamId::new(t.trim()))
            }
        })
        .collect();

    let delivery = check_delivery(&mut row, &raw.delivery.clone().unwrap_or_default());

    Some(ProjectRecord {
        id: ProjectId::new(id?),
        project_type: project_type?,
        phase: phase?,
        platforms,
        team_ids,
        delivery,
    })
}

fn check_delivery(row: &mut RowChecker<'_>, raw: &RawDeliveryMetrics) -> DeliveryMetrics {
    let planned = row.count("delivery.milestones_planned", raw.milestones_planned).unwrap_or(0);
    let completed = row
        .count("delivery.milestones_completed", raw.milestones_completed)
        .unwrap_or(0);
    if completed > planned {
        row.violation(
            "delivery.milestones_completed",
            format!("<= milestones_planned ({planned})"),
            completed.to_string(),
        );
    }

    DeliveryMetrics {
        milestones_planned: planned,
        milestones_completed: completed,
        on_time_rate: row.number_in("delivery.on_time_rate", raw.on_time_rate, 0.0, 100.0),
        budget_variance_pct: row.number_in(
            "delivery.budget_variance_pct",
            raw.budget_variance_pct,
            f64::NEG_INFINITY,
            f64::INFINITY,
        ),
    }
}

/// Collects violations for a single row.
struct RowChecker<'a> {
    kind: RecordKind,
    index: usize,
    record_id: Option<String>,
    violations: &'a mut Vec<FieldViolation>,
}

impl<'a> RowChecker<'a> {
    fn new(
        kind: RecordKind,
        index: usize,
        record_id: Option<String>,
        violations: &'a mut Vec<FieldViolation>,
    ) -> Self {
        Self {
            kind,
            index,
            record_id,
            violations,
        }
    }

    fn violation(&mut self, field: &str, constraint: impl Into<String>, actual: impl Into<String>) {
        self.violations.push(FieldViolation {
            record_kind: self.kind,
            index: self.index,
            record_id: self.record_id.clone(),
            field: field.to_string(),
            constraint: constraint.into(),
            actual: actual.into(),
        });
    }

    fn missing(&mut self, field: &str) {
        self.violation(field, "required", "<missing>");
    }

    fn identifier(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            Some(_) => {
                self.violation(field, "non-empty", "\"\"");
                None
            }
            None => {
                self.missing(field);
                None
            }
        }
    }

    fn parse_enum<T>(&mut self, field: &str, value: Option<&str>) -> Option<T>
    where
        T: core::str::FromStr<Err = EngineError>,
    {
        let Some(text) = value else {
            self.missing(field);
            return None;
        };
        match text.parse::<T>() {
            Ok(v) => Some(v),
            Err(EngineError::InvalidParameter { valid, .. }) => {
                self.violation(field, format!("one of: {}", valid.join(", ")), text);
                None
            }
            Err(e) => {
                self.violation(field, e.to_string(), text);
                None
            }
        }
    }

    /// Range check for an optional field; absence is not a violation.
    fn number_in(&mut self, field: &str, value: Option<f64>, min: f64, max: f64) -> Option<f64> {
        let v = value?;
        if v.is_finite() && v >= min && v <= max {
            return Some(v);
        }
        let constraint = match (min.is_finite(), max.is_finite()) {
            (true, true) => format!("within [{min}, {max}]"),
            (true, false) => format!(">= {min}"),
            (false, true) => format!("<= {max}"),
            (false, false) => "finite".to_string(),
        };
        self.violation(field, constraint, v.to_string());
        None
    }

    fn required_number(&mut self, field: &str, value: Option<f64>, min: f64, max: f64) -> Option<f64> {
        if value.is_none() {
            self.missing(field);
            return None;
        }
        self.number_in(field, value, min, max)
    }

    fn count(&mut self, field: &str, value: Option<f64>) -> Option<u32> {
        let v = value?;
        if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) {
            return Some(v as u32);
        }
        self.violation(field, "non-negative integer", v.to_string());
        None
    }

    fn date(&mut self, field: &str, value: Option<&str>, not_after: Option<NaiveDate>) -> Option<NaiveDate> {
        let text = value?;
        let Ok(date) = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") else {
            self.violation(field, "ISO date (YYYY-MM-DD)", text);
            return None;
        };
        if let Some(limit) = not_after {
            if date > limit {
                self.violation(field, format!("not after as_of ({limit})"), text);
                return None;
            }
        }
        Some(date)
    }

    fn required_date(
        &mut self,
        field: &str,
        value: Option<&str>,
        not_after: Option<NaiveDate>,
    ) -> Option<NaiveDate> {
        if value.is_none() {
            self.missing(field);
            return None;
        }
        self.date(field, value, not_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn employee(id: &str) -> RawEmployeeRecord {
        RawEmployeeRecord {
            id: Some(id.to_string()),
            department: Some("Programming".to_string()),
            level: Some("Senior".to_string()),
            team_id: Some("core-tech".to_string()),
            salary: Some(95_000.0),
            satisfaction_score: Some(7.5),
            performance_score: Some(4.0),
            years_experience: Some(6.0),
            hire_date: Some("2020-03-01".to_string()),
            recorded_on: Some("2024-05-01".to_string()),
            metrics: Some(RawGamingMetrics {
                sprint_velocity: Some(42.0),
                bug_fix_rate: Some(88.0),
                innovation_index: Some(70.0),
                crunch_hours_last_month: Some(12.0),
                tool_proficiency: Some(vec!["Unreal Engine".to_string(), "C++".to_string()]),
                ..RawGamingMetrics::default()
            }),
        }
    }

    fn project(id: &str) -> RawProjectRecord {
        RawProjectRecord {
            id: Some(id.to_string()),
            project_type: Some("AAA".to_string()),
            phase: Some("beta".to_string()),
            platforms: Some(vec!["PC".to_string(), "PS5".to_string()]),
            team_ids: Some(vec!["core-tech".to_string()]),
            delivery: Some(RawDeliveryMetrics {
                milestones_planned: Some(10.0),
                milestones_completed: Some(7.0),
                on_time_rate: Some(80.0),
                budget_variance_pct: Some(-3.5),
            }),
        }
    }

    fn batch(employees: Vec<RawEmployeeRecord>) -> RawRecordSet {
        RawRecordSet {
            as_of: None,
            employees,
            projects: vec![project("PRJ-1")],
        }
    }

    #[test]
    fn valid_batch_is_typed_and_versioned() {
        let set = validate(&batch(vec![employee("E1"), employee("E2")])).unwrap();
        assert_eq!(set.employees.len(), 2);
        assert_eq!(set.projects.len(), 1);
        assert_eq!(set.as_of, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(set.employees[0].metrics.tool_proficiency.len(), 2);

        let again = validate(&batch(vec![employee("E1"), employee("E2")])).unwrap();
        assert_eq!(set.version, again.version);
    }

    #[test]
    fn every_row_is_checked_before_rejecting() {
        let mut bad_satisfaction = employee("E1");
        bad_satisfaction.satisfaction_score = Some(11.0);
        let mut bad_department = employee("E2");
        bad_department.department = Some("Audio".to_string());
        let mut missing_level = employee("E3");
        missing_level.level = None;

        let err = validate(&batch(vec![bad_satisfaction, bad_department, missing_level])).unwrap_err();
        let EngineError::Validation(violations) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<(usize, &str)> = violations.iter().map(|v| (v.index, v.field.as_str())).collect();
        assert_eq!(
            fields,
            vec![(0, "satisfaction_score"), (1, "department"), (2, "level")]
        );
        assert_eq!(violations[0].actual, "11");
        assert!(violations[1].constraint.contains("QA"));
        assert_eq!(violations[2].actual, "<missing>");
    }

    #[test]
    fn duplicate_ids_are_violations() {
        let err = validate(&batch(vec![employee("E1"), employee("E1")])).unwrap_err();
        let EngineError::Validation(violations) = err else {
            panic!("expected validation error");
        };
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "id");
        assert_eq!(violations[0].index, 1);
    }

    #[test]
    fn project_milestones_must_not_exceed_plan() {
        let mut p = project("PRJ-2");
        p.delivery = Some(RawDeliveryMetrics {
            milestones_planned: Some(3.0),
            milestones_completed: Some(4.0),
            ..RawDeliveryMetrics::default()
        });
        let raw = RawRecordSet {
            as_of: None,
            employees: vec![employee("E1")],
            projects: vec![p],
        };
        let EngineError::Validation(violations) = validate(&raw).unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(violations[0].record_kind, RecordKind::Project);
        assert_eq!(violations[0].field, "delivery.milestones_completed");
    }

    #[test]
    fn absent_metrics_are_allowed() {
        let mut e = employee("E1");
        e.metrics = None;
        let set = validate(&batch(vec![e])).unwrap();
        assert_eq!(set.employees[0].metrics, GamingMetrics::default());
    }

    #[test]
    fn hire_date_after_explicit_as_of_is_rejected() {
        let mut raw = batch(vec![employee("E1")]);
        raw.as_of = NaiveDate::from_ymd_opt(2019, 1, 1);
        let EngineError::Validation(violations) = validate(&raw).unwrap_err() else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["hire_date", "recorded_on"]);
    }

    #[test]
    fn update_produces_new_snapshot_and_checks_ranges() {
        let set = validate(&batch(vec![employee("E1")])).unwrap();
        let original = &set.employees[0];

        let update = EmployeeUpdate {
            satisfaction_score: Some(4.0),
            metrics: RawGamingMetrics {
                crunch_hours_last_month: Some(70.0),
                ..RawGamingMetrics::default()
            },
            ..EmployeeUpdate::default()
        };
        let updated = apply_update(original, &update).unwrap();
        assert_eq!(updated.satisfaction_score, 4.0);
        assert_eq!(updated.metrics.crunch_hours_last_month, Some(70.0));
        assert_eq!(updated.metrics.sprint_velocity, Some(42.0));
        assert_eq!(original.metrics.crunch_hours_last_month, Some(12.0));

        let bad = EmployeeUpdate {
            metrics: RawGamingMetrics {
                bug_fix_rate: Some(140.0),
                ..RawGamingMetrics::default()
            },
            ..EmployeeUpdate::default()
        };
        assert!(matches!(
            apply_update(original, &bad),
            Err(EngineError::Validation(v)) if v[0].field == "metrics.bug_fix_rate"
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Accepted records always sit inside their documented ranges, and
        /// anything outside is rejected naming the offending field.
        #[test]
        fn accepted_scores_respect_ranges(
            satisfaction in -5.0f64..15.0,
            performance in -2.0f64..8.0,
            bug_fix in -50.0f64..150.0,
        ) {
            let mut e = employee("E1");
            e.satisfaction_score = Some(satisfaction);
            e.performance_score = Some(performance);
            let mut metrics = e.metrics.clone().unwrap_or_default();
            metrics.bug_fix_rate = Some(bug_fix);
            e.metrics = Some(metrics);

            match validate(&batch(vec![e])) {
                Ok(set) => {
                    let r = &set.employees[0];
                    prop_assert!((1.0..=10.0).contains(&r.satisfaction_score));
                    prop_assert!((1.0..=5.0).contains(&r.performance_score));
                    let rate = r.metrics.bug_fix_rate.unwrap_or_default();
                    prop_assert!((0.0..=100.0).contains(&rate));
                }
                Err(EngineError::Validation(violations)) => {
                    let expected: Vec<&str> = [
                        (!(1.0..=10.0).contains(&satisfaction)).then_some("satisfaction_score"),
                        (!(1.0..=5.0).contains(&performance)).then_some("performance_score"),
                        (!(0.0..=100.0).contains(&bug_fix)).then_some("metrics.bug_fix_rate"),
                    ]
                    .into_iter()
                    .flatten()
                    .collect();
                    prop_assert!(!expected.is_empty());
                    for field in expected {
                        prop_assert!(violations.iter().any(|v| v.field == field));
                    }
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }
    }
}
