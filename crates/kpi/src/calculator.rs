//! KPI Calculator: pure functions from a validated record set to a KPI report.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gwo_core::stats::{mean, weighted_mean};
use gwo_core::{Department, EmployeeRecord, EngineError, EngineResult, Fingerprint, RecordSet};

use crate::definition::{AggregationRule, CustomFormula, KpiDefinition, KpiRegistry, RecordField};
use crate::params::KpiParameters;
use crate::query::KpiQuery;
use crate::result::{KpiFailure, KpiReport, KpiResult, KpiStatus, NotComputable, Trend};

/// Cache namespace for KPI reports.
pub const KPI_NAMESPACE: &str = "kpi";

/// Outcome of applying one rule to one subset of records.
#[derive(Debug, Clone, PartialEq)]
enum Evaluation {
    Value {
        value: f64,
        sample_size: usize,
        notes: Vec<String>,
    },
    NotComputable {
        reason: String,
        notes: Vec<String>,
    },
}

impl Evaluation {
    fn not_computable(reason: impl Into<String>) -> Self {
        Evaluation::NotComputable {
            reason: reason.into(),
            notes: Vec::new(),
        }
    }

    fn value(&self) -> Option<f64> {
        match self {
            Evaluation::Value { value, .. } => Some(*value),
            Evaluation::NotComputable { .. } => None,
        }
    }
}

/// Computes the registered KPI set.
///
/// Holds only read-only configuration; every call works on its own input
/// snapshot, so one calculator can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct KpiCalculator {
    registry: Arc<KpiRegistry>,
    params: KpiParameters,
}

#[derive(Serialize)]
struct FingerprintParams<'a> {
    params: &'a KpiParameters,
    definitions: Vec<&'a KpiDefinition>,
    query: &'a KpiQuery,
}

impl KpiCalculator {
    pub fn new(registry: Arc<KpiRegistry>, params: KpiParameters) -> EngineResult<Self> {
        params.validate()?;
        Ok(Self { registry, params })
    }

    /// Calculator over the built-in registry, or over `params.definitions`
    /// when that list is non-empty.
    pub fn from_params(params: KpiParameters) -> EngineResult<Self> {
        let registry = if params.definitions.is_empty() {
            KpiRegistry::builtin()
        } else {
            KpiRegistry::from_definitions(params.definitions.clone())?
        };
        Self::new(Arc::new(registry), params)
    }

    pub fn registry(&self) -> &KpiRegistry {
        &self.registry
    }

    pub fn params(&self) -> &KpiParameters {
        &self.params
    }

    /// Fingerprint of (record-set version, parameters, registry, query).
    pub fn fingerprint(&self, records: &RecordSet, query: &KpiQuery) -> EngineResult<Fingerprint> {
        let input = FingerprintParams {
            params: &self.params,
            definitions: self.registry.iter().collect(),
            query,
        };
        Fingerprint::compute(&records.version, KPI_NAMESPACE, &input)
    }

    /// Compute every registered KPI matching `query`.
    ///
    /// A KPI whose required field is absent from every selected record fails
    /// with `MissingInput`; the remaining KPIs are still computed.
    pub fn compute(
        &self,
        records: &RecordSet,
        query: &KpiQuery,
        computed_at: DateTime<Utc>,
    ) -> EngineResult<KpiReport> {
        let fingerprint = self.fingerprint(records, query)?;
        let current = query.select(&records.employees, query.window.as_ref());
        let previous = query
            .window
            .and_then(|w| w.preceding())
            .map(|w| query.select(&records.employees, Some(&w)));

        let mut report = KpiReport {
            fingerprint: fingerprint.clone(),
            records_version: records.version.clone(),
            computed_at,
            results: Vec::new(),
            not_computable: Vec::new(),
            failures: Vec::new(),
        };

        let definitions = self
            .registry
            .iter()
            .filter(|d| query.category.is_none_or(|c| d.category == c));

        for definition in definitions {
            if current.is_empty() {
                report.not_computable.push(NotComputable {
                    name: definition.name.clone(),
                    reason: "no records match the selected filters".to_string(),
                    insufficient_data: Vec::new(),
                });
                continue;
            }

            if let Some(field) = first_absent_field(&definition.rule, &current) {
                tracing::debug!(kpi = %definition.name, field = %field, "kpi input absent");
                report.failures.push(KpiFailure {
                    name: definition.name.clone(),
                    error: EngineError::missing_input(&definition.name, field.as_str()),
                });
                continue;
            }

            match self.evaluate(&definition.rule, &current) {
                Evaluation::Value {
                    value,
                    sample_size,
                    notes,
                } => {
                    let trend = previous
                        .as_deref()
                        .filter(|prev| !prev.is_empty())
                        .and_then(|prev| self.evaluate(&definition.rule, prev).value())
                        .map(|prev| Trend::between(prev, value, self.params.trend_tolerance))
                        .unwrap_or(Trend::Stable);

                    report.results.push(KpiResult {
                        name: definition.name.clone(),
                        category: definition.category,
                        value,
                        target: definition.target,
                        direction: definition.direction,
                        trend,
                        status: KpiStatus::grade(
                            value,
                            definition.target,
                            definition.direction,
                            &definition.thresholds,
                        ),
                        department_breakdown: self.breakdown(&definition.rule, &current),
                        sample_size,
                        insufficient_data: notes,
                        computed_at,
                        fingerprint: fingerprint.clone(),
                    });
                }
                Evaluation::NotComputable { reason, notes } => {
                    report.not_computable.push(NotComputable {
                        name: definition.name.clone(),
                        reason,
                        insufficient_data: notes,
                    });
                }
            }
        }

        tracing::info!(
            fingerprint = %fingerprint.short(),
            records = current.len(),
            results = report.results.len(),
            not_computable = report.not_computable.len(),
            failures = report.failures.len(),
            "kpi batch computed"
        );
        Ok(report)
    }

    fn breakdown(&self, rule: &AggregationRule, records: &[&EmployeeRecord]) -> BTreeMap<Department, f64> {
        let mut by_department: BTreeMap<Department, Vec<&EmployeeRecord>> = BTreeMap::new();
        for e in records {
            by_department.entry(e.department).or_default().push(*e);
        }
        by_department
            .into_iter()
            .filter(|(_, subset)| first_absent_field(rule, subset).is_none())
            .filter_map(|(department, subset)| {
                self.evaluate(rule, &subset).value().map(|v| (department, v))
            })
            .collect()
    }

    fn evaluate(&self, rule: &AggregationRule, records: &[&EmployeeRecord]) -> Evaluation {
        match rule {
            AggregationRule::Mean { field } => {
                let values: Vec<f64> = records.iter().filter_map(|e| field.value(e)).collect();
                match mean(&values) {
                    Some(value) => Evaluation::Value {
                        value,
                        sample_size: values.len(),
                        notes: Vec::new(),
                    },
                    None => Evaluation::not_computable(format!("no `{field}` values")),
                }
            }
            AggregationRule::WeightedMean { value, weight } => {
                let pairs: Vec<(f64, f64)> = records
                    .iter()
                    .filter_map(|e| Some((value.value(e)?, weight.value(e)?)))
                    .collect();
                match weighted_mean(&pairs) {
                    Some(v) => Evaluation::Value {
                        value: v,
                        sample_size: pairs.len(),
                        notes: Vec::new(),
                    },
                    None => Evaluation::not_computable(format!("total `{weight}` weight is zero")),
                }
            }
            AggregationRule::Ratio {
                numerator,
                denominator,
            } => {
                let pairs: Vec<(f64, f64)> = records
                    .iter()
                    .filter_map(|e| Some((numerator.value(e)?, denominator.value(e)?)))
                    .collect();
                let num: f64 = pairs.iter().map(|(n, _)| n).sum();
                let den: f64 = pairs.iter().map(|(_, d)| d).sum();
                if den <= 0.0 {
                    return Evaluation::not_computable(format!("`{denominator}` sums to zero"));
                }
                Evaluation::Value {
                    value: num / den,
                    sample_size: pairs.len(),
                    notes: Vec::new(),
                }
            }
            AggregationRule::Custom { formula } => match formula {
                CustomFormula::SprintVelocity => self.sprint_velocity(records),
                CustomFormula::CrunchImpact => self.crunch_impact(records),
                CustomFormula::InnovationIndex => self.innovation_index(records),
            },
        }
    }

    /// Mean of per-team means, leaving out teams below `min_team_sample`.
    fn sprint_velocity(&self, records: &[&EmployeeRecord]) -> Evaluation {
        let mut teams: BTreeMap<(Department, String), Vec<f64>> = BTreeMap::new();
        for e in records {
            if let Some(v) = e.metrics.sprint_velocity {
                teams.entry((e.department, e.team_key())).or_default().push(v);
            }
        }

        let min = self.params.min_team_sample;
        let mut team_means = Vec::new();
        let mut sample_size = 0;
        let mut notes = Vec::new();
        for ((department, team), velocities) in &teams {
            if velocities.len() < min {
                notes.push(format!(
                    "{department}/{team}: {} velocity observation(s), need {min}",
                    velocities.len()
                ));
                continue;
            }
            sample_size += velocities.len();
            team_means.extend(mean(velocities));
        }

        match mean(&team_means) {
            Some(value) => Evaluation::Value {
                value,
                sample_size,
                notes,
            },
            None => Evaluation::NotComputable {
                reason: format!("insufficient data: no team has {min} velocity observations"),
                notes,
            },
        }
    }

    /// Batch-scoped: compares the over-threshold and at-or-under cohorts of
    /// the records passed in.
    fn crunch_impact(&self, records: &[&EmployeeRecord]) -> Evaluation {
        let p = &self.params;
        let observed: Vec<(f64, f64)> = records
            .iter()
            .filter_map(|e| Some((e.metrics.crunch_hours_last_month?, e.satisfaction_score)))
            .collect();

        let (over, under): (Vec<_>, Vec<_>) = observed
            .iter()
            .partition(|(hours, _)| *hours > p.crunch_threshold_hours);
        let over_sat: Vec<f64> = over.iter().map(|(_, s)| *s).collect();
        let under_sat: Vec<f64> = under.iter().map(|(_, s)| *s).collect();

        let (Some(mean_over), Some(mean_under)) = (mean(&over_sat), mean(&under_sat)) else {
            let empty = if over_sat.is_empty() { "over" } else { "at-or-under" };
            return Evaluation::not_computable(format!(
                "{empty}-threshold cohort ({} h) is empty",
                p.crunch_threshold_hours
            ));
        };

        let hours: Vec<f64> = observed.iter().map(|(h, _)| *h).collect();
        let mean_hours = mean(&hours).unwrap_or_default();
        let normalized_hours = (mean_hours / p.crunch_normalization_hours).clamp(0.0, 1.0);
        let delta = ((mean_under - mean_over) / 9.0).clamp(0.0, 1.0);
        let total_weight = p.crunch_hours_weight + p.satisfaction_delta_weight;

        Evaluation::Value {
            value: 10.0 * (p.crunch_hours_weight * normalized_hours + p.satisfaction_delta_weight * delta)
                / total_weight,
            sample_size: observed.len(),
            notes: Vec::new(),
        }
    }

    fn innovation_index(&self, records: &[&EmployeeRecord]) -> Evaluation {
        let p = &self.params;
        let innovation: Vec<f64> = records
            .iter()
            .filter_map(|e| e.metrics.innovation_index)
            .collect();
        let Some(mean_innovation) = mean(&innovation) else {
            return Evaluation::not_computable("no `innovation_index` values");
        };
        let collaboration: Vec<f64> = records
            .iter()
            .filter_map(|e| RecordField::CrossDepartmentCollaborations.value(e))
            .collect();

        let innovation_term = p.innovation_weight * mean_innovation / 100.0;
        let value = match mean(&collaboration) {
            Some(c) if p.collaboration_weight > 0.0 => {
                let collaboration_term = p.collaboration_weight * (c / p.collaboration_cap).min(1.0);
                100.0 * (innovation_term + collaboration_term) / (p.innovation_weight + p.collaboration_weight)
            }
            _ => 100.0 * innovation_term / p.innovation_weight,
        };

        Evaluation::Value {
            value,
            sample_size: innovation.len(),
            notes: Vec::new(),
        }
    }
}

/// First required field of `rule` that no record carries.
fn first_absent_field(rule: &AggregationRule, records: &[&EmployeeRecord]) -> Option<RecordField> {
    rule.required_fields()
        .into_iter()
        .find(|field| records.iter().all(|e| field.value(e).is_none()))
}
