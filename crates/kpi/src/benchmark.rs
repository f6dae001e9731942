//! Benchmark Comparator: positions values against static industry ranges.
//!
//! A missing department entry is reported per item (`UnknownDepartment`)
//! and never aborts the rest of the batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gwo_core::{Department, EngineError, EngineResult};

use crate::result::KpiResult;

/// Expected range for one metric.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRange {
    pub low: f64,
    pub median: f64,
    pub high: f64,
}

impl BenchmarkRange {
    pub const fn new(low: f64, median: f64, high: f64) -> Self {
        Self { low, median, high }
    }

    pub fn annotate(&self, value: f64) -> BenchmarkAnnotation {
        let position = if value < self.low {
            Position::Below
        } else if value > self.high {
            Position::Above
        } else {
            Position::At
        };
        BenchmarkAnnotation {
            position,
            gap: value - self.median,
            benchmark: *self,
        }
    }

    fn is_ordered(&self) -> bool {
        [self.low, self.median, self.high].iter().all(|v| v.is_finite())
            && self.low <= self.median
            && self.median <= self.high
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Below,
    At,
    Above,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct BenchmarkAnnotation {
    pub position: Position,
    /// `value - median`.
    pub gap: f64,
    pub benchmark: BenchmarkRange,
}

/// Configuration shape of one metric's benchmarks.
///
/// Department names are plain strings here and are checked when the table is
/// built, so configuration typos surface as load errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricBenchmarkConfig {
    pub industry: Option<BenchmarkRange>,
    pub departments: BTreeMap<String, BenchmarkRange>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct MetricBenchmarks {
    industry: Option<BenchmarkRange>,
    departments: BTreeMap<Department, BenchmarkRange>,
}

/// Read-only table of metric → department → range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkTable {
    metrics: BTreeMap<String, MetricBenchmarks>,
}

impl BenchmarkTable {
    pub fn from_config(config: &BTreeMap<String, MetricBenchmarkConfig>) -> EngineResult<Self> {
        let mut metrics = BTreeMap::new();
        for (metric, entry) in config {
            let mut departments = BTreeMap::new();
            for (name, range) in &entry.departments {
                let department: Department = name
                    .parse()
                    .map_err(|e| EngineError::config(format!("benchmarks.{metric}: {e}")))?;
                departments.insert(department, check_range(metric, name, *range)?);
            }
            let industry = entry
                .industry
                .map(|r| check_range(metric, "industry", r))
                .transpose()?;
            metrics.insert(
                metric.clone(),
                MetricBenchmarks {
                    industry,
                    departments,
                },
            );
        }
        Ok(Self { metrics })
    }

    /// Built-in industry table.
    pub fn builtin() -> Self {
        let mut metrics = BTreeMap::new();
        for (metric, industry, departments) in builtin_rows() {
            metrics.insert(
                metric.to_string(),
                MetricBenchmarks {
                    industry,
                    departments: departments.into_iter().collect(),
                },
            );
        }
        Self { metrics }
    }

    /// Overlay `other` on this table, metric by metric.
    pub fn merged_with(mut self, other: BenchmarkTable) -> Self {
        self.metrics.extend(other.metrics);
        self
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    pub fn industry(&self, metric: &str) -> Option<&BenchmarkRange> {
        self.metrics.get(metric)?.industry.as_ref()
    }

    pub fn lookup(&self, metric: &str, department: Department) -> EngineResult<&BenchmarkRange> {
        self.metrics
            .get(metric)
            .and_then(|m| m.departments.get(&department))
            .ok_or_else(|| EngineError::UnknownDepartment {
                department: department.to_string(),
                metric: metric.to_string(),
            })
    }

    /// Annotate KPI results: the overall value against the industry range
    /// and each department breakdown entry against its department range.
    pub fn compare_kpis(&self, results: &[KpiResult]) -> Vec<BenchmarkedKpi> {
        results
            .iter()
            .map(|kpi| {
                let mut departments = BTreeMap::new();
                let mut failures = Vec::new();
                if self.metrics.contains_key(&kpi.name) {
                    for (department, value) in &kpi.department_breakdown {
                        match self.lookup(&kpi.name, *department) {
                            Ok(range) => {
                                departments.insert(*department, range.annotate(*value));
                            }
                            Err(e) => failures.push(e),
                        }
                    }
                }
                BenchmarkedKpi {
                    overall: self.industry(&kpi.name).map(|r| r.annotate(kpi.value)),
                    departments,
                    failures,
                    kpi: kpi.clone(),
                }
            })
            .collect()
    }

    /// Annotate `(department, score)` pairs against one metric's department
    /// ranges, one outcome per item.
    pub fn compare_scores(
        &self,
        metric: &str,
        items: &[(Department, f64)],
    ) -> Vec<EngineResult<BenchmarkAnnotation>> {
        items
            .iter()
            .map(|(department, score)| Ok(self.lookup(metric, *department)?.annotate(*score)))
            .collect()
    }
}

fn check_range(metric: &str, scope: &str, range: BenchmarkRange) -> EngineResult<BenchmarkRange> {
    if range.is_ordered() {
        Ok(range)
    } else {
        Err(EngineError::config(format!(
            "benchmarks.{metric}.{scope}: expected low <= median <= high (got {range:?})"
        )))
    }
}

/// A KPI result with its benchmark annotations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkedKpi {
    pub kpi: KpiResult,
    pub overall: Option<BenchmarkAnnotation>,
    pub departments: BTreeMap<Department, BenchmarkAnnotation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<EngineError>,
}

type Row = (&'static str, Option<BenchmarkRange>, Vec<(Department, BenchmarkRange)>);

fn builtin_rows() -> Vec<Row> {
    use Department::*;
    let r = BenchmarkRange::new;
    vec![
        (
            "avg_satisfaction",
            Some(r(6.5, 7.2, 8.0)),
            vec![
                (Programming, r(6.6, 7.2, 7.9)),
                (Art, r(6.9, 7.5, 8.2)),
                (Design, r(7.4, 8.1, 8.7)),
                (Qa, r(6.1, 6.8, 7.5)),
                (Management, r(6.4, 7.0, 7.7)),
                (Marketing, r(6.5, 7.1, 7.8)),
            ],
        ),
        (
            "sprint_velocity",
            Some(r(32.0, 38.5, 45.0)),
            vec![
                (Programming, r(35.0, 40.0, 46.0)),
                (Art, r(28.0, 34.0, 40.0)),
                (Design, r(30.0, 36.0, 42.0)),
                (Qa, r(30.0, 37.0, 44.0)),
                (Marketing, r(20.0, 26.0, 32.0)),
                (Management, r(18.0, 24.0, 30.0)),
            ],
        ),
        (
            "bug_fix_rate",
            Some(r(78.0, 85.0, 92.0)),
            vec![
                (Programming, r(80.0, 86.0, 93.0)),
                (Qa, r(82.0, 88.0, 95.0)),
                (Design, r(75.0, 83.0, 90.0)),
                (Art, r(75.0, 82.0, 90.0)),
            ],
        ),
        ("innovation_index", Some(r(65.0, 75.0, 85.0)), Vec::new()),
        (
            "turnover_risk",
            Some(r(0.10, 0.18, 0.30)),
            Department::ALL
                .iter()
                .map(|d| match d {
                    Qa => (*d, r(0.15, 0.25, 0.35)),
                    _ => (*d, r(0.10, 0.18, 0.30)),
                })
                .collect(),
        ),
        (
            "burnout_risk",
            Some(r(0.20, 0.35, 0.50)),
            Department::ALL
                .iter()
                .map(|d| match d {
                    Programming | Qa => (*d, r(0.25, 0.40, 0.55)),
                    _ => (*d, r(0.20, 0.35, 0.50)),
                })
                .collect(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_reports_position_and_gap() {
        let range = BenchmarkRange::new(6.0, 7.0, 8.0);
        let below = range.annotate(5.5);
        assert_eq!(below.position, Position::Below);
        assert_eq!(below.gap, -1.5);
        assert_eq!(range.annotate(8.0).position, Position::At);
        assert_eq!(range.annotate(8.5).position, Position::Above);
    }

    #[test]
    fn unknown_department_is_per_item() {
        let table = BenchmarkTable::builtin();
        let outcomes = table.compare_scores(
            "bug_fix_rate",
            &[(Department::Qa, 90.0), (Department::Marketing, 70.0)],
        );
        assert_eq!(outcomes[0].as_ref().unwrap().position, Position::At);
        assert!(matches!(
            &outcomes[1],
            Err(EngineError::UnknownDepartment { department, .. }) if department == "Marketing"
        ));
    }

    #[test]
    fn config_rejects_bad_department_and_unordered_range() {
        let mut config = BTreeMap::new();
        config.insert(
            "avg_satisfaction".to_string(),
            MetricBenchmarkConfig {
                industry: None,
                departments: [("Audio".to_string(), BenchmarkRange::new(1.0, 2.0, 3.0))]
                    .into_iter()
                    .collect(),
            },
        );
        assert!(matches!(BenchmarkTable::from_config(&config), Err(EngineError::Config(_))));

        config.insert(
            "avg_satisfaction".to_string(),
            MetricBenchmarkConfig {
                industry: Some(BenchmarkRange::new(8.0, 7.0, 9.0)),
                departments: BTreeMap::new(),
            },
        );
        assert!(BenchmarkTable::from_config(&config).is_err());

        config.insert(
            "avg_satisfaction".to_string(),
            MetricBenchmarkConfig {
                industry: None,
                departments: [("qa".to_string(), BenchmarkRange::new(6.0, 7.0, 8.0))]
                    .into_iter()
                    .collect(),
            },
        );
        let table = BenchmarkTable::from_config(&config).unwrap();
        assert!(table.lookup("avg_satisfaction", Department::Qa).is_ok());
    }
}
