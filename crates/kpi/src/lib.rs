//! `gwo-kpi` — KPI registry, calculator, team aggregates, crunch analysis
//! and benchmark comparison.
//!
//! Everything here is a pure function of a validated [`gwo_core::RecordSet`]
//! plus read-only configuration. Caching lives one layer up.

pub mod benchmark;
pub mod calculator;
pub mod crunch;
pub mod definition;
pub mod params;
pub mod query;
pub mod result;
pub mod teams;

pub use benchmark::{
    BenchmarkAnnotation, BenchmarkRange, BenchmarkTable, BenchmarkedKpi, MetricBenchmarkConfig,
    Position,
};
pub use calculator::{KPI_NAMESPACE, KpiCalculator};
pub use crunch::{
    CrunchParameters, CrunchReport, DepartmentCrunch, PhaseBurnoutRisk, PhaseCrunch, PhaseProfile,
    analyze_crunch,
};
pub use definition::{
    AggregationRule, CustomFormula, Direction, KpiCategory, KpiDefinition, KpiRegistry,
    RecordField, StatusThresholds, builtin_definitions,
};
pub use params::KpiParameters;
pub use query::{KpiQuery, TimePeriod, TimeWindow};
pub use result::{KpiAlert, KpiFailure, KpiReport, KpiResult, KpiStatus, NotComputable, Trend};
pub use teams::{TeamProject, TeamSummary, summarize_teams};
