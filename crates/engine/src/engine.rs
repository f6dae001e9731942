//! The engine facade: one owned instance per process wires the validator,
//! KPI calculator, prediction models, benchmarks, and recommendations around
//! a shared result cache.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use gwo_ai::{
    BurnoutModel, ClusterModel, FeatureBatch, FeatureVector, ModelParameters, ModelRun, ModelRunner,
    PredictionModel, PredictionResult, Recommendation, RecommendationEngine, TurnoverModel,
};
use gwo_cache::{CacheStats, ResultCache, SweeperHandle};
use gwo_core::{
    Department, EmployeeId, EmployeeUpdate, EngineError, EngineResult, Fingerprint, RawRecordSet, RecordSet,
    RecordSource, SnapshotVersion, apply_update, validate,
};
use gwo_kpi::{
    BenchmarkTable, CrunchParameters, CrunchReport, KpiAlert, KpiCalculator, KpiQuery, KpiReport, TeamSummary,
    analyze_crunch, summarize_teams,
};

use crate::config::EngineConfig;
use crate::views::{
    BenchmarkReport, BurnoutAssessment, ClusterReport, ClusterSummary, PredictionBenchmark, TurnoverEntry,
    TurnoverReport,
};

/// Source of `computed_at` timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Value stored in the result cache.
#[derive(Debug, Clone)]
enum Cached {
    Kpis(Arc<KpiReport>),
    Predictions(Arc<ModelRun>),
}

impl Cached {
    fn into_kpis(self) -> EngineResult<Arc<KpiReport>> {
        match self {
            Cached::Kpis(report) => Ok(report),
            Cached::Predictions(_) => Err(EngineError::computation("cache entry holds predictions, expected kpis")),
        }
    }

    fn into_run(self) -> EngineResult<Arc<ModelRun>> {
        match self {
            Cached::Predictions(run) => Ok(run),
            Cached::Kpis(_) => Err(EngineError::computation("cache entry holds kpis, expected predictions")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModelKind {
    Turnover,
    Burnout,
    Cluster,
}

/// Which employees a model run covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Scope {
    Studio,
    Department(Department),
    Employee(EmployeeId),
}

#[derive(Serialize)]
struct ModelKey<'a, P: Serialize> {
    version: &'a str,
    params: &'a P,
    scope: &'a Scope,
}

pub struct WorkforceEngine {
    records: RwLock<Arc<RecordSet>>,
    calculator: KpiCalculator,
    crunch: CrunchParameters,
    models: ModelParameters,
    turnover: TurnoverModel,
    burnout: BurnoutModel,
    cluster: ClusterModel,
    runner: ModelRunner,
    benchmarks: BenchmarkTable,
    recommender: RecommendationEngine,
    cache: Arc<ResultCache<Cached>>,
    sweeper: Mutex<Option<SweeperHandle>>,
    clock: Clock,
}

impl WorkforceEngine {
    /// Build an engine over an already validated record set.
    pub fn new(config: &EngineConfig, records: RecordSet) -> EngineResult<Self> {
        config.validate()?;
        let models = config.models.clone();
        let recommender = RecommendationEngine::new(
            config.recommendations.clone(),
            models.cluster.weakest_label().map(str::to_string),
        )?;
        let cache = Arc::new(ResultCache::new(config.cache.clone()));
        let sweeper = config
            .cache
            .sweep_interval()
            .map(|interval| cache.spawn_sweeper(interval))
            .transpose()?;

        tracing::info!(
            version = %records.version,
            employees = records.employees.len(),
            projects = records.projects.len(),
            sweeper = sweeper.is_some(),
            "workforce engine ready"
        );

        Ok(Self {
            records: RwLock::new(Arc::new(records)),
            calculator: KpiCalculator::from_params(config.kpi.clone())?,
            crunch: config.crunch.clone(),
            turnover: TurnoverModel::new(models.turnover.clone())?,
            burnout: BurnoutModel::new(models.burnout.clone())?,
            cluster: ClusterModel::new(models.cluster.clone())?,
            models,
            runner: ModelRunner::new(),
            benchmarks: config.benchmark_table()?,
            recommender,
            cache,
            sweeper: Mutex::new(sweeper),
            clock: Arc::new(Utc::now),
        })
    }

    /// Engine with no records yet; call [`WorkforceEngine::ingest`] to load some.
    pub fn empty(config: &EngineConfig) -> EngineResult<Self> {
        Self::new(config, RecordSet::new(NaiveDate::default(), Vec::new(), Vec::new())?)
    }

    /// Load a raw batch from `source`, validate it, and build the engine.
    pub fn from_source(config: &EngineConfig, source: &dyn RecordSource) -> EngineResult<Self> {
        let raw = source.load()?;
        tracing::info!(source = %source.describe(), "records loaded");
        Self::new(config, validate(&raw)?)
    }

    /// Replace the clock used to stamp `computed_at`.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate `raw` and make it the current snapshot. On any violation the
    /// current snapshot stays in place.
    pub fn ingest(&self, raw: &RawRecordSet) -> EngineResult<SnapshotVersion> {
        let records = Arc::new(validate(raw)?);
        let version = records.version.clone();
        let mut current = self
            .records
            .write()
            .map_err(|_| EngineError::computation("record snapshot lock poisoned"))?;
        *current = records;
        tracing::info!(version = %version, "record snapshot replaced");
        Ok(version)
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> EngineResult<Arc<RecordSet>> {
        self.records
            .read()
            .map(|r| Arc::clone(&r))
            .map_err(|_| EngineError::computation("record snapshot lock poisoned"))
    }

    /// Parse caller filters against the current snapshot's reference date.
    pub fn parse_query(
        &self,
        category: Option<&str>,
        department: Option<&str>,
        time_period: Option<&str>,
    ) -> EngineResult<KpiQuery> {
        KpiQuery::parse(category, department, time_period, self.snapshot()?.as_of)
    }

    pub fn kpis(&self, query: &KpiQuery) -> EngineResult<Arc<KpiReport>> {
        self.kpis_for(&*self.snapshot()?, query)
    }

    /// KPIs needing attention under `query`, critical first.
    pub fn alerts(&self, query: &KpiQuery) -> EngineResult<Vec<KpiAlert>> {
        Ok(self.kpis(query)?.alerts())
    }

    fn kpis_for(&self, records: &RecordSet, query: &KpiQuery) -> EngineResult<Arc<KpiReport>> {
        let fingerprint = self.calculator.fingerprint(records, query)?;
        self.cache
            .get_or_compute(&fingerprint, || {
                let report = self.calculator.compute(records, query, (self.clock)())?;
                Ok(Cached::Kpis(Arc::new(report)))
            })?
            .into_kpis()
    }

    /// Run one model over the current snapshot, optionally restricted to a
    /// department. Cluster assignments are batch-scoped, so a department
    /// restriction changes the clusters themselves.
    pub fn predictions(&self, kind: ModelKind, department: Option<Department>) -> EngineResult<Arc<ModelRun>> {
        let scope = department.map_or(Scope::Studio, Scope::Department);
        self.model_run(&*self.snapshot()?, kind, &scope)
    }

    fn model_run(&self, records: &RecordSet, kind: ModelKind, scope: &Scope) -> EngineResult<Arc<ModelRun>> {
        let (model, fingerprint): (&dyn PredictionModel, Fingerprint) = match kind {
            ModelKind::Turnover => (
                &self.turnover,
                model_fingerprint(records, &self.turnover, &self.models.turnover, scope)?,
            ),
            ModelKind::Burnout => (
                &self.burnout,
                model_fingerprint(records, &self.burnout, &self.models.burnout, scope)?,
            ),
            ModelKind::Cluster => (
                &self.cluster,
                model_fingerprint(records, &self.cluster, &self.models.cluster, scope)?,
            ),
        };

        self.cache
            .get_or_compute(&fingerprint, || {
                let batch = match scope {
                    Scope::Studio => FeatureBatch::extract(records, None),
                    Scope::Department(d) => FeatureBatch::extract(records, Some(*d)),
                    Scope::Employee(id) => {
                        let record = records
                            .employee(id)
                            .ok_or_else(|| EngineError::not_found(format!("employee {id}")))?;
                        FeatureBatch::from_vectors(vec![FeatureVector::from_record(record, records.as_of)?])
                    }
                };
                let run = self.runner.run(model, &batch, (self.clock)());
                Ok(Cached::Predictions(Arc::new(run)))
            })?
            .into_run()
    }

    /// Employees whose turnover probability is at least `risk_threshold`,
    /// highest first, each with recommendations.
    pub fn turnover(&self, risk_threshold: f64, department: Option<Department>) -> EngineResult<TurnoverReport> {
        if !(0.0..=1.0).contains(&risk_threshold) {
            return Err(EngineError::invalid_parameter(
                "risk_threshold",
                risk_threshold.to_string(),
                ["a number within [0, 1]"],
            ));
        }
        let records = self.snapshot()?;
        let runs = self.studio_runs(&records)?;
        let kpis = self.kpis_for(&records, &KpiQuery::default())?;
        let in_department = |d: Department| department.is_none_or(|want| want == d);

        let mut employees: Vec<TurnoverEntry> = runs
            .turnover
            .results
            .iter()
            .filter(|r| in_department(r.department))
            .filter_map(|r| {
                let score = r.probability()?;
                let risk_band = r.risk_band?;
                (score >= risk_threshold).then(|| TurnoverEntry {
                    employee_id: r.employee_id.clone(),
                    department: r.department,
                    score,
                    risk_band,
                    risk_factors: r.factors.clone(),
                    recommendations: self.recommender.recommend(&runs.for_employee(&r.employee_id), Some(kpis.as_ref())),
                })
            })
            .collect();
        employees.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.employee_id.cmp(&b.employee_id)));

        let failures = runs
            .turnover
            .failures
            .iter()
            .filter(|f| records.employee(&f.employee_id).is_some_and(|e| in_department(e.department)))
            .cloned()
            .collect();

        Ok(TurnoverReport {
            records_version: records.version.clone(),
            risk_threshold,
            department,
            employees,
            failures,
        })
    }

    /// Burnout risk for one employee with `update` applied to their current
    /// metrics. The update produces a new snapshot version for this
    /// assessment only; the engine's snapshot is unchanged.
    pub fn burnout(&self, employee_id: &EmployeeId, update: &EmployeeUpdate) -> EngineResult<BurnoutAssessment> {
        let records = self.snapshot()?;
        let current = records
            .employee(employee_id)
            .ok_or_else(|| EngineError::not_found(format!("employee {employee_id}")))?;
        let what_if = records.with_employee(apply_update(current, update)?)?;
        let scope = Scope::Employee(employee_id.clone());

        let run = self.model_run(&what_if, ModelKind::Burnout, &scope)?;
        if let Some(error) = run.failure_for(employee_id) {
            return Err(error.clone());
        }
        let result = run
            .result_for(employee_id)
            .ok_or_else(|| EngineError::computation(format!("burnout model returned nothing for {employee_id}")))?;
        let score = result
            .probability()
            .ok_or_else(|| EngineError::computation("burnout result carries no probability"))?;
        let risk_level = result
            .risk_band
            .ok_or_else(|| EngineError::computation("burnout result carries no risk band"))?;

        let turnover = self.model_run(&what_if, ModelKind::Turnover, &scope)?;
        let mut predictions = vec![result];
        predictions.extend(turnover.result_for(employee_id));
        let kpis = self.kpis_for(&records, &KpiQuery::default())?;

        Ok(BurnoutAssessment {
            employee_id: employee_id.clone(),
            department: result.department,
            records_version: what_if.version.clone(),
            model_version: result.model_version.clone(),
            score,
            risk_level,
            contributing_factors: result.factors.clone(),
            recommendations: self.recommender.recommend(&predictions, Some(kpis.as_ref())),
            computed_at: result.computed_at,
        })
    }

    pub fn clusters(&self, department: Option<Department>) -> EngineResult<ClusterReport> {
        let records = self.snapshot()?;
        let run = self.predictions(ModelKind::Cluster, department)?;

        let mut sizes: BTreeMap<usize, (String, usize)> = BTreeMap::new();
        for result in &run.results {
            if let gwo_ai::PredictionScore::Cluster { id, label } = &result.score {
                sizes.entry(*id).or_insert_with(|| (label.clone(), 0)).1 += 1;
            }
        }

        Ok(ClusterReport {
            records_version: records.version.clone(),
            department,
            clusters: sizes
                .into_iter()
                .map(|(id, (label, size))| ClusterSummary { id, label, size })
                .collect(),
            assignments: run.results.clone(),
            failures: run.failures.clone(),
        })
    }

    pub fn teams(&self, department: Option<Department>) -> EngineResult<Vec<TeamSummary>> {
        let records = self.snapshot()?;
        Ok(summarize_teams(&records, department, self.calculator.params()))
    }

    /// Crunch per department and per project phase.
    pub fn crunch(&self, department: Option<Department>) -> EngineResult<CrunchReport> {
        let records = self.snapshot()?;
        Ok(analyze_crunch(&records, department, &self.crunch))
    }

    /// KPIs for `query` and mean risk scores per department, each annotated
    /// against the benchmark table. Unbenchmarked departments are reported
    /// per entry.
    pub fn benchmarks(&self, query: &KpiQuery) -> EngineResult<BenchmarkReport> {
        let records = self.snapshot()?;
        let report = self.kpis_for(&records, query)?;
        let runs = self.studio_runs(&records)?;

        let mut predictions = Vec::new();
        for run in [&runs.turnover, &runs.burnout] {
            let mut by_department: BTreeMap<Department, Vec<f64>> = BTreeMap::new();
            for r in run
                .results
                .iter()
                .filter(|r| query.department.is_none_or(|d| d == r.department))
            {
                if let Some(p) = r.probability() {
                    by_department.entry(r.department).or_default().push(p);
                }
            }
            let means: Vec<(Department, f64, usize)> = by_department
                .into_iter()
                .filter_map(|(d, scores)| Some((d, gwo_core::stats::mean(&scores)?, scores.len())))
                .collect();
            let pairs: Vec<(Department, f64)> = means.iter().map(|(d, m, _)| (*d, *m)).collect();
            let outcomes = self.benchmarks.compare_scores(&run.model, &pairs);
            for ((department, mean_score, employees), outcome) in means.into_iter().zip(outcomes) {
                let (annotation, error) = match outcome {
                    Ok(a) => (Some(a), None),
                    Err(e) => (None, Some(e)),
                };
                predictions.push(PredictionBenchmark {
                    metric: run.model.clone(),
                    department,
                    mean_score,
                    employees,
                    annotation,
                    error,
                });
            }
        }

        Ok(BenchmarkReport {
            records_version: records.version.clone(),
            kpis: self.benchmarks.compare_kpis(&report.results),
            predictions,
        })
    }

    /// Recommendations for one employee from every model plus studio KPIs.
    pub fn recommendations(&self, employee_id: &EmployeeId) -> EngineResult<Vec<Recommendation>> {
        let records = self.snapshot()?;
        if records.employee(employee_id).is_none() {
            return Err(EngineError::not_found(format!("employee {employee_id}")));
        }
        let runs = self.studio_runs(&records)?;
        let kpis = self.kpis_for(&records, &KpiQuery::default())?;
        Ok(self.recommender.recommend(&runs.for_employee(employee_id), Some(kpis.as_ref())))
    }

    fn studio_runs(&self, records: &RecordSet) -> EngineResult<StudioRuns> {
        Ok(StudioRuns {
            turnover: self.model_run(records, ModelKind::Turnover, &Scope::Studio)?,
            burnout: self.model_run(records, ModelKind::Burnout, &Scope::Studio)?,
            cluster: self.model_run(records, ModelKind::Cluster, &Scope::Studio)?,
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every settled cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Stop the background sweeper, if one is running.
    pub fn shutdown(&self) {
        let handle = match self.sweeper.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }
}

/// Studio-wide runs of every model over one snapshot.
struct StudioRuns {
    turnover: Arc<ModelRun>,
    burnout: Arc<ModelRun>,
    cluster: Arc<ModelRun>,
}

impl StudioRuns {
    fn for_employee(&self, employee_id: &EmployeeId) -> Vec<&PredictionResult> {
        [&self.turnover, &self.burnout, &self.cluster]
            .into_iter()
            .filter_map(|run| run.result_for(employee_id))
            .collect()
    }
}

fn model_fingerprint<P: Serialize>(
    records: &RecordSet,
    model: &dyn PredictionModel,
    params: &P,
    scope: &Scope,
) -> EngineResult<Fingerprint> {
    let key = ModelKey {
        version: model.version(),
        params,
        scope,
    };
    Fingerprint::compute(&records.version, model.name(), &key)
}
