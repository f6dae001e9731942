use chrono::{DateTime, Utc};

use gwo_core::{EngineError, EngineResult};

use crate::features::FeatureBatch;
use crate::result::{ModelRun, PredictionFailure, PredictionResult};

/// What a model's output for one employee may depend on.
///
/// - `Employee`: only that employee's feature vector. Adding or removing
///   other employees never changes the result.
/// - `Batch`: the whole batch (e.g. clustering, where centroids come from
///   every row).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModelScope {
    Employee,
    Batch,
}

/// A prediction model: feature vectors in, typed results with contributing
/// factors out.
///
/// Models are read-only after construction and must not keep state between
/// calls. A failure for one employee is returned in that employee's slot and
/// never aborts the batch.
pub trait PredictionModel: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn version(&self) -> &str;

    fn scope(&self) -> ModelScope;

    /// One outcome per row of `batch`, in row order.
    fn predict_batch(&self, batch: &FeatureBatch, computed_at: DateTime<Utc>) -> Vec<EngineResult<PredictionResult>>;
}

/// Runs models over batches and collects per-employee outcomes.
#[derive(Debug, Copy, Clone, Default)]
pub struct ModelRunner;

impl ModelRunner {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, model: &dyn PredictionModel, batch: &FeatureBatch, computed_at: DateTime<Utc>) -> ModelRun {
        let mut run = ModelRun {
            model: model.name().to_string(),
            model_version: model.version().to_string(),
            results: Vec::with_capacity(batch.len()),
            failures: Vec::new(),
        };

        let outcomes = model.predict_batch(batch, computed_at);
        if outcomes.len() != batch.len() {
            let error = EngineError::computation(format!(
                "model {} returned {} outcome(s) for {} row(s)",
                model.name(),
                outcomes.len(),
                batch.len()
            ));
            run.failures = batch
                .rows()
                .iter()
                .map(|row| failure(model, row.employee_id.clone(), error.clone()))
                .collect();
        } else {
            for (row, outcome) in batch.rows().iter().zip(outcomes) {
                match outcome {
                    Ok(result) => run.results.push(result),
                    Err(e) => run.failures.push(failure(model, row.employee_id.clone(), e)),
                }
            }
        }

        for (employee_id, error) in batch.rejected() {
            run.failures
                .push(failure(model, employee_id.clone(), error.clone()));
        }
        run.failures
            .sort_by(|a, b| a.employee_id.cmp(&b.employee_id));

        tracing::info!(
            model = model.name(),
            version = model.version(),
            batch_size = batch.len(),
            results = run.results.len(),
            failures = run.failures.len(),
            "model batch run"
        );
        run
    }
}

fn failure(model: &dyn PredictionModel, employee_id: gwo_core::EmployeeId, error: EngineError) -> PredictionFailure {
    PredictionFailure {
        employee_id,
        model: model.name().to_string(),
        error,
    }
}
