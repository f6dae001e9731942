use axum::{extract::Extension, Json};
use serde_json::{json, Value};

use crate::app::dto::Envelope;
use crate::app::errors::ApiError;
use crate::app::services::AppState;

/// Liveness plus a glance at the loaded snapshot and cache.
pub async fn health(Extension(state): Extension<AppState>) -> Result<Json<Envelope<Value>>, ApiError> {
    let records = state.engine.snapshot()?;
    let cache = state.engine.cache_stats();
    Ok(Json(Envelope::success(json!({
        "status": "ok",
        "records_version": records.version,
        "as_of": records.as_of,
        "employees": records.employees.len(),
        "projects": records.projects.len(),
        "cache": cache,
    }))))
}
