use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Query,
    },
    Json,
};

use gwo_core::{EmployeeId, EngineError};
use gwo_engine::{BurnoutAssessment, ClusterReport, TurnoverReport};

use crate::app::dto::{filters, BurnoutRequest, DepartmentFilter, Envelope, TurnoverFilters};
use crate::app::errors::ApiError;
use crate::app::services::AppState;

pub async fn turnover(
    Extension(state): Extension<AppState>,
    query: Result<Query<TurnoverFilters>, QueryRejection>,
) -> Result<Json<Envelope<TurnoverReport>>, ApiError> {
    let filters = filters(query)?;
    let threshold = filters.threshold()?;
    let department = filters.department()?;
    let report = state
        .run("turnover", move |engine| engine.turnover(threshold, department))
        .await?;
    Ok(Json(Envelope::success(report)))
}

/// What-if burnout assessment: the posted metrics overlay the stored record
/// without replacing it.
pub async fn burnout(
    Extension(state): Extension<AppState>,
    body: Result<Json<BurnoutRequest>, JsonRejection>,
) -> Result<Json<Envelope<BurnoutAssessment>>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        EngineError::invalid_parameter(
            "body",
            rejection.body_text(),
            ["{ \"employee_id\": string, \"current_metrics\": object }"],
        )
    })?;
    if body.employee_id.trim().is_empty() {
        return Err(EngineError::invalid_parameter("employee_id", "", ["a non-empty employee id"]).into());
    }

    let employee_id = EmployeeId::new(body.employee_id.trim());
    let assessment = state
        .run("burnout", move |engine| engine.burnout(&employee_id, &body.current_metrics))
        .await?;
    Ok(Json(Envelope::success(assessment)))
}

pub async fn clusters(
    Extension(state): Extension<AppState>,
    query: Result<Query<DepartmentFilter>, QueryRejection>,
) -> Result<Json<Envelope<ClusterReport>>, ApiError> {
    let department = filters(query)?.parse()?;
    let report = state.run("clusters", move |engine| engine.clusters(department)).await?;
    Ok(Json(Envelope::success(report)))
}
