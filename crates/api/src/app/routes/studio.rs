use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    Json,
};

use gwo_ai::Recommendation;
use gwo_core::EmployeeId;
use gwo_kpi::{CrunchReport, TeamSummary};

use crate::app::dto::{filters, DepartmentFilter, Envelope};
use crate::app::errors::ApiError;
use crate::app::services::AppState;

pub async fn teams(
    Extension(state): Extension<AppState>,
    query: Result<Query<DepartmentFilter>, QueryRejection>,
) -> Result<Json<Envelope<Vec<TeamSummary>>>, ApiError> {
    let department = filters(query)?.parse()?;
    let teams = state.run("teams", move |engine| engine.teams(department)).await?;
    Ok(Json(Envelope::success(teams)))
}

pub async fn crunch(
    Extension(state): Extension<AppState>,
    query: Result<Query<DepartmentFilter>, QueryRejection>,
) -> Result<Json<Envelope<CrunchReport>>, ApiError> {
    let department = filters(query)?.parse()?;
    let report = state.run("crunch", move |engine| engine.crunch(department)).await?;
    Ok(Json(Envelope::success(report)))
}

pub async fn recommendations(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Vec<Recommendation>>>, ApiError> {
    let employee_id = EmployeeId::new(id);
    let recommendations = state
        .run("recommendations", move |engine| engine.recommendations(&employee_id))
        .await?;
    Ok(Json(Envelope::success(recommendations)))
}
