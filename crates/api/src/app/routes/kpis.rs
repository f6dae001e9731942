use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    Json,
};

use gwo_engine::BenchmarkReport;
use gwo_kpi::{KpiAlert, KpiReport};

use crate::app::dto::{filters, Envelope, KpiFilters};
use crate::app::errors::ApiError;
use crate::app::services::AppState;

pub async fn kpis(
    Extension(state): Extension<AppState>,
    query: Result<Query<KpiFilters>, QueryRejection>,
) -> Result<Json<Envelope<KpiReport>>, ApiError> {
    let filters = filters(query)?;
    let report = state
        .run("kpis", move |engine| {
            let query = parse(engine, &filters)?;
            Ok(engine.kpis(&query)?.as_ref().clone())
        })
        .await?;
    Ok(Json(Envelope::success(report)))
}

pub async fn alerts(
    Extension(state): Extension<AppState>,
    query: Result<Query<KpiFilters>, QueryRejection>,
) -> Result<Json<Envelope<Vec<KpiAlert>>>, ApiError> {
    let filters = filters(query)?;
    let alerts = state
        .run("alerts", move |engine| engine.alerts(&parse(engine, &filters)?))
        .await?;
    Ok(Json(Envelope::success(alerts)))
}

pub async fn benchmarks(
    Extension(state): Extension<AppState>,
    query: Result<Query<KpiFilters>, QueryRejection>,
) -> Result<Json<Envelope<BenchmarkReport>>, ApiError> {
    let filters = filters(query)?;
    let report = state
        .run("benchmarks", move |engine| engine.benchmarks(&parse(engine, &filters)?))
        .await?;
    Ok(Json(Envelope::success(report)))
}

fn parse(engine: &gwo_engine::WorkforceEngine, filters: &KpiFilters) -> gwo_core::EngineResult<gwo_kpi::KpiQuery> {
    engine.parse_query(
        filters.category.as_deref(),
        filters.department.as_deref(),
        filters.time_period.as_deref(),
    )
}
