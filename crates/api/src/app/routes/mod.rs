use axum::{
    routing::{get, post},
    Router,
};

pub mod kpis;
pub mod predictions;
pub mod studio;
pub mod system;

/// Router for every analytics endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/kpis", get(kpis::kpis))
        .route("/alerts", get(kpis::alerts))
        .route("/benchmarks", get(kpis::benchmarks))
        .route("/predictions/turnover", get(predictions::turnover))
        .route("/predictions/burnout", post(predictions::burnout))
        .route("/predictions/clusters", get(predictions::clusters))
        .route("/teams", get(studio::teams))
        .route("/crunch", get(studio::crunch))
        .route("/employees/:id/recommendations", get(studio::recommendations))
}
