//! HTTP application wiring (Axum router + engine state).
//!
//! - `services.rs`: shared state and the blocking engine bridge
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: query/body DTOs and the success envelope
//! - `errors.rs`: error envelopes and status mapping

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use gwo_engine::WorkforceEngine;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(engine: Arc<WorkforceEngine>, request_timeout: Duration) -> Router {
    let state = services::AppState::new(engine, request_timeout);

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_id_middleware))
                .layer(Extension(state)),
        )
}
