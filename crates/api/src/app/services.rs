//! Shared handler state and the bridge from async handlers to the
//! synchronous engine.

use std::sync::Arc;
use std::time::Duration;

use gwo_core::{EngineError, EngineResult};
use gwo_engine::WorkforceEngine;

use crate::app::errors::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkforceEngine>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: Arc<WorkforceEngine>, request_timeout: Duration) -> Self {
        Self {
            engine,
            request_timeout,
        }
    }

    /// Run `f` on the blocking pool, bounded by the request timeout.
    ///
    /// On timeout the caller gets a `timeout` error; the computation keeps
    /// running and still lands in the cache for the next caller.
    pub async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&WorkforceEngine) -> EngineResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let task = tokio::task::spawn_blocking(move || f(&engine));

        match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(result)) => result.map_err(ApiError::from),
            Ok(Err(join)) => Err(EngineError::computation(format!("{operation} task failed: {join}")).into()),
            Err(_) => {
                tracing::warn!(operation, timeout_ms = self.request_timeout.as_millis() as u64, "request timed out");
                Err(EngineError::Timeout {
                    operation: operation.to_string(),
                    waited_ms: self.request_timeout.as_millis() as u64,
                }
                .into())
            }
        }
    }
}
