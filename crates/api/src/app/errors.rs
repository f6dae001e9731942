use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use gwo_core::EngineError;

/// Engine error rendered as `{ status: "error", error: { code, message, details } }`.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_)
        | EngineError::InvalidParameter { .. }
        | EngineError::InvalidFeature { .. }
        | EngineError::MissingInput { .. } => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) | EngineError::UnknownDepartment { .. } => StatusCode::NOT_FOUND,
        EngineError::Timeout { .. }
        | EngineError::ComputationFailure(_)
        | EngineError::Config(_)
        | EngineError::Source(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            tracing::debug!(code = self.0.code(), error = %self.0, "request rejected");
        }
        (
            status,
            Json(json!({
                "status": "error",
                "error": self.0,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_mistakes_map_to_4xx() {
        let bad = EngineError::invalid_parameter("department", "Unknown", ["Art"]);
        assert_eq!(status_for(&bad), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&EngineError::not_found("employee e9")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&EngineError::Timeout {
                operation: "kpis".into(),
                waited_ms: 10
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
