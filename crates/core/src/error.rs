//! Engine error taxonomy.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{Value as JsonValue, json};
use thiserror::Error;

use crate::id::EmployeeId;
use crate::validation::FieldViolation;

/// Result type used across the engine crates.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
///
/// `Clone` so that every caller waiting on the same cache fingerprint can be
/// handed the same failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// One or more input records are malformed or out of range.
    #[error("validation failed: {} violation(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    /// A KPI's required field is absent from the whole batch.
    #[error("kpi `{kpi}` requires field `{field}`, which is absent from every record")]
    MissingInput { kpi: String, field: String },

    /// A model received a feature it cannot work with.
    #[error("invalid feature `{feature}` for employee {employee_id}: {reason}")]
    InvalidFeature {
        employee_id: EmployeeId,
        feature: String,
        reason: String,
    },

    /// Benchmark lookup miss.
    #[error("no `{metric}` benchmark for department {department}")]
    UnknownDepartment { department: String, metric: String },

    /// A caller-supplied filter or parameter is not recognised.
    #[error("invalid parameter `{parameter}`: {value:?} (valid: {})", .valid.join(", "))]
    InvalidParameter {
        parameter: String,
        value: String,
        valid: Vec<String>,
    },

    /// Waiting on a computation exceeded its budget.
    #[error("{operation} timed out after {waited_ms}ms")]
    Timeout { operation: String, waited_ms: u64 },

    /// Unexpected internal failure (e.g. a model panicking during inference).
    #[error("computation failed: {0}")]
    ComputationFailure(String),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// The record source could not be read.
    #[error("record source error: {0}")]
    Source(String),
}

impl EngineError {
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        valid: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            valid: valid.into_iter().map(Into::into).collect(),
        }
    }

    pub fn invalid_feature(
        employee_id: &EmployeeId,
        feature: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidFeature {
            employee_id: employee_id.clone(),
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_input(kpi: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingInput {
            kpi: kpi.into(),
            field: field.into(),
        }
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        Self::ComputationFailure(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable machine-readable code used in error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::MissingInput { .. } => "missing_input",
            EngineError::InvalidFeature { .. } => "invalid_feature",
            EngineError::UnknownDepartment { .. } => "unknown_department",
            EngineError::InvalidParameter { .. } => "invalid_parameter",
            EngineError::Timeout { .. } => "timeout",
            EngineError::ComputationFailure(_) => "computation_failure",
            EngineError::NotFound(_) => "not_found",
            EngineError::Config(_) => "config_error",
            EngineError::Source(_) => "source_error",
        }
    }

    /// Structured details telling the caller how to fix the request.
    pub fn details(&self) -> JsonValue {
        match self {
            EngineError::Validation(violations) => json!({ "violations": violations }),
            EngineError::MissingInput { kpi, field } => json!({ "kpi": kpi, "field": field }),
            EngineError::InvalidFeature {
                employee_id,
                feature,
                reason,
            } => json!({
                "employee_id": employee_id,
                "feature": feature,
                "reason": reason,
            }),
            EngineError::UnknownDepartment { department, metric } => {
                json!({ "department": department, "metric": metric })
            }
            EngineError::InvalidParameter {
                parameter,
                value,
                valid,
            } => json!({
                "parameter": parameter,
                "value": value,
                "valid": valid,
            }),
            EngineError::Timeout {
                operation,
                waited_ms,
            } => json!({ "operation": operation, "waited_ms": waited_ms }),
            EngineError::ComputationFailure(_)
            | EngineError::NotFound(_)
            | EngineError::Config(_)
            | EngineError::Source(_) => JsonValue::Null,
        }
    }
}

/// Serialized as `{ code, message, details }`, the shape used by error
/// envelopes and per-item failure lists.
impl Serialize for EngineError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EngineError", 3)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("details", &self.details())?;
        state.end()
    }
}
