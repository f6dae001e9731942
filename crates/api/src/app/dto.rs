use axum::extract::{rejection::QueryRejection, Query};
use serde::{Deserialize, Serialize};

use gwo_core::{Department, EmployeeUpdate, EngineError, EngineResult};

/// Success envelope: `{ status: "success", data }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

// -------------------------
// Query DTOs
// -------------------------

/// Unwrap extracted query filters; a malformed query string becomes an
/// `invalid_parameter` error instead of axum's plain-text rejection.
pub fn filters<T>(query: Result<Query<T>, QueryRejection>) -> EngineResult<T> {
    query.map(|Query(inner)| inner).map_err(|rejection| {
        EngineError::invalid_parameter(
            "query",
            rejection.body_text(),
            ["URL-encoded filters, each given at most once"],
        )
    })
}

/// Filters shared by the KPI, alert, and benchmark endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KpiFilters {
    pub category: Option<String>,
    pub department: Option<String>,
    pub time_period: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentFilter {
    pub department: Option<String>,
}

impl DepartmentFilter {
    pub fn parse(&self) -> EngineResult<Option<Department>> {
        parse_department(self.department.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnoverFilters {
    /// Kept as text so that a malformed number gets the standard error envelope.
    pub risk_threshold: Option<String>,
    pub department: Option<String>,
}

impl TurnoverFilters {
    pub const DEFAULT_THRESHOLD: f64 = 0.7;

    pub fn threshold(&self) -> EngineResult<f64> {
        match self.risk_threshold.as_deref() {
            None => Ok(Self::DEFAULT_THRESHOLD),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| EngineError::invalid_parameter("risk_threshold", raw, ["a number in [0, 1]"])),
        }
    }

    pub fn department(&self) -> EngineResult<Option<Department>> {
        parse_department(self.department.as_deref())
    }
}

fn parse_department(raw: Option<&str>) -> EngineResult<Option<Department>> {
    raw.map(str::parse::<Department>).transpose()
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BurnoutRequest {
    pub employee_id: String,
    #[serde(default)]
    pub current_metrics: EmployeeUpdate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    #[test]
    fn malformed_query_becomes_invalid_parameter() {
        let uri: Uri = "/teams?department=Art&department=QA".parse().unwrap();
        let err = filters(Query::<DepartmentFilter>::try_from_uri(&uri)).unwrap_err();
        match err {
            EngineError::InvalidParameter { parameter, value, .. } => {
                assert_eq!(parameter, "query");
                assert!(value.contains("department"), "{value}");
            }
            other => panic!("expected invalid_parameter, got {other:?}"),
        }

        let uri: Uri = "/teams?department=Art".parse().unwrap();
        let filter = filters(Query::<DepartmentFilter>::try_from_uri(&uri)).unwrap();
        assert_eq!(filter.parse().unwrap(), Some(Department::Art));
    }

    #[test]
    fn threshold_defaults_and_rejects_text() {
        let filters = TurnoverFilters::default();
        assert_eq!(filters.threshold().unwrap(), 0.7);

        let filters = TurnoverFilters {
            risk_threshold: Some("high".into()),
            department: Some("qa".into()),
        };
        assert_eq!(filters.threshold().unwrap_err().code(), "invalid_parameter");
        assert_eq!(filters.department().unwrap(), Some(Department::Qa));
    }
}
