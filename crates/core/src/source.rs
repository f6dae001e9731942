//! Record sources.
//!
//! The engine treats the data store as opaque: anything that can hand over a
//! raw batch implements [`RecordSource`]. Validation happens afterwards, so a
//! source never needs to know the schema rules.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::raw::RawRecordSet;

/// Supplier of raw employee/project batches.
pub trait RecordSource: Send + Sync {
    /// Human-readable origin used in logs.
    fn describe(&self) -> String;

    /// Load the current raw batch.
    fn load(&self) -> EngineResult<RawRecordSet>;
}

/// Source reading a JSON document shaped like [`RawRecordSet`].
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RecordSource for JsonFileSource {
    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }

    fn load(&self) -> EngineResult<RawRecordSet> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| EngineError::Source(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::Source(format!("{}: {e}", self.path.display())))
    }
}

/// Source holding a batch in memory (tests, embedding callers).
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    batch: RawRecordSet,
}

impl InMemorySource {
    pub fn new(batch: RawRecordSet) -> Self {
        Self { batch }
    }
}

impl RecordSource for InMemorySource {
    fn describe(&self) -> String {
        format!(
            "in-memory batch ({} employees, {} projects)",
            self.batch.employees.len(),
            self.batch.projects.len()
        )
    }

    fn load(&self) -> EngineResult<RawRecordSet> {
        Ok(self.batch.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_source_error() {
        let source = JsonFileSource::new("/definitely/not/here.json");
        assert!(matches!(source.load(), Err(EngineError::Source(_))));
    }

    #[test]
    fn json_rows_deserialize_with_optional_fields() {
        let raw: RawRecordSet = serde_json::from_str(
            r#"{
                "employees": [
                    { "id": "E1", "department": "Art", "metrics": { "crunch_hours_last_month": 12 } }
                ],
                "projects": [ { "id": "P1", "type": "Indie", "phase": "alpha" } ]
            }"#,
        )
        .unwrap();
        assert_eq!(raw.employees[0].department.as_deref(), Some("Art"));
        assert_eq!(
            raw.employees[0].metrics.as_ref().and_then(|m| m.crunch_hours_last_month),
            Some(12.0)
        );
        assert_eq!(raw.projects[0].project_type.as_deref(), Some("Indie"));
        assert!(raw.as_of.is_none());
    }
}
