//! `gwo-core` — workforce record model, validation, and the engine error
//! taxonomy.
//!
//! This crate contains **pure** building blocks (no caching, no models, no IO
//! beyond the optional file-backed record source).

pub mod error;
pub mod fingerprint;
pub mod id;
pub mod raw;
pub mod record;
pub mod source;
pub mod stats;
pub mod validation;

pub use error::{EngineError, EngineResult};
pub use fingerprint::Fingerprint;
pub use id::{EmployeeId, ProjectId, SnapshotVersion, TeamId};
pub use raw::{
    EmployeeUpdate, RawDeliveryMetrics, RawEmployeeRecord, RawGamingMetrics, RawProjectRecord,
    RawRecordSet,
};
pub use record::{
    DeliveryMetrics, Department, EmployeeRecord, GamingMetrics, Level, ProjectPhase, ProjectRecord,
    ProjectType, Record, RecordKind, RecordSet,
};
pub use source::{InMemorySource, JsonFileSource, RecordSource};
pub use validation::{FieldViolation, apply_update, validate};
