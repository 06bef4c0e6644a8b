pub mod catalog;
pub mod gpa;
pub mod requirements;
pub mod resolver;
pub mod service;
pub mod storage;
pub mod table;

pub use catalog::{CatalogCache, CatalogError, CatalogResult, CatalogSchema, Clock, ManualClock};
pub use gpa::{DetailRow, GpaReport, ValidationError};
pub use requirements::{
    RequirementError, RequirementReport, RequirementRow, RequirementSources, RequirementTables,
};
pub use resolver::{
    EntryResolver, FallbackSettings, Resolution, ResolutionPolicy, ResolveError, ResolveTarget,
};
pub use service::{
    ComputeReport, GradeService, SaveReport, ServiceError, ServiceResult, ServiceSettings,
    SummaryReport,
};
pub use storage::{CsvFileStore, EntryStore, InMemoryStore, StorageError, StorageResult};

pub use common::{Entry, Grade, PersistedEntry, RawEntry, SubjectRecord};
