//! Record types shared by the grade core and the daemon.

pub mod entry;
pub mod grade;
pub mod hierarchy;
pub mod subject;

pub use entry::{Entry, PersistedEntry, RawEntry, UNASSIGNED_SUBCATEGORY};
pub use grade::{Grade, GradeParseError};
pub use hierarchy::{
    CategoryId, CategoryRecord, MajorId, MajorRecord, RequirementRule, SubcategoryId,
    SubcategoryRecord,
};
pub use subject::{SubjectId, SubjectRecord};
