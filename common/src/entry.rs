use serde::{Deserialize, Serialize};

use crate::grade::Grade;
use crate::subject::SubjectId;

/// Subcategory tag carried by entries whose subject is not in the catalog,
/// or whose catalog row has no subcategory.
pub const UNASSIGNED_SUBCATEGORY: &str = "TBD";

/// Unvalidated `{name, grade}` pair as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEntry {
    pub name: String,
    pub grade: String,
}

impl RawEntry {
    pub fn new(name: impl Into<String>, grade: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grade: grade.into(),
        }
    }
}

/// A course result whose credits and subcategory have been resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<SubjectId>,
    pub name: String,
    pub grade: Grade,
    pub credits: f64,
    #[serde(rename = "field")]
    pub subcategory: String,
}

impl Entry {
    pub fn new(
        name: impl Into<String>,
        grade: Grade,
        credits: f64,
        subcategory: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: None,
            name: name.into(),
            grade,
            credits,
            subcategory: subcategory.into(),
        }
    }

    pub fn with_subject_id(mut self, id: impl Into<SubjectId>) -> Self {
        self.subject_id = Some(id.into());
        self
    }

    /// Converts into the persisted form, handing the entry back when it has no
    /// catalog id to key it by.
    pub fn into_persisted(self) -> Result<PersistedEntry, Entry> {
        match self.subject_id {
            Some(subject_id) => Ok(PersistedEntry {
                subject_id,
                name: self.name,
                grade: self.grade,
                credits: self.credits,
                subcategory: self.subcategory,
            }),
            None => Err(self),
        }
    }
}

/// Saved course result; at most one exists per `subject_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub subject_id: SubjectId,
    pub name: String,
    pub grade: Grade,
    pub credits: f64,
    #[serde(rename = "field")]
    pub subcategory: String,
}

impl From<PersistedEntry> for Entry {
    fn from(saved: PersistedEntry) -> Self {
        Entry {
            subject_id: Some(saved.subject_id),
            name: saved.name,
            grade: saved.grade,
            credits: saved.credits,
            subcategory: saved.subcategory,
        }
    }
}
