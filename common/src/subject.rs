use serde::{Deserialize, Serialize};

/// Catalog identifier of a subject, kept exactly as it appears in the source table.
pub type SubjectId = String;

/// One row of the subject catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    id: SubjectId,
    name: String,
    credits: f64,
    subcategory: String,
}

impl SubjectRecord {
    pub fn new(
        id: impl Into<SubjectId>,
        name: impl Into<String>,
        credits: f64,
        subcategory: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            credits,
            subcategory: subcategory.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Canonical display name as written in the catalog.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credits(&self) -> f64 {
        self.credits
    }

    /// Raw requirement subcategory tag; may be a sentinel rather than a numeric id.
    pub fn subcategory(&self) -> &str {
        &self.subcategory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_preserves_fields() {
        let record = SubjectRecord::new("101", "線形代数学I", 2.0, "7");

        assert_eq!(record.id(), "101");
        assert_eq!(record.name(), "線形代数学I");
        assert_eq!(record.credits(), 2.0);
        assert_eq!(record.subcategory(), "7");
    }
}
