use serde::{Deserialize, Serialize};

use crate::table::Table;

/// Accepted header names for one logical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub candidates: Vec<String>,
    /// Assumed when no candidate appears in the header.
    pub default: String,
}

impl ColumnMapping {
    pub fn new(candidates: &[&str], default: &str) -> Self {
        Self {
            candidates: candidates.iter().map(|name| name.to_string()).collect(),
            default: default.to_owned(),
        }
    }

    /// Scans the header left to right; the first cell that is a candidate wins.
    pub fn resolve(&self, header: &[String]) -> Option<usize> {
        header
            .iter()
            .position(|cell| self.candidates.iter().any(|name| name == cell))
            .or_else(|| header.iter().position(|cell| *cell == self.default))
    }
}

/// Column layout of the subject catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSchema {
    pub id: ColumnMapping,
    pub name: ColumnMapping,
    pub credits: ColumnMapping,
    pub subcategory: ColumnMapping,
}

impl Default for CatalogSchema {
    fn default() -> Self {
        Self {
            id: ColumnMapping::new(&["id", "科目ID"], "科目ID"),
            name: ColumnMapping::new(&["name", "title", "科目名", "講義名", "科目"], "科目名"),
            credits: ColumnMapping::new(&["credits", "単位数", "単位"], "単位数"),
            subcategory: ColumnMapping::new(
                &["field", "subcategory id", "小区分ID", "分野", "カテゴリ"],
                "小区分ID",
            ),
        }
    }
}

impl CatalogSchema {
    pub fn resolve(&self, table: &Table) -> ResolvedColumns {
        let header = table.header();
        ResolvedColumns {
            id: self.id.resolve(header),
            name: self.name.resolve(header),
            credits: self.credits.resolve(header),
            subcategory: self.subcategory.resolve(header),
        }
    }
}

/// Column indices for one loaded table; `None` means the column is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub id: Option<usize>,
    pub name: Option<usize>,
    pub credits: Option<usize>,
    pub subcategory: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn japanese_headers_resolve() {
        let table = Table::parse("科目ID,科目名,単位数,小区分ID\n").unwrap();
        let columns = CatalogSchema::default().resolve(&table);

        assert_eq!(columns.id, Some(0));
        assert_eq!(columns.name, Some(1));
        assert_eq!(columns.credits, Some(2));
        assert_eq!(columns.subcategory, Some(3));
    }

    #[test]
    fn first_matching_header_cell_wins() {
        let table = Table::parse("講義名,name,単位,field\n").unwrap();
        let columns = CatalogSchema::default().resolve(&table);

        assert_eq!(columns.name, Some(0));
        assert_eq!(columns.credits, Some(2));
        assert_eq!(columns.id, None);
    }

    #[test]
    fn default_column_used_when_not_a_candidate() {
        let mapping = ColumnMapping::new(&["code"], "科目ID");
        let header = vec!["科目ID".to_string(), "name".to_string()];
        assert_eq!(mapping.resolve(&header), Some(0));
    }
}
