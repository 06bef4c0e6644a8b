use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use common::{
    CategoryId, CategoryRecord, MajorId, MajorRecord, RequirementRule, SubcategoryId,
    SubcategoryRecord,
};
use serde::{Deserialize, Serialize};

use super::{RequirementError, RequirementResult};
use crate::table::{Table, TableError};

/// Locations of the four requirement master tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSources {
    pub rules: PathBuf,
    pub subcategories: PathBuf,
    pub majors: PathBuf,
    pub categories: PathBuf,
}

impl RequirementSources {
    /// Conventional file names inside one data directory.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            rules: dir.join("graduation_requirements.csv"),
            subcategories: dir.join("subcategories.csv"),
            majors: dir.join("categories.csv"),
            categories: dir.join("maincategories.csv"),
        }
    }
}

/// Requirement masters, read fresh for every report.
#[derive(Debug, Clone, Default)]
pub struct RequirementTables {
    rules: BTreeMap<SubcategoryId, f64>,
    subcategories: HashMap<SubcategoryId, SubcategoryRecord>,
    majors: HashMap<MajorId, MajorRecord>,
    categories: HashMap<CategoryId, CategoryRecord>,
}

impl RequirementTables {
    pub fn load(sources: &RequirementSources) -> RequirementResult<Self> {
        let rules = read_table("requirement rules", &sources.rules)?;
        let subcategories = read_table("subcategories", &sources.subcategories)?;
        let majors = read_table("majors", &sources.majors)?;
        let categories = read_table("categories", &sources.categories)?;

        let tables = Self::from_parts(
            parse_rules(&rules),
            parse_subcategories(&subcategories),
            parse_majors(&majors),
            parse_categories(&categories),
        );
        log::debug!(
            "requirement tables: {} rules, {} subcategories, {} majors, {} categories",
            tables.rules.len(),
            tables.subcategories.len(),
            tables.majors.len(),
            tables.categories.len()
        );
        Ok(tables)
    }

    pub fn from_parts(
        rules: Vec<RequirementRule>,
        subcategories: Vec<SubcategoryRecord>,
        majors: Vec<MajorRecord>,
        categories: Vec<CategoryRecord>,
    ) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| (rule.subcategory_id, rule.required_credits))
                .collect(),
            subcategories: subcategories
                .into_iter()
                .map(|record| (record.id, record))
                .collect(),
            majors: majors.into_iter().map(|record| (record.id, record)).collect(),
            categories: categories
                .into_iter()
                .map(|record| (record.id, record))
                .collect(),
        }
    }

    /// Rules in ascending subcategory order.
    pub fn rules(&self) -> impl Iterator<Item = (SubcategoryId, f64)> + '_ {
        self.rules.iter().map(|(id, required)| (*id, *required))
    }

    pub fn subcategory(&self, id: SubcategoryId) -> Option<&SubcategoryRecord> {
        self.subcategories.get(&id)
    }

    pub fn major(&self, id: MajorId) -> Option<&MajorRecord> {
        self.majors.get(&id)
    }

    pub fn category(&self, id: CategoryId) -> Option<&CategoryRecord> {
        self.categories.get(&id)
    }
}

fn read_table(table: &'static str, path: &Path) -> RequirementResult<Table> {
    Table::read(path).map_err(|err| match err {
        TableError::NotFound(path) => RequirementError::SourceUnavailable { table, path },
        source => RequirementError::Table { table, source },
    })
}

fn name_or(raw: &str, fallback: impl FnOnce() -> String) -> String {
    if raw.is_empty() {
        fallback()
    } else {
        raw.to_owned()
    }
}

fn parse_rules(table: &Table) -> Vec<RequirementRule> {
    let id_col = table.column("小区分ID");
    let credits_col = table.column("単位数");
    table
        .rows()
        .filter_map(|row| {
            let subcategory_id = row.get(id_col).parse::<SubcategoryId>().ok()?;
            let required_credits = row.get(credits_col).parse::<f64>().ok()?;
            (subcategory_id.0 > 0 && required_credits.is_finite() && required_credits >= 0.0)
                .then_some(RequirementRule {
                    subcategory_id,
                    required_credits,
                })
        })
        .collect()
}

fn parse_subcategories(table: &Table) -> Vec<SubcategoryRecord> {
    let id_col = table.column("小区分ID");
    let name_col = table.column("小区分");
    let major_col = table.column("大区分ID");
    table
        .rows()
        .filter_map(|row| {
            let id = row.get(id_col).parse::<SubcategoryId>().ok()?;
            let major_id = row.get(major_col).parse::<MajorId>().ok()?;
            Some(SubcategoryRecord {
                id,
                name: name_or(row.get(name_col), || format!("subcategory {id}")),
                major_id,
            })
        })
        .collect()
}

fn parse_majors(table: &Table) -> Vec<MajorRecord> {
    let id_col = table.column("大区分ID");
    let name_col = table.column("大区分");
    let category_col = table.column("カテゴリID");
    table
        .rows()
        .filter_map(|row| {
            let id = row.get(id_col).parse::<MajorId>().ok()?;
            let category_id = row.get(category_col).parse::<CategoryId>().ok()?;
            Some(MajorRecord {
                id,
                name: name_or(row.get(name_col), || format!("major {id}")),
                category_id,
            })
        })
        .collect()
}

fn parse_categories(table: &Table) -> Vec<CategoryRecord> {
    let id_col = table.column("カテゴリID");
    let name_col = table.column("カテゴリ区分");
    table
        .rows()
        .filter_map(|row| {
            let id = row.get(id_col).parse::<CategoryId>().ok()?;
            Some(CategoryRecord {
                id,
                name: name_or(row.get(name_col), || format!("category {id}")),
            })
        })
        .collect()
}
