//! Graduation requirement roll-up: subcategory -> major area -> category.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use common::{CategoryId, Entry, MajorId, SubcategoryId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gpa::round2;
use crate::table::TableError;

mod tables;

pub use tables::{RequirementSources, RequirementTables};

#[derive(Debug, Error)]
pub enum RequirementError {
    #[error("{table} table unavailable at {}", .path.display())]
    SourceUnavailable { table: &'static str, path: PathBuf },

    #[error("failed to read {table} table: {source}")]
    Table {
        table: &'static str,
        #[source]
        source: TableError,
    },
}

pub type RequirementResult<T> = Result<T, RequirementError>;

/// One line of the report at any hierarchy level. Values are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementRow {
    pub id: u32,
    pub name: String,
    pub required: f64,
    pub earned: f64,
    pub short: f64,
}

impl RequirementRow {
    fn new(id: u32, name: String, totals: Totals) -> Self {
        Self {
            id,
            name,
            required: round2(totals.required),
            earned: round2(totals.earned),
            short: round2(totals.short()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShortSummary {
    pub total_short: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequirementReport {
    pub ok: bool,
    pub by_subcategory: Vec<RequirementRow>,
    pub by_major: Vec<RequirementRow>,
    pub by_category: Vec<RequirementRow>,
    pub short_summary: ShortSummary,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    required: f64,
    earned: f64,
}

impl Totals {
    fn add(&mut self, other: Totals) {
        self.required += other.required;
        self.earned += other.earned;
    }

    fn short(&self) -> f64 {
        (self.required - self.earned).max(0.0)
    }
}

/// Credits earned per subcategory. Failing grades earn nothing; entries with
/// a tag that is not a subcategory id are reported by name and left out.
fn earned_by_subcategory(entries: &[Entry], warnings: &mut Vec<String>) -> HashMap<SubcategoryId, f64> {
    let mut earned = HashMap::new();
    for entry in entries {
        if !entry.grade.is_passing() {
            continue;
        }
        let Ok(id) = entry.subcategory.parse::<SubcategoryId>() else {
            warnings.push(format!(
                "subject '{}' has unknown subcategory (field='{}'); excluded from requirement totals",
                entry.name, entry.subcategory
            ));
            continue;
        };
        if entry.credits.is_finite() && entry.credits > 0.0 {
            *earned.entry(id).or_insert(0.0) += entry.credits;
        }
    }
    earned
}

/// Evaluates entries against the requirement tables.
///
/// Every subcategory with a rule is reported, earned or not. Subcategories
/// without a rule are never reported. Major and category totals are sums of
/// their subcategory rows. A subcategory contributes upwards only through a
/// major present in the majors table, and a major only through a category
/// present in the categories table.
pub fn evaluate(entries: &[Entry], tables: &RequirementTables) -> RequirementReport {
    let mut warnings = Vec::new();
    let earned = earned_by_subcategory(entries, &mut warnings);

    let mut by_subcategory = Vec::new();
    let mut majors: BTreeMap<MajorId, Totals> = BTreeMap::new();
    let mut categories: BTreeMap<CategoryId, Totals> = BTreeMap::new();
    let mut total_short = 0.0;

    for (id, required) in tables.rules() {
        let totals = Totals {
            required,
            earned: earned.get(&id).copied().unwrap_or(0.0),
        };
        total_short += totals.short();

        let subcategory = tables.subcategory(id);
        let name = subcategory
            .map(|record| record.name.clone())
            .unwrap_or_else(|| format!("subcategory {id}"));
        by_subcategory.push(RequirementRow::new(id.0, name, totals));

        let Some(major) = subcategory.and_then(|record| tables.major(record.major_id)) else {
            continue;
        };
        majors.entry(major.id).or_default().add(totals);
        if tables.category(major.category_id).is_some() {
            categories.entry(major.category_id).or_default().add(totals);
        }
    }

    let by_major = majors
        .into_iter()
        .map(|(id, totals)| {
            let name = tables
                .major(id)
                .map(|record| record.name.clone())
                .unwrap_or_else(|| format!("major {id}"));
            RequirementRow::new(id.0, name, totals)
        })
        .collect();

    let by_category = categories
        .into_iter()
        .map(|(id, totals)| {
            let name = tables
                .category(id)
                .map(|record| record.name.clone())
                .unwrap_or_else(|| format!("category {id}"));
            RequirementRow::new(id.0, name, totals)
        })
        .collect();

    RequirementReport {
        ok: total_short <= 0.0,
        by_subcategory,
        by_major,
        by_category,
        short_summary: ShortSummary {
            total_short: round2(total_short),
        },
        warnings,
    }
}
