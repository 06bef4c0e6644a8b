//! Maps raw `{name, grade}` pairs onto catalog subjects.

use common::{Entry, Grade, RawEntry, UNASSIGNED_SUBCATEGORY};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CatalogCache, CatalogError};

/// What happens to an entry whose name has no catalog match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// The whole call fails.
    Strict,
    /// The entry is dropped with a warning.
    #[default]
    Lenient,
    /// The entry is kept with estimated credits and the unassigned subcategory.
    Fallback,
}

/// Estimate applied to unmatched entries under [`ResolutionPolicy::Fallback`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    pub credits: f64,
    pub subcategory: String,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            credits: 2.0,
            subcategory: UNASSIGNED_SUBCATEGORY.to_owned(),
        }
    }
}

/// Which name a matched entry carries forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveTarget {
    /// Keep the name as typed; nothing is stored.
    Compute,
    /// Use the catalog's canonical name, frozen at save time.
    Persist,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub accepted: Vec<Entry>,
    pub warnings: Vec<String>,
    pub rejected: usize,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("entries[{index}]: subject name '{name}' not found in catalog")]
    UnresolvedSubject { index: usize, name: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

pub struct EntryResolver<'a> {
    catalog: &'a CatalogCache,
    fallback: FallbackSettings,
}

impl<'a> EntryResolver<'a> {
    pub fn new(catalog: &'a CatalogCache) -> Self {
        Self {
            catalog,
            fallback: FallbackSettings::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackSettings) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn resolve(
        &self,
        raw: &[RawEntry],
        policy: ResolutionPolicy,
        target: ResolveTarget,
    ) -> ResolveResult<Resolution> {
        let mut resolution = Resolution::default();

        for (index, item) in raw.iter().enumerate() {
            let name = item.name.trim();
            if name.is_empty() {
                resolution.reject(format!("entries[{index}].name is empty -> skipped"));
                continue;
            }
            let grade = match item.grade.parse::<Grade>() {
                Ok(grade) => grade,
                Err(err) => {
                    resolution.reject(format!("entries[{index}].{err} -> skipped"));
                    continue;
                }
            };

            let Some(subject) = self.catalog.get_by_name(name)? else {
                match policy {
                    ResolutionPolicy::Strict => {
                        return Err(ResolveError::UnresolvedSubject {
                            index,
                            name: name.to_owned(),
                        });
                    }
                    ResolutionPolicy::Lenient => {
                        resolution.reject(format!(
                            "subject name '{name}' not found in catalog -> skipped"
                        ));
                    }
                    ResolutionPolicy::Fallback => {
                        resolution.warnings.push(format!(
                            "subject name '{name}' not found in catalog; estimated with {} credits (field={})",
                            self.fallback.credits, self.fallback.subcategory
                        ));
                        resolution.accepted.push(Entry::new(
                            name,
                            grade,
                            self.fallback.credits,
                            self.fallback.subcategory.clone(),
                        ));
                    }
                }
                continue;
            };

            let emitted_name = match target {
                ResolveTarget::Compute => name,
                ResolveTarget::Persist => subject.name(),
            };
            resolution.accepted.push(
                Entry::new(emitted_name, grade, subject.credits(), subject.subcategory())
                    .with_subject_id(subject.id()),
            );
        }

        log::debug!(
            "resolved {} of {} entries ({} rejected, {} warnings)",
            resolution.accepted.len(),
            raw.len(),
            resolution.rejected,
            resolution.warnings.len()
        );
        Ok(resolution)
    }
}

impl Resolution {
    fn reject(&mut self, warning: String) {
        self.rejected += 1;
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    fn catalog(dir: &TempDir) -> CatalogCache {
        let path = dir.path().join("subjects.csv");
        fs::write(
            &path,
            "科目ID,科目名,単位数,小区分ID\n101,微積分Ⅰ,2,7\n102,情報倫理,1,8\n",
        )
        .expect("write catalog");
        CatalogCache::new(path)
    }

    #[test]
    fn invalid_items_become_warnings() {
        let tmp = TempDir::new().expect("temp dir");
        let cache = catalog(&tmp);
        let raw = vec![
            RawEntry::new("  ", "A"),
            RawEntry::new("微積分Ⅰ", "A+"),
            RawEntry::new("情報倫理", " b "),
        ];

        let out = EntryResolver::new(&cache)
            .resolve(&raw, ResolutionPolicy::Lenient, ResolveTarget::Compute)
            .unwrap();

        assert_eq!(out.rejected, 2);
        assert_eq!(
            out.warnings,
            vec![
                "entries[0].name is empty -> skipped".to_string(),
                "entries[1].grade 'A+' not supported (A/B/C/D/F) -> skipped".to_string(),
            ]
        );
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].grade, Grade::B);
    }

    #[test]
    fn compute_keeps_input_name_persist_uses_catalog_name() {
        let tmp = TempDir::new().expect("temp dir");
        let cache = catalog(&tmp);
        let raw = vec![RawEntry::new("微積分I", "A")];
        let resolver = EntryResolver::new(&cache);

        let compute = resolver
            .resolve(&raw, ResolutionPolicy::Lenient, ResolveTarget::Compute)
            .unwrap();
        assert_eq!(compute.accepted[0].name, "微積分I");

        let persist = resolver
            .resolve(&raw, ResolutionPolicy::Lenient, ResolveTarget::Persist)
            .unwrap();
        let entry = &persist.accepted[0];
        assert_eq!(entry.name, "微積分Ⅰ");
        assert_eq!(entry.subject_id.as_deref(), Some("101"));
        assert_eq!(entry.credits, 2.0);
        assert_eq!(entry.subcategory, "7");
    }

    #[test]
    fn fallback_uses_configured_estimate() {
        let tmp = TempDir::new().expect("temp dir");
        let cache = catalog(&tmp);
        let raw = vec![RawEntry::new("海洋学", "C")];

        let out = EntryResolver::new(&cache)
            .with_fallback(FallbackSettings {
                credits: 3.0,
                subcategory: "TBD".into(),
            })
            .resolve(&raw, ResolutionPolicy::Fallback, ResolveTarget::Compute)
            .unwrap();

        assert_eq!(out.rejected, 0);
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].credits, 3.0);
        assert_eq!(out.accepted[0].subject_id, None);
        assert_eq!(
            out.warnings,
            vec!["subject name '海洋学' not found in catalog; estimated with 3 credits (field=TBD)"]
        );
    }

    #[test]
    fn policy_deserializes_from_snake_case() {
        #[derive(Deserialize)]
        struct Holder {
            policy: ResolutionPolicy,
        }
        let holder: Holder = serde_json::from_str(r#"{"policy":"fallback"}"#).unwrap();
        assert_eq!(holder.policy, ResolutionPolicy::Fallback);
        assert_eq!(ResolutionPolicy::default(), ResolutionPolicy::Lenient);
    }
}
