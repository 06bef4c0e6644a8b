//! Request-level operations: compute now, save, and the saved-set summary.

use std::sync::Arc;

use common::{Entry, PersistedEntry, RawEntry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CatalogCache, CatalogError};
use crate::gpa::{self, DetailRow, ValidationError};
use crate::requirements::{
    self, RequirementError, RequirementReport, RequirementSources, RequirementTables,
};
use crate::resolver::{
    EntryResolver, FallbackSettings, ResolutionPolicy, ResolveError, ResolveTarget,
};
use crate::storage::{EntryStore, StorageError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid entry: {0}")]
    Validation(#[from] ValidationError),

    #[error("entry store error: {0}")]
    Storage(#[from] StorageError),

    #[error("requirements error: {0}")]
    Requirements(#[from] RequirementError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub compute_policy: ResolutionPolicy,
    pub save_policy: ResolutionPolicy,
    pub fallback: FallbackSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeReport {
    pub gpa: f64,
    pub total_credits_counted: f64,
    pub details: Vec<DetailRow>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveReport {
    pub saved_count: usize,
    pub skipped_count: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub gpa: f64,
    pub total_credits_counted: f64,
    pub details: Vec<DetailRow>,
    pub warnings: Vec<String>,
    pub requirements: RequirementReport,
}

pub struct GradeService<S: EntryStore> {
    catalog: Arc<CatalogCache>,
    store: S,
    requirements: RequirementSources,
    settings: ServiceSettings,
}

impl<S: EntryStore> GradeService<S> {
    pub fn new(catalog: Arc<CatalogCache>, store: S, requirements: RequirementSources) -> Self {
        Self {
            catalog,
            store,
            requirements,
            settings: ServiceSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn resolver(&self) -> EntryResolver<'_> {
        EntryResolver::new(&self.catalog).with_fallback(self.settings.fallback.clone())
    }

    /// GPA over the submitted entries; nothing is saved.
    pub fn compute_now(&self, raw: &[RawEntry]) -> ServiceResult<ComputeReport> {
        let resolution =
            self.resolver()
                .resolve(raw, self.settings.compute_policy, ResolveTarget::Compute)?;
        let report = gpa::compute(&resolution.accepted)?;

        Ok(ComputeReport {
            gpa: report.gpa,
            total_credits_counted: report.total_credits_counted,
            details: report.details,
            warnings: resolution.warnings,
        })
    }

    /// Saves every entry that resolves to a catalog subject; the rest are
    /// counted as skipped and explained in the warnings.
    pub fn save_lenient(&self, raw: &[RawEntry]) -> ServiceResult<SaveReport> {
        let resolution =
            self.resolver()
                .resolve(raw, self.settings.save_policy, ResolveTarget::Persist)?;
        let mut warnings = resolution.warnings;
        let mut skipped_count = resolution.rejected;

        let mut persisted: Vec<PersistedEntry> = Vec::with_capacity(resolution.accepted.len());
        for entry in resolution.accepted {
            match entry.into_persisted() {
                Ok(saved) => persisted.push(saved),
                Err(unkeyed) => {
                    skipped_count += 1;
                    warnings.push(format!(
                        "subject name '{}' has no catalog id -> not saved",
                        unkeyed.name
                    ));
                }
            }
        }

        let saved_count = self.store.upsert_all(&persisted)?;
        Ok(SaveReport {
            saved_count,
            skipped_count,
            warnings,
        })
    }

    /// GPA and requirement report over everything saved so far, using the
    /// name, credits and subcategory recorded at save time.
    pub fn summary(&self) -> ServiceResult<SummaryReport> {
        let saved = self.store.load_all()?;
        let mut warnings = Vec::new();
        let mut entries: Vec<Entry> = Vec::with_capacity(saved.len());

        for record in saved {
            if self.catalog.get(&record.subject_id)?.is_none() {
                warnings.push(format!(
                    "subject_id '{}' not found in catalog; using saved name/credits/field",
                    record.subject_id
                ));
            }
            entries.push(record.into());
        }

        let report = gpa::compute(&entries)?;
        let tables = RequirementTables::load(&self.requirements)?;
        let requirements = requirements::evaluate(&entries, &tables);

        Ok(SummaryReport {
            gpa: report.gpa,
            total_credits_counted: report.total_credits_counted,
            details: report.details,
            warnings,
            requirements,
        })
    }

    pub fn reload_catalog(&self) -> ServiceResult<()> {
        self.catalog.force_reload()?;
        Ok(())
    }

    pub fn subjects(&self) -> ServiceResult<Vec<String>> {
        Ok(self.catalog.subject_names()?)
    }
}
