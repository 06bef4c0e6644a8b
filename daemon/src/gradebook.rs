use std::sync::Arc;

use gradebook_core::{
    CatalogCache, ComputeReport, CsvFileStore, GradeService, InMemoryStore, RawEntry,
    RequirementSources, SaveReport, ServiceResult, SummaryReport,
};

use crate::config::{DaemonConfig, EntriesBackendKind};

pub type ServiceHandle = Arc<Gradebook>;

/// The grade service over whichever entry store the configuration selects.
pub struct Gradebook {
    inner: GradebookInner,
}

enum GradebookInner {
    InMemory(GradeService<InMemoryStore>),
    Csv(GradeService<CsvFileStore>),
}

macro_rules! dispatch {
    ($self:ident, $service:ident => $body:expr) => {
        match &$self.inner {
            GradebookInner::InMemory($service) => $body,
            GradebookInner::Csv($service) => $body,
        }
    };
}

impl Gradebook {
    pub fn from_config(config: &DaemonConfig) -> Self {
        let data = config.data();
        let catalog = Arc::new(
            CatalogCache::new(data.catalog.clone())
                .with_schema(config.catalog().columns.clone())
                .with_poll_interval(config.catalog().poll_interval()),
        );
        let sources = RequirementSources {
            rules: data.rules.clone(),
            subcategories: data.subcategories.clone(),
            majors: data.majors.clone(),
            categories: data.categories.clone(),
        };
        let settings = config.service_settings();

        let inner = match data.entries_backend {
            EntriesBackendKind::Memory => {
                log::info!("initialising in-memory entry store");
                GradebookInner::InMemory(
                    GradeService::new(catalog, InMemoryStore::new(), sources)
                        .with_settings(settings),
                )
            }
            EntriesBackendKind::Csv => {
                log::info!("initialising csv entry store at {}", data.entries.display());
                GradebookInner::Csv(
                    GradeService::new(catalog, CsvFileStore::new(data.entries.clone()), sources)
                        .with_settings(settings),
                )
            }
        };

        log::info!("catalog source {}", data.catalog.display());
        Self { inner }
    }

    pub fn compute_now(&self, raw: &[RawEntry]) -> ServiceResult<ComputeReport> {
        dispatch!(self, service => service.compute_now(raw))
    }

    pub fn save_lenient(&self, raw: &[RawEntry]) -> ServiceResult<SaveReport> {
        dispatch!(self, service => service.save_lenient(raw))
    }

    pub fn summary(&self) -> ServiceResult<SummaryReport> {
        dispatch!(self, service => service.summary())
    }

    pub fn reload_catalog(&self) -> ServiceResult<()> {
        dispatch!(self, service => service.reload_catalog())
    }

    pub fn subjects(&self) -> ServiceResult<Vec<String>> {
        dispatch!(self, service => service.subjects())
    }
}

pub fn shared_service(config: &DaemonConfig) -> ServiceHandle {
    Arc::new(Gradebook::from_config(config))
}
