//! Process-wide subject catalog with modification-time based invalidation.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};

use common::{SubjectId, SubjectRecord, UNASSIGNED_SUBCATEGORY};
use thiserror::Error;

use crate::table::{Table, TableError};

mod clock;
mod normalize;
mod schema;

pub use clock::{Clock, ManualClock, SystemClock};
pub use normalize::normalize_name;
pub use schema::{CatalogSchema, ColumnMapping, ResolvedColumns};

/// Minimum time between two modification-time checks of the source.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("failed to inspect catalog source {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read catalog source: {0}")]
    Table(#[from] TableError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

struct CatalogState {
    source: PathBuf,
    by_id: HashMap<SubjectId, Arc<SubjectRecord>>,
    by_name: HashMap<String, Arc<SubjectRecord>>,
    loaded_path: Option<PathBuf>,
    modified: Option<SystemTime>,
    last_check: Option<Instant>,
}

impl CatalogState {
    fn new(source: PathBuf) -> Self {
        Self {
            source,
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            loaded_path: None,
            modified: None,
            last_check: None,
        }
    }
}

struct LoadedCatalog {
    by_id: HashMap<SubjectId, Arc<SubjectRecord>>,
    by_name: HashMap<String, Arc<SubjectRecord>>,
    dropped: usize,
}

/// Read-through cache over the subject catalog table.
///
/// The table is loaded lazily on first access. Afterwards every access may
/// re-check the file's modification time, but at most once per poll
/// interval, so readers can observe data that is up to one interval stale.
pub struct CatalogCache {
    state: RwLock<CatalogState>,
    schema: CatalogSchema,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl CatalogCache {
    pub fn new<P: Into<PathBuf>>(source: P) -> Self {
        Self {
            state: RwLock::new(CatalogState::new(source.into())),
            schema: CatalogSchema::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_schema(mut self, schema: CatalogSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn with_state<F, T>(&self, op: &'static str, func: F) -> CatalogResult<T>
    where
        F: FnOnce(&mut CatalogState) -> T,
    {
        let mut guard = self
            .state
            .write()
            .map_err(|_| CatalogError::LockPoisoned(op))?;
        Ok(func(&mut guard))
    }

    fn with_state_read<F, T>(&self, op: &'static str, func: F) -> CatalogResult<T>
    where
        F: FnOnce(&CatalogState) -> T,
    {
        let guard = self
            .state
            .read()
            .map_err(|_| CatalogError::LockPoisoned(op))?;
        Ok(func(&guard))
    }

    /// Looks a subject up by its catalog id.
    pub fn get(&self, id: &str) -> CatalogResult<Option<Arc<SubjectRecord>>> {
        self.refresh(false)?;
        self.with_state_read("get", |state| state.by_id.get(id).cloned())
    }

    /// Looks a subject up by name, see [`normalize_name`].
    pub fn get_by_name(&self, name: &str) -> CatalogResult<Option<Arc<SubjectRecord>>> {
        self.refresh(false)?;
        let key = normalize_name(name);
        self.with_state_read("get_by_name", |state| state.by_name.get(&key).cloned())
    }

    /// Reloads the source now, ignoring the poll interval and modification time.
    pub fn force_reload(&self) -> CatalogResult<()> {
        self.refresh(true)
    }

    /// Points the cache at a different source; the next access reloads.
    pub fn retarget<P: Into<PathBuf>>(&self, source: P) -> CatalogResult<()> {
        let source = source.into();
        self.with_state("retarget", |state| state.source = source)
    }

    pub fn source(&self) -> CatalogResult<PathBuf> {
        self.with_state_read("source", |state| state.source.clone())
    }

    pub fn len(&self) -> CatalogResult<usize> {
        self.refresh(false)?;
        self.with_state_read("len", |state| state.by_id.len())
    }

    pub fn is_empty(&self) -> CatalogResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Canonical subject names, sorted.
    pub fn subject_names(&self) -> CatalogResult<Vec<String>> {
        self.refresh(false)?;
        let mut names = self.with_state_read("subject_names", |state| {
            state
                .by_id
                .values()
                .map(|record| record.name().to_owned())
                .collect::<Vec<_>>()
        })?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn refresh(&self, force: bool) -> CatalogResult<()> {
        let now = self.clock.now();
        let interval = self.poll_interval;

        let snapshot = self.with_state_read("refresh check", |state| {
            let same_path = state.loaded_path.as_ref() == Some(&state.source);
            let recently_checked = state
                .last_check
                .map(|at| now.saturating_duration_since(at) < interval)
                .unwrap_or(false);
            if !force && same_path && recently_checked {
                None
            } else {
                Some((state.source.clone(), same_path, state.modified))
            }
        })?;
        let Some((path, same_path, seen_modified)) = snapshot else {
            return Ok(());
        };

        let modified = match modification_time(&path) {
            Ok(modified) => modified,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.install_empty(&path, now)?;
                return Ok(());
            }
            Err(source) => return Err(CatalogError::Io { path, source }),
        };

        if !force && same_path && seen_modified == Some(modified) {
            return self.with_state("refresh mark", |state| state.last_check = Some(now));
        }

        let loaded = match load_subjects(&path, &self.schema) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                self.install_empty(&path, now)?;
                return Ok(());
            }
            Err(err) => {
                // Keep the previous subjects and retry once the file changes again.
                self.with_state("refresh failed", |state| {
                    state.loaded_path = Some(path.clone());
                    state.modified = Some(modified);
                    state.last_check = Some(now);
                })?;
                if force {
                    return Err(err);
                }
                log::warn!(
                    "catalog {}: reload failed, serving previous subjects: {err}",
                    path.display()
                );
                return Ok(());
            }
        };

        if loaded.dropped > 0 {
            log::debug!(
                "catalog {}: skipped {} rows without id/name or with invalid credits",
                path.display(),
                loaded.dropped
            );
        }
        log::info!(
            "catalog loaded {} subjects from {}",
            loaded.by_id.len(),
            path.display()
        );

        self.with_state("refresh swap", |state| {
            state.by_id = loaded.by_id;
            state.by_name = loaded.by_name;
            state.loaded_path = Some(path);
            state.modified = Some(modified);
            state.last_check = Some(now);
        })
    }

    fn install_empty(&self, path: &Path, now: Instant) -> CatalogResult<()> {
        let had_subjects = self.with_state("refresh clear", |state| {
            let had_subjects = !state.by_id.is_empty();
            state.by_id.clear();
            state.by_name.clear();
            state.loaded_path = Some(path.to_path_buf());
            state.modified = None;
            state.last_check = Some(now);
            had_subjects
        })?;
        if had_subjects {
            log::info!("catalog source {} disappeared; catalog is now empty", path.display());
        } else {
            log::debug!("catalog source {} not present", path.display());
        }
        Ok(())
    }
}

fn modification_time(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

fn load_subjects(path: &Path, schema: &CatalogSchema) -> CatalogResult<Option<LoadedCatalog>> {
    let table = match Table::read(path) {
        Ok(table) => table,
        Err(TableError::NotFound(_)) => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let columns = schema.resolve(&table);
    let mut by_id = HashMap::new();
    let mut by_name = HashMap::new();
    let mut dropped = 0;

    for row in table.rows() {
        let id = row.get(columns.id);
        let name = row.get(columns.name);
        let credits = match row.get(columns.credits).parse::<f64>() {
            Ok(credits) if credits.is_finite() && credits > 0.0 => credits,
            _ => {
                dropped += 1;
                continue;
            }
        };
        if id.is_empty() || name.is_empty() {
            dropped += 1;
            continue;
        }

        let subcategory = match row.get(columns.subcategory) {
            "" => UNASSIGNED_SUBCATEGORY,
            tag => tag,
        };
        let record = Arc::new(SubjectRecord::new(id, name, credits, subcategory));
        by_id.insert(id.to_owned(), record.clone());
        by_name.insert(normalize_name(name), record);
    }

    Ok(Some(LoadedCatalog {
        by_id,
        by_name,
        dropped,
    }))
}
