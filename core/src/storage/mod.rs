use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::RwLock;

use common::{PersistedEntry, SubjectId};
use thiserror::Error;

use crate::table::TableError;

pub mod file;

pub use file::CsvFileStore;

pub type StorageResult<T> = Result<T, StorageError>;

/// Store operation that failed, carried for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Load,
    Upsert,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageOp::Load => f.write_str("load entries"),
            StorageOp::Upsert => f.write_str("upsert entries"),
        }
    }
}

/// Errors produced by entry stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{op} failed: {source}")]
    Table {
        op: StorageOp,
        #[source]
        source: TableError,
    },

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

/// Persistence for saved entries, keyed by subject id.
///
/// `upsert_all` replaces any saved entry with the same `subject_id`; there is
/// never more than one entry per subject.
pub trait EntryStore: Send + Sync {
    fn load_all(&self) -> StorageResult<Vec<PersistedEntry>>;

    /// Returns the number of distinct subject ids written.
    fn upsert_all(&self, entries: &[PersistedEntry]) -> StorageResult<usize>;

    fn len(&self) -> StorageResult<usize> {
        Ok(self.load_all()?.len())
    }

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Map-backed store for tests and throwaway sessions.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<SubjectId, PersistedEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntryStore for InMemoryStore {
    fn load_all(&self) -> StorageResult<Vec<PersistedEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::LockPoisoned("entries read"))?;
        Ok(entries.values().cloned().collect())
    }

    fn upsert_all(&self, incoming: &[PersistedEntry]) -> StorageResult<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::LockPoisoned("entries write"))?;
        let mut written = BTreeSet::new();
        for entry in incoming {
            entries.insert(entry.subject_id.clone(), entry.clone());
            written.insert(entry.subject_id.as_str());
        }
        Ok(written.len())
    }
}
