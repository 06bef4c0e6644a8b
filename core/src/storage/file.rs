use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use common::{Grade, PersistedEntry, SubjectId, UNASSIGNED_SUBCATEGORY};

use super::{EntryStore, StorageError, StorageOp, StorageResult};
use crate::table::{write_table, Table, TableError};

const COLUMNS: [&str; 5] = ["subject_id", "name", "grade", "credits", "field"];

/// Cells of one saved row in `COLUMNS` order, as read from the file.
type RawRow = [String; 5];

/// Saved entries in a single comma separated file.
///
/// Every upsert reads the file, merges the batch and rewrites the whole file.
/// The cycle runs under one store-wide mutex so concurrent upserts cannot
/// drop each other's entries; loads take the same mutex so they never see a
/// half-written file.
///
/// Rows that do not parse are skipped by `load_all` but written back
/// unchanged by `upsert_all`; only rows without a subject id are discarded.
pub struct CsvFileStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl CsvFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self, tag: &'static str) -> StorageResult<MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::LockPoisoned(tag))
    }

    /// Saved rows keyed by subject id; a later row wins over an earlier one.
    fn read_rows(&self, op: StorageOp) -> StorageResult<BTreeMap<SubjectId, RawRow>> {
        let table = match Table::read(&self.path) {
            Ok(table) => table,
            Err(TableError::NotFound(_)) => return Ok(BTreeMap::new()),
            Err(source) => return Err(StorageError::Table { op, source }),
        };

        let columns = COLUMNS.map(|column| table.column(column));
        let mut rows = BTreeMap::new();
        for row in table.rows() {
            let cells: RawRow = columns.map(|column| row.get(column).to_owned());
            if cells[0].is_empty() {
                continue;
            }
            rows.insert(cells[0].clone(), cells);
        }
        Ok(rows)
    }
}

fn parse_row([subject_id, name, grade, credits, field]: RawRow) -> Option<PersistedEntry> {
    let grade = grade.parse::<Grade>().ok()?;
    let credits = credits.parse::<f64>().ok()?;
    if name.is_empty() || !credits.is_finite() || credits <= 0.0 {
        return None;
    }
    let subcategory = if field.is_empty() {
        UNASSIGNED_SUBCATEGORY.to_owned()
    } else {
        field
    };
    Some(PersistedEntry {
        subject_id,
        name,
        grade,
        credits,
        subcategory,
    })
}

fn to_row(entry: &PersistedEntry) -> RawRow {
    [
        entry.subject_id.clone(),
        entry.name.clone(),
        entry.grade.to_string(),
        entry.credits.to_string(),
        entry.subcategory.clone(),
    ]
}

impl EntryStore for CsvFileStore {
    fn load_all(&self) -> StorageResult<Vec<PersistedEntry>> {
        let rows = {
            let _guard = self.lock("entry store load")?;
            self.read_rows(StorageOp::Load)?
        };

        let total = rows.len();
        let entries: Vec<PersistedEntry> = rows.into_values().filter_map(parse_row).collect();
        if entries.len() < total {
            log::debug!(
                "entry store {}: ignored {} malformed rows",
                self.path.display(),
                total - entries.len()
            );
        }
        Ok(entries)
    }

    fn upsert_all(&self, incoming: &[PersistedEntry]) -> StorageResult<usize> {
        if incoming.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock("entry store upsert")?;
        let mut rows = self.read_rows(StorageOp::Upsert)?;
        let mut written = BTreeSet::new();
        for entry in incoming {
            rows.insert(entry.subject_id.clone(), to_row(entry));
            written.insert(entry.subject_id.as_str());
        }

        let rows = rows.into_values().map(Vec::from);
        write_table(&self.path, &COLUMNS, rows).map_err(|source| StorageError::Table {
            op: StorageOp::Upsert,
            source,
        })?;

        log::info!(
            "saved {} entries to {}",
            written.len(),
            self.path.display()
        );
        Ok(written.len())
    }
}
