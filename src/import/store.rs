use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use ahash::AHashMap;
use anyhow::Context;

use crate::common::ensure_parent_exists;
use crate::config::StoreSettings;
use crate::error::PersistenceError;
use crate::import::{ImportRecord, Ledger, sql};
use crate::record::BuildingRecord;

/// Persistence collaborator shared by all workers.
///
/// Implementations must be safe for concurrent calls. Upserts are keyed by
/// building id with last-writer-wins semantics.
pub trait Store: Send + Sync {
    /// Write one batch of records.
    fn upsert(&self, batch: &[BuildingRecord]) -> Result<(), PersistenceError>;

    /// Record that a file was imported completely.
    fn mark_imported(&self, record: &ImportRecord) -> Result<(), PersistenceError>;

    /// Snapshot of completed imports.
    fn imported(&self) -> Result<Ledger, PersistenceError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, PersistenceError> {
    mutex.lock().map_err(|_| PersistenceError::Backend("store lock poisoned".into()))
}

#[derive(Debug, Default)]
struct MemoryInner {
    by_id: AHashMap<String, BuildingRecord>,
    anonymous: Vec<BuildingRecord>,
    ledger: Ledger,
    batches: usize,
}

/// In-process store. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    /// Reject every batch after this many have been accepted.
    batch_limit: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// A store that fails once `limit` batches have been written.
    pub fn with_batch_limit(limit: usize) -> Self {
        Self { batch_limit: Some(limit), ..Self::default() }
    }

    /// Start from an existing ledger, e.g. to preview a re-run.
    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            inner: Mutex::new(MemoryInner { ledger, ..MemoryInner::default() }),
            batch_limit: None,
        }
    }

    /// Stored record for a building id.
    pub fn get(&self, id: &str) -> Option<BuildingRecord> {
        self.inner.lock().ok()?.by_id.get(id).cloned()
    }

    /// All stored records: keyed ones sorted by id, then the ones without id.
    pub fn records(&self) -> Vec<BuildingRecord> {
        let Ok(inner) = self.inner.lock() else { return Vec::new() };
        let mut keyed: Vec<_> = inner.by_id.values().cloned().collect();
        keyed.sort_by(|a, b| a.id().cmp(&b.id()));
        keyed.extend(inner.anonymous.iter().cloned());
        keyed
    }

    /// Number of batches accepted so far.
    pub fn batches(&self) -> usize {
        self.inner.lock().map(|inner| inner.batches).unwrap_or(0)
    }
}

impl Store for MemoryStore {
    fn upsert(&self, batch: &[BuildingRecord]) -> Result<(), PersistenceError> {
        let mut inner = lock(&self.inner)?;
        if self.batch_limit.is_some_and(|limit| inner.batches >= limit) {
            return Err(PersistenceError::Backend(format!("batch limit of {} reached", inner.batches)));
        }
        for record in batch {
            match record.id() {
                Some(id) => { inner.by_id.insert(id.to_string(), record.clone()); }
                None => inner.anonymous.push(record.clone()),
            }
        }
        inner.batches += 1;
        Ok(())
    }

    fn mark_imported(&self, record: &ImportRecord) -> Result<(), PersistenceError> {
        lock(&self.inner)?.ledger.record(record.clone());
        Ok(())
    }

    fn imported(&self) -> Result<Ledger, PersistenceError> {
        Ok(lock(&self.inner)?.ledger.clone())
    }
}

struct ScriptInner {
    out: BufWriter<File>,
    ledger: Ledger,
}

/// Appends upsert statements to a SQL script and keeps a JSON import ledger.
///
/// The keyed records of a batch are upserted inside one transaction. Records
/// without an id follow as standalone inserts after the commit, so a `NOT NULL`
/// id column rejects only those rows and never the batch. The script is meant
/// to be applied with `psql -f`.
pub struct ScriptStore {
    settings: StoreSettings,
    ledger_path: PathBuf,
    inner: Mutex<ScriptInner>,
}

impl ScriptStore {
    /// Open (or create) `script` for appending and load the ledger at `ledger_path`.
    pub fn open(script: &Path, ledger_path: &Path, settings: StoreSettings) -> anyhow::Result<Self> {
        ensure_parent_exists(script)?;
        ensure_parent_exists(ledger_path)?;
        let file = OpenOptions::new().create(true).append(true).open(script)
            .with_context(|| format!("Failed to open SQL output {}", script.display()))?;
        let ledger = Ledger::load(ledger_path)
            .with_context(|| format!("Failed to load import ledger {}", ledger_path.display()))?;
        Ok(Self {
            settings,
            ledger_path: ledger_path.to_path_buf(),
            inner: Mutex::new(ScriptInner { out: BufWriter::new(file), ledger }),
        })
    }

    pub fn settings(&self) -> &StoreSettings { &self.settings }
}

impl Store for ScriptStore {
    fn upsert(&self, batch: &[BuildingRecord]) -> Result<(), PersistenceError> {
        if batch.is_empty() {
            return Ok(());
        }
        let (keyed, anonymous): (Vec<_>, Vec<_>) = batch.iter().partition(|r| r.id().is_some());
        let mut inner = lock(&self.inner)?;
        if !keyed.is_empty() {
            writeln!(inner.out, "BEGIN;")?;
            for record in keyed {
                writeln!(inner.out, "{}", sql::upsert_statement(&self.settings, record))?;
            }
            writeln!(inner.out, "COMMIT;")?;
        }
        for record in anonymous {
            writeln!(inner.out, "{}", sql::insert_statement(&self.settings, record))?;
        }
        inner.out.flush()?;
        Ok(())
    }

    fn mark_imported(&self, record: &ImportRecord) -> Result<(), PersistenceError> {
        let mut inner = lock(&self.inner)?;
        writeln!(inner.out, "{}", sql::import_statement(&self.settings, record))?;
        inner.out.flush()?;
        inner.ledger.record(record.clone());
        inner.ledger.save(&self.ledger_path)
    }

    fn imported(&self) -> Result<Ledger, PersistenceError> {
        Ok(lock(&self.inner)?.ledger.clone())
    }
}
