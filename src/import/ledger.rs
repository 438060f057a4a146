use std::{collections::BTreeMap, fs, io::Write, path::Path};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::PersistenceError;

/// Completion record for one imported file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub filename: String,
    /// Hex SHA-256 of the file as read from disk.
    pub sha256: String,
    /// Buildings written for this file.
    pub count: usize,
    pub region: String,
}

/// How a file relates to what the ledger already knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    /// Never imported.
    New,
    /// Imported with identical contents; skip.
    Unchanged,
    /// Imported before, but the contents differ; import again.
    Changed,
}

/// Bookkeeping of completed imports, keyed by file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    version: u32,
    imports: BTreeMap<String, ImportRecord>,
}

impl Default for Ledger {
    fn default() -> Self { Self::new() }
}

impl Ledger {
    const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self { version: Self::VERSION, imports: BTreeMap::new() }
    }

    /// Read a ledger file. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Write the ledger atomically: a temp file in the same directory, then rename.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, self)?;
        tmp.write_all(b"\n")?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Insert or replace the record for `record.filename`.
    pub fn record(&mut self, record: ImportRecord) {
        self.imports.insert(record.filename.clone(), record);
    }

    #[inline] pub fn get(&self, filename: &str) -> Option<&ImportRecord> { self.imports.get(filename) }
    #[inline] pub fn len(&self) -> usize { self.imports.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.imports.is_empty() }
    #[inline] pub fn records(&self) -> impl Iterator<Item = &ImportRecord> { self.imports.values() }

    /// Classify a file by name and content hash.
    pub fn status(&self, filename: &str, sha256: &str) -> LedgerStatus {
        match self.imports.get(filename) {
            None => LedgerStatus::New,
            Some(rec) if rec.sha256 == sha256 => LedgerStatus::Unchanged,
            Some(_) => LedgerStatus::Changed,
        }
    }
}
