//! Per-file import: parse, classify every building, batch records into a store.

mod ledger;
pub mod sql;
mod store;

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use roxmltree::{Document, ParsingOptions};
use tracing::{debug, error, info, warn};

use crate::common::{decode_input, decode_xml, file_name, relative_key, sha256_hex};
use crate::config::{FootprintPolicy, ImportConfig};
use crate::error::{FootprintError, ImportError, UNKNOWN_ID};
use crate::geom::{Footprint, FootprintBuilder, GeoUnion, UnionEngine};
use crate::gml::{ClassifyOptions, GmlNode, classify_building};
use crate::record::BuildingRecord;

pub use ledger::{ImportRecord, Ledger, LedgerStatus};
pub use store::{MemoryStore, ScriptStore, Store};

/// A file read into memory, with its content hash.
#[derive(Debug, Clone)]
pub struct Source {
    pub path: PathBuf,
    /// Bare file name, stored in building records.
    pub name: String,
    /// Path relative to the input directory, used as the ledger key.
    pub key: String,
    /// Hex SHA-256 of the raw file bytes (before decompression).
    pub sha256: String,
    bytes: Vec<u8>,
}

impl Source {
    pub fn read(base: &Path, path: &Path) -> Result<Self, ImportError> {
        let io_err = |source| ImportError::Io { path: path.to_path_buf(), source };
        let raw = std::fs::read(path).map_err(io_err)?;
        let sha256 = sha256_hex(&raw);
        let bytes = decode_input(path, raw).map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            name: file_name(path),
            key: relative_key(base, path),
            sha256,
            bytes,
        })
    }

    /// Document text, decoded per its byte order mark or XML declaration.
    pub fn text(&self) -> Result<Cow<'_, str>, ImportError> {
        decode_xml(&self.bytes).map_err(|source| ImportError::Io { path: self.path.clone(), source })
    }
}

/// Outcome for one file of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Imported,
    /// Already in the ledger with identical contents.
    Skipped,
    /// Aborted; not marked complete, so a later run retries it.
    Failed(String),
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imported => f.write_str("imported"),
            Self::Skipped => f.write_str("unchanged, skipped"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub file: PathBuf,
    /// Buildings written. For a failed file, those flushed before the failure.
    pub buildings: usize,
    pub status: FileStatus,
}

/// Per-file reports of a multi-file run, in input order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<FileReport>,
}

impl RunSummary {
    /// Total buildings written, including partial counts of failed files.
    pub fn buildings(&self) -> usize {
        self.reports.iter().map(|r| r.buildings).sum()
    }

    pub fn imported(&self) -> usize { self.count(|s| matches!(s, FileStatus::Imported)) }
    pub fn skipped(&self) -> usize { self.count(|s| matches!(s, FileStatus::Skipped)) }
    pub fn failed(&self) -> usize { self.count(|s| matches!(s, FileStatus::Failed(_))) }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.status)).count()
    }
}

/// Turns CityGML documents into building records and feeds them to a store.
#[derive(Debug, Clone)]
pub struct Importer<E = GeoUnion> {
    config: ImportConfig,
    footprints: FootprintBuilder<E>,
}

impl Importer<GeoUnion> {
    pub fn new(config: ImportConfig) -> Self {
        Self::with_engine(config, GeoUnion)
    }
}

impl<E: UnionEngine> Importer<E> {
    pub fn with_engine(config: ImportConfig, engine: E) -> Self {
        let footprints = FootprintBuilder::new(engine, config.split);
        Self { config, footprints }
    }

    #[inline] pub fn config(&self) -> &ImportConfig { &self.config }

    fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            lod: self.config.lod,
            swap_axes: self.config.swap_axes,
            mode: self.config.surface_mode,
        }
    }

    /// Classify one `Building` element and compute its record.
    ///
    /// A failed footprint is handled per `on_footprint_failure`: either the
    /// record carries an empty footprint, or the error is returned.
    pub fn building_record<N: GmlNode>(&self, building: N, file_name: &str) -> Result<BuildingRecord, ImportError> {
        let classified = classify_building(building, &self.classify_options());
        let footprint = match self.footprints.build(&classified.surfaces.ground) {
            Ok(footprint) => footprint,
            Err(err) => self.footprint_failure(classified.id.as_deref(), file_name, err)?,
        };
        Ok(BuildingRecord::new(&classified, &footprint, file_name, self.config.srid, &self.config.region))
    }

    fn footprint_failure(&self, id: Option<&str>, file_name: &str, err: FootprintError) -> Result<Footprint, ImportError> {
        let id = id.unwrap_or(UNKNOWN_ID);
        match self.config.on_footprint_failure {
            FootprintPolicy::EmptyFootprint => {
                warn!(file = file_name, building = id, "{err}; recording empty footprint");
                Ok(Footprint::empty())
            }
            FootprintPolicy::SkipFile => Err(ImportError::Footprint {
                file: file_name.to_string(),
                building: id.to_string(),
                source: err,
            }),
        }
    }

    /// Import every building of one document, flushing to `store` in batches.
    ///
    /// Returns the number of buildings written.
    pub fn import_document(&self, text: &str, file_name: &str, store: &dyn Store) -> Result<usize, ImportError> {
        let mut written = 0;
        self.write_document(text, file_name, store, &mut written)?;
        Ok(written)
    }

    /// `written` only advances once the store has accepted a batch, so on
    /// error it holds the count already persisted.
    fn write_document(&self, text: &str, file_name: &str, store: &dyn Store, written: &mut usize) -> Result<(), ImportError> {
        let opts = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
        let doc = Document::parse_with_options(text, opts)
            .map_err(|source| ImportError::MalformedDocument { file: file_name.to_string(), source })?;

        let threshold = self.config.batch_threshold();
        let mut batch = Vec::with_capacity(threshold.min(4096));

        for building in doc.root().descendants_named("Building") {
            batch.push(self.building_record(building, file_name)?);
            if batch.len() >= threshold {
                store.upsert(&batch)?;
                *written += batch.len();
                debug!(file = file_name, batch = batch.len(), written = *written, "flushed batch");
                batch.clear();
            }
        }

        if !batch.is_empty() {
            store.upsert(&batch)?;
            *written += batch.len();
            debug!(file = file_name, batch = batch.len(), written = *written, "flushed final batch");
        }

        Ok(())
    }

    /// Import a source and mark it complete in the store.
    pub fn import_source(&self, source: &Source, store: &dyn Store) -> Result<usize, ImportError> {
        let mut written = 0;
        self.write_source(source, store, &mut written)?;
        Ok(written)
    }

    fn write_source(&self, source: &Source, store: &dyn Store, written: &mut usize) -> Result<(), ImportError> {
        self.write_document(&source.text()?, &source.name, store, written)?;
        store.mark_imported(&ImportRecord {
            filename: source.key.clone(),
            sha256: source.sha256.clone(),
            count: *written,
            region: self.config.region.clone(),
        })?;
        Ok(())
    }

    /// Read, check against `ledger`, and import one file. Never fails the run.
    fn process_file(&self, base: &Path, path: &Path, store: &dyn Store, ledger: &Ledger, total: &AtomicUsize) -> FileReport {
        let mut buildings = 0;
        let status = match Source::read(base, path) {
            Err(err) => FileStatus::Failed(err.to_string()),
            Ok(source) if ledger.status(&source.key, &source.sha256) == LedgerStatus::Unchanged => {
                debug!(file = %source.key, "already imported, skipping");
                FileStatus::Skipped
            }
            Ok(source) => {
                let result = self.write_source(&source, store, &mut buildings);
                let total = total.fetch_add(buildings, Ordering::Relaxed) + buildings;
                match result {
                    Ok(()) => {
                        info!(file = %source.key, buildings, total, "imported");
                        FileStatus::Imported
                    }
                    Err(err) => FileStatus::Failed(err.to_string()),
                }
            }
        };
        if let FileStatus::Failed(reason) = &status {
            error!(file = %path.display(), buildings, "{reason}");
        }
        FileReport { file: path.to_path_buf(), buildings, status }
    }

    /// Import `files` on a pool of `config.workers` threads.
    ///
    /// Files are tracked in the ledger by their path relative to `base`.
    ///
    /// Each file is processed end to end by one worker. A failing file does not
    /// affect the others.
    pub fn run(&self, base: &Path, files: &[PathBuf], store: &dyn Store) -> anyhow::Result<RunSummary> {
        let ledger = store.imported()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .build()?;

        let total = AtomicUsize::new(0);
        let reports = pool.install(|| {
            files.par_iter()
                .map(|path| self.process_file(base, path, store, &ledger, &total))
                .collect::<Vec<_>>()
        });

        Ok(RunSummary { reports })
    }
}
