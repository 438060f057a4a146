use std::path::PathBuf;

use anyhow::{Result, bail};
use citygml2pg::{
    FileStatus, ImportConfig, Importer, Ledger, MemoryStore, RunSummary, ScriptStore, Store, StoreSettings,
    SurfaceMode, find_input_files,
};
use tracing::{info, warn};

use super::{DEFAULT_LEDGER, DEFAULT_SCRIPT};
use crate::cli::ImportArgs;

fn import_config(args: &ImportArgs) -> ImportConfig {
    let mut config = ImportConfig::new(args.srid, args.lod);
    config.swap_axes = args.swap_axes;
    config.region = args.region.clone();
    config.batch_size = args.batch_size;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.split = args.split;
    config.on_footprint_failure = args.on_footprint_failure;
    if args.lod_keyed {
        config.surface_mode = SurfaceMode::LodKeyed;
    }
    config
}

pub fn run(cli: &crate::cli::Cli, args: &ImportArgs) -> Result<()> {
    let settings = StoreSettings::load_or_default(args.config.as_deref())?;
    let script = args.output.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT));
    let ledger_path = args.ledger.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER));

    let files = find_input_files(&args.base_path)?;
    if files.is_empty() {
        warn!(path = %args.base_path.display(), "no CityGML files found");
        return Ok(());
    }

    let config = import_config(args);
    info!(
        files = files.len(),
        lod = %config.lod,
        srid = config.srid,
        workers = config.workers,
        batch_size = config.batch_size,
        "starting import"
    );

    let importer = Importer::new(config);
    let store: Box<dyn Store> = if args.dry_run {
        Box::new(MemoryStore::with_ledger(Ledger::load(&ledger_path)?))
    } else {
        Box::new(ScriptStore::open(&script, &ledger_path, settings)?)
    };

    let summary = importer.run(&args.base_path, &files, store.as_ref())?;
    report(cli, &summary);

    if summary.failed() > 0 {
        bail!("{} of {} files failed", summary.failed(), summary.reports.len());
    }
    if !args.dry_run {
        info!(script = %script.display(), ledger = %ledger_path.display(), "done");
    }
    Ok(())
}

fn report(cli: &crate::cli::Cli, summary: &RunSummary) {
    if cli.verbose > 0 {
        for r in &summary.reports {
            eprintln!("[import] {}: {} ({} buildings)", r.file.display(), r.status, r.buildings);
        }
    } else {
        for r in &summary.reports {
            if let FileStatus::Failed(reason) = &r.status {
                eprintln!("[import] {}: {reason}", r.file.display());
            }
        }
    }
    eprintln!(
        "[import] {} buildings from {} files ({} skipped, {} failed)",
        summary.buildings(),
        summary.imported(),
        summary.skipped(),
        summary.failed(),
    );
}
