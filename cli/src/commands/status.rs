use std::path::PathBuf;

use anyhow::{Context, Result};
use citygml2pg::{Ledger, LedgerStatus, find_input_files, relative_key, sha256_file};

use super::DEFAULT_LEDGER;
use crate::cli::StatusArgs;

pub fn run(cli: &crate::cli::Cli, args: &StatusArgs) -> Result<()> {
    let ledger_path = args.ledger.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER));
    let ledger = Ledger::load(&ledger_path)
        .with_context(|| format!("Failed to load import ledger {}", ledger_path.display()))?;

    let (mut new, mut changed, mut unchanged) = (0, 0, 0);
    for path in find_input_files(&args.base_path)? {
        let key = relative_key(&args.base_path, &path);
        let status = ledger.status(&key, &sha256_file(&path)?);
        let label = match status {
            LedgerStatus::New => { new += 1; "new" }
            LedgerStatus::Changed => { changed += 1; "changed" }
            LedgerStatus::Unchanged => { unchanged += 1; "imported" }
        };
        if cli.verbose > 0 || status != LedgerStatus::Unchanged {
            println!("{label:>8}  {}", path.display());
        }
    }

    println!("{new} new, {changed} changed, {unchanged} imported ({} in ledger)", ledger.len());
    Ok(())
}
