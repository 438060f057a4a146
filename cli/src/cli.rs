use std::path::PathBuf;

use citygml2pg::{FootprintPolicy, Lod, SplitStrategy};

/// CityGML to PostGIS building importer
#[derive(clap::Parser, Debug)]
#[command(name = "citygml2pg", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Extract buildings from CityGML files into a SQL upsert script
    Import(ImportArgs),

    /// Show which input files are new, changed or already imported
    Status(StatusArgs),
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// CityGML file, or directory searched recursively for *.gml (else *.xml)
    #[arg(value_hint = clap::ValueHint::AnyPath)]
    pub base_path: PathBuf,

    /// SRID of the source coordinates, e.g. 25832
    pub srid: u32,

    /// Level of detail, defaults to lod2
    #[arg(default_value = "lod2")]
    pub lod: Lod,

    /// Swap x and y of every coordinate
    #[arg(long)]
    pub swap_axes: bool,

    /// Region tag stored with every building, e.g. a state code
    #[arg(long, default_value = "")]
    pub region: String,

    /// Worker threads, defaults to the number of CPUs
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Buildings per upsert batch
    #[arg(long, default_value_t = citygml2pg::ImportConfig::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Split used when a footprint union fails: "halves" or "head:<n>"
    #[arg(long, default_value = "halves")]
    pub split: SplitStrategy,

    /// On a failed footprint: "empty" records an empty one, "skip-file" aborts the file
    #[arg(long, default_value = "empty")]
    pub on_footprint_failure: FootprintPolicy,

    /// Search LOD geometry before thematic surfaces
    #[arg(long)]
    pub lod_keyed: bool,

    /// JSON file with table and column names
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Output SQL script, defaults to "./import.sql"
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Import ledger, defaults to "./imports.json"
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub ledger: Option<PathBuf>,

    /// Parse and classify only; write nothing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// CityGML file or directory
    #[arg(value_hint = clap::ValueHint::AnyPath)]
    pub base_path: PathBuf,

    /// Import ledger, defaults to "./imports.json"
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub ledger: Option<PathBuf>,
}
