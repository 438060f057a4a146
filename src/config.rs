use std::{fmt, fs, path::Path, str::FromStr};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::geom::SplitStrategy;

/// CityGML level of detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lod {
    Lod1,
    #[default]
    Lod2,
    Lod3,
    Lod4,
}

impl Lod {
    pub const ALL: [Lod; 4] = [Lod::Lod1, Lod::Lod2, Lod::Lod3, Lod::Lod4];

    /// Numeric level, 1 through 4.
    #[inline]
    pub fn level(self) -> u8 {
        match self {
            Self::Lod1 => 1,
            Self::Lod2 => 2,
            Self::Lod3 => 3,
            Self::Lod4 => 4,
        }
    }

    /// Element-name prefix, e.g. `"lod2"` in `lod2Solid`.
    #[inline]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Lod1 => "lod1",
            Self::Lod2 => "lod2",
            Self::Lod3 => "lod3",
            Self::Lod4 => "lod4",
        }
    }
}

impl fmt::Display for Lod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for Lod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Lod::ALL.into_iter()
            .find(|lod| lod.prefix() == lower)
            .with_context(|| format!("invalid level of detail {s:?}, expected one of lod1, lod2, lod3, lod4"))
    }
}

/// How building surfaces are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceMode {
    /// Thematic boundary surfaces first, LOD geometry otherwise.
    #[default]
    Typed,
    /// LOD geometry only, with the Wall/Roof scan as last resort.
    LodKeyed,
}

/// What to do with a building whose footprint union fails even after splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FootprintPolicy {
    /// Record an empty footprint and keep going.
    #[default]
    EmptyFootprint,
    /// Abort the file; it is not marked complete and will be retried.
    SkipFile,
}

impl FromStr for FootprintPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "empty" => Ok(Self::EmptyFootprint),
            "skip-file" => Ok(Self::SkipFile),
            other => bail!("invalid footprint policy {other:?}, expected \"empty\" or \"skip-file\""),
        }
    }
}

/// Parameters of one import run. Immutable once the run starts.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub lod: Lod,
    /// SRID the source coordinates are tagged with.
    pub srid: u32,
    pub swap_axes: bool,
    /// Caller-supplied region tag stored with every record (e.g. a state code).
    pub region: String,
    /// Records buffered before each write to the store.
    pub batch_size: usize,
    /// Size of the worker pool.
    pub workers: usize,
    pub split: SplitStrategy,
    pub on_footprint_failure: FootprintPolicy,
    pub surface_mode: SurfaceMode,
}

impl ImportConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 1000;

    pub fn new(srid: u32, lod: Lod) -> Self {
        Self {
            lod,
            srid,
            swap_axes: false,
            region: String::new(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            split: SplitStrategy::default(),
            on_footprint_failure: FootprintPolicy::default(),
            surface_mode: SurfaceMode::default(),
        }
    }

    /// Batch threshold, never zero.
    #[inline]
    pub fn batch_threshold(&self) -> usize { self.batch_size.max(1) }
}

/// Column names of the building table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Columns {
    pub id: String,
    pub filename: String,
    pub roof: String,
    pub wall: String,
    pub ground: String,
    pub footprint: String,
    /// Column for polygons from unlabelled LOD geometry. Not written when unset.
    pub unclassified: Option<String>,
    pub region: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            id: "id".into(),
            filename: "filename".into(),
            roof: "roof".into(),
            wall: "wall".into(),
            ground: "ground".into(),
            footprint: "footprint".into(),
            unclassified: None,
            region: "bl".into(),
        }
    }
}

/// Target table layout for SQL output, read from a JSON settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    pub table: String,
    pub imports_table: String,
    /// SRID geometries are transformed to on insert.
    pub target_srs: u32,
    pub columns: Columns,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            table: "buildings".into(),
            imports_table: "imports".into(),
            target_srs: 4326,
            columns: Columns::default(),
        }
    }
}

impl StoreSettings {
    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Load from `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}
