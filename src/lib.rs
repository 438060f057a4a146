#![doc = "citygml2pg: CityGML building geometry extraction and footprint computation"]
mod common;
mod config;
mod error;
mod geom;
mod gml;
mod import;
mod record;

#[doc(inline)]
pub use common::{decode_xml, find_input_files, relative_key, require_dir_exists, sha256_file};

#[doc(inline)]
pub use config::{Columns, FootprintPolicy, ImportConfig, Lod, StoreSettings, SurfaceMode};

#[doc(inline)]
pub use error::{FootprintError, GeometryError, ImportError, PersistenceError, TopologyError};

#[doc(inline)]
pub use geom::{Footprint, FootprintBuilder, GeoUnion, SplitStrategy, UnionEngine, wkt};

#[doc(inline)]
pub use gml::{
    ClassificationPath, ClassifiedBuilding, ClassifyOptions, Dimension, GmlNode, Point, Polygon, Ring,
    SurfaceBucket, SurfaceBuckets, SurfaceKind, assemble_polygon, classify_building, geometry_candidates, parse_ring,
};

#[doc(inline)]
pub use import::{
    FileReport, FileStatus, ImportRecord, Importer, Ledger, LedgerStatus, MemoryStore, RunSummary, ScriptStore,
    Source, Store, sql,
};

#[doc(inline)]
pub use record::BuildingRecord;
