mod footprint;
pub mod wkt;

pub use footprint::{Footprint, FootprintBuilder, GeoUnion, SplitStrategy, UnionEngine};
