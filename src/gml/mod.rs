//! CityGML geometry extraction: rings, polygons and per-building surfaces.
mod node;
mod polygon;
mod ring;
mod surface;

pub use node::GmlNode;
pub use polygon::{Polygon, assemble_polygon};
pub use ring::{Dimension, Point, Ring, parse_ring};
pub use surface::{
    ClassificationPath, ClassifiedBuilding, ClassifyOptions, SurfaceBucket, SurfaceBuckets, SurfaceKind,
    classify_building, geometry_candidates,
};
