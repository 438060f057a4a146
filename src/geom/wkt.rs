//! SRID-tagged multi-polygon text (EWKT) as consumed by PostGIS.
//!
//! Surface buckets are written with one dimensionality for the whole value;
//! footprints are 2D. Ordinates use Rust's shortest round-trip float formatting.

use std::fmt;

use geo::{LineString, MultiPolygon};
use tracing::warn;

use crate::gml::{Dimension, Polygon, Ring};

/// Empty 3D value used for surface buckets without polygons.
pub const EMPTY_MULTIPOLYGON_Z: &str = "MULTIPOLYGONZ EMPTY";
/// Empty 2D value used for empty footprints.
pub const EMPTY_MULTIPOLYGON: &str = "MULTIPOLYGON EMPTY";

/// Ring list of a surface bucket. With `has_z`, 2D points get `z = 0`.
struct SurfaceRings<'a> {
    polygons: &'a [Polygon],
    has_z: bool,
}

impl SurfaceRings<'_> {
    fn write_ring(&self, f: &mut fmt::Formatter<'_>, ring: &Ring) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in ring.points().iter().enumerate() {
            if i > 0 { f.write_str(",")?; }
            if self.has_z {
                write!(f, "{} {} {}", p.x, p.y, p.z.unwrap_or(0.0))?;
            } else {
                write!(f, "{} {}", p.x, p.y)?;
            }
        }
        f.write_str(")")
    }
}

impl fmt::Display for SurfaceRings<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, poly) in self.polygons.iter().enumerate() {
            if i > 0 { f.write_str(",")?; }
            f.write_str("(")?;
            for (j, ring) in poly.rings().iter().enumerate() {
                if j > 0 { f.write_str(",")?; }
                self.write_ring(f, ring)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

struct FootprintRings<'a>(&'a MultiPolygon<f64>);

fn write_line_string(f: &mut fmt::Formatter<'_>, ls: &LineString<f64>) -> fmt::Result {
    f.write_str("(")?;
    for (i, c) in ls.0.iter().enumerate() {
        if i > 0 { f.write_str(",")?; }
        write!(f, "{} {}", c.x, c.y)?;
    }
    f.write_str(")")
}

impl fmt::Display for FootprintRings<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, poly) in self.0.0.iter().enumerate() {
            if i > 0 { f.write_str(",")?; }
            f.write_str("(")?;
            write_line_string(f, poly.exterior())?;
            for hole in poly.interiors() {
                f.write_str(",")?;
                write_line_string(f, hole)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// `SRID=<srid>; MULTIPOLYGON(((x y z,...),(...)),...)`, or the empty 3D form.
///
/// The value is 3D as soon as one ring is; 2D rings in such a bucket are
/// padded with `z = 0`.
pub fn surface_ewkt(srid: u32, polygons: &[Polygon]) -> String {
    if polygons.is_empty() {
        return format!("SRID={srid}; {EMPTY_MULTIPOLYGON_Z}");
    }
    let dims = || polygons.iter().flat_map(Polygon::rings).map(Ring::dim);
    let has_z = dims().any(|d| d == Dimension::Xyz);
    if has_z && dims().any(|d| d == Dimension::Xy) {
        warn!(polygons = polygons.len(), "mixed 2D and 3D rings in one surface; padding 2D points with z=0");
    }
    format!("SRID={srid}; MULTIPOLYGON({})", SurfaceRings { polygons, has_z })
}

/// `SRID=<srid>; MULTIPOLYGON(((x y,...)))`, or `MULTIPOLYGON EMPTY`.
pub fn footprint_ewkt(srid: u32, footprint: &MultiPolygon<f64>) -> String {
    if footprint.0.is_empty() {
        return format!("SRID={srid}; {EMPTY_MULTIPOLYGON}");
    }
    format!("SRID={srid}; MULTIPOLYGON({})", FootprintRings(footprint))
}
