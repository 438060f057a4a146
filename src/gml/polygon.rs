use smallvec::SmallVec;
use tracing::warn;

use crate::error::GeometryError;
use crate::gml::{GmlNode, Ring, parse_ring};

/// One outer ring plus zero or more holes.
///
/// The first ring that survived parsing is taken as the exterior. If the
/// source's real exterior was degenerate and dropped, a hole becomes the shell;
/// this mirrors the input data and is not corrected here.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    rings: SmallVec<[Ring; 1]>,
}

impl Polygon {
    /// Build a polygon from rings in document order. `None` if `rings` is empty.
    pub fn from_rings(rings: impl IntoIterator<Item = Ring>) -> Option<Self> {
        let rings: SmallVec<[Ring; 1]> = rings.into_iter().collect();
        if rings.is_empty() { None } else { Some(Self { rings }) }
    }

    #[inline] pub fn rings(&self) -> &[Ring] { &self.rings }
    #[inline] pub fn exterior(&self) -> &Ring { &self.rings[0] }
    #[inline] pub fn interiors(&self) -> &[Ring] { &self.rings[1..] }

    /// Project onto the XY plane as a `geo` polygon.
    pub fn to_geo(&self) -> geo::Polygon<f64> {
        geo::Polygon::new(
            self.exterior().to_line_string(),
            self.interiors().iter().map(Ring::to_line_string).collect(),
        )
    }
}

/// Assemble one `Polygon` element from its `LinearRing` descendants.
///
/// Degenerate rings are logged and skipped; the polygon itself is degenerate
/// only when none of its rings survive.
pub fn assemble_polygon<N: GmlNode>(poly: N, inherited: Option<u8>, swap_axes: bool) -> Result<Polygon, GeometryError> {
    let dim = poly.srs_dimension().or(inherited);

    let rings = poly.descendants_named("LinearRing")
        .filter_map(|ring| match parse_ring(ring, dim, swap_axes) {
            Ok(ring) => Some(ring),
            Err(err) => {
                warn!(element = err.element_id(), "{err}");
                None
            }
        });

    Polygon::from_rings(rings).ok_or_else(|| GeometryError::polygon(poly.gml_id()))
}
