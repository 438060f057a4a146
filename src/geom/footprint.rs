use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use geo::{BooleanOps, MultiPolygon, Polygon, Validation};
use tracing::{debug, error, warn};

use crate::error::{FootprintError, TopologyError};
use crate::gml::SurfaceBucket;

/// Polygon union backend.
///
/// Implementations report numerically unstable overlays as [`TopologyError`]
/// instead of panicking, so the footprint builder can retry on smaller inputs.
pub trait UnionEngine: Sync {
    /// Union of all `polygons`.
    fn union(&self, polygons: &[Polygon<f64>]) -> Result<MultiPolygon<f64>, TopologyError>;

    /// Union of two partial results.
    fn merge(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, TopologyError>;
}

/// Union backed by `geo`'s boolean operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoUnion;

impl UnionEngine for GeoUnion {
    fn union(&self, polygons: &[Polygon<f64>]) -> Result<MultiPolygon<f64>, TopologyError> {
        guarded(|| geo::unary_union(polygons))
    }

    fn merge(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, TopologyError> {
        guarded(|| a.union(b))
    }
}

/// Run an overlay, turning a panic inside the sweep into a [`TopologyError`].
fn guarded<T>(op: impl FnOnce() -> T) -> Result<T, TopologyError> {
    panic::catch_unwind(AssertUnwindSafe(op)).map_err(|payload| TopologyError(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "boolean overlay panicked".to_string()
    }
}

/// Where to cut the polygon list when the direct union fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitStrategy {
    /// Two halves of (nearly) equal size.
    #[default]
    Halves,
    /// The first `n` polygons, then the rest.
    Head(usize),
}

impl SplitStrategy {
    /// Split index for `len` polygons. `None` if one side would be empty.
    pub fn split_index(self, len: usize) -> Option<usize> {
        let at = match self {
            Self::Halves => len / 2,
            Self::Head(n) => n,
        };
        (at > 0 && at < len).then_some(at)
    }
}

impl std::str::FromStr for SplitStrategy {
    type Err = anyhow::Error;

    /// `"halves"` or `"head:<n>"`.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s == "halves" {
            return Ok(Self::Halves);
        }
        match s.strip_prefix("head:").map(str::parse::<usize>) {
            Some(Ok(n)) if n > 0 => Ok(Self::Head(n)),
            _ => anyhow::bail!("invalid split strategy {s:?}, expected \"halves\" or \"head:<n>\""),
        }
    }
}

/// The 2D ground outline of a building. Always a multi-polygon, possibly empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint(MultiPolygon<f64>);

impl Default for Footprint {
    fn default() -> Self { Self::empty() }
}

impl Footprint {
    #[inline] pub fn empty() -> Self { Self(MultiPolygon(Vec::new())) }
    #[inline] pub fn polygons(&self) -> &MultiPolygon<f64> { &self.0 }
    #[inline] pub fn is_empty(&self) -> bool { self.0.0.is_empty() }
    #[inline] pub fn into_inner(self) -> MultiPolygon<f64> { self.0 }
}

/// Computes building footprints from Ground surfaces.
#[derive(Debug, Clone, Default)]
pub struct FootprintBuilder<E = GeoUnion> {
    engine: E,
    split: SplitStrategy,
}

impl<E: UnionEngine> FootprintBuilder<E> {
    pub fn new(engine: E, split: SplitStrategy) -> Self {
        Self { engine, split }
    }

    /// Project the Ground bucket to 2D, drop invalid polygons and union the rest.
    pub fn build(&self, ground: &SurfaceBucket) -> Result<Footprint, FootprintError> {
        let polygons = ground.polygons().iter()
            .map(|p| p.to_geo())
            .filter(|p| {
                let valid = p.is_valid();
                if !valid {
                    debug!(exterior_points = p.exterior().0.len(), "skipping invalid ground polygon");
                }
                valid
            })
            .collect::<Vec<_>>();

        self.union_all(polygons).map(Footprint)
    }

    /// Union `polygons`, retrying once on two independently unioned parts.
    pub fn union_all(&self, mut polygons: Vec<Polygon<f64>>) -> Result<MultiPolygon<f64>, FootprintError> {
        match polygons.len() {
            0 => return Ok(MultiPolygon(Vec::new())),
            // A single polygon is its own union.
            1 => return Ok(MultiPolygon(polygons.split_off(0))),
            _ => {}
        }

        let fault = match self.engine.union(&polygons) {
            Ok(union) => return Ok(union),
            Err(fault) => fault,
        };

        let failed = |reason: String| FootprintError::ComputationFailed { polygons: polygons.len(), reason };

        let Some(at) = self.split.split_index(polygons.len()) else {
            error!(polygons = polygons.len(), "{fault}; no split possible");
            return Err(failed(fault.to_string()));
        };
        warn!(polygons = polygons.len(), split_at = at, "{fault}; retrying union in two parts");

        let (head, tail) = polygons.split_at(at);
        let merged = self.engine.union(head)
            .and_then(|a| Ok((a, self.engine.union(tail)?)))
            .and_then(|(a, b)| self.engine.merge(&a, &b));

        merged.map_err(|retry| {
            error!(polygons = polygons.len(), "split union failed: {retry}");
            failed(format!("{fault}; after split: {retry}"))
        })
    }
}
