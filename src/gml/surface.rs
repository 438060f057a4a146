use std::fmt;

use tracing::{debug, warn};

use crate::config::{Lod, SurfaceMode};
use crate::gml::{GmlNode, Polygon, assemble_polygon};

/// Thematic class of a building boundary surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Wall,
    Roof,
    Ground,
    /// Polygons from LOD geometry that carries no thematic label.
    Unclassified,
}

impl SurfaceKind {
    /// The three thematic kinds, in the order they are scanned.
    pub const TYPED: [SurfaceKind; 3] = [SurfaceKind::Wall, SurfaceKind::Roof, SurfaceKind::Ground];

    /// Local name of the CityGML boundary-surface element, if any.
    #[inline]
    pub fn element_name(self) -> Option<&'static str> {
        match self {
            Self::Wall => Some("WallSurface"),
            Self::Roof => Some("RoofSurface"),
            Self::Ground => Some("GroundSurface"),
            Self::Unclassified => None,
        }
    }
}

/// Polygons of one building belonging to one surface kind, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceBucket {
    kind: SurfaceKind,
    polygons: Vec<Polygon>,
}

impl SurfaceBucket {
    #[inline] pub fn new(kind: SurfaceKind) -> Self { Self { kind, polygons: Vec::new() } }
    #[inline] pub fn kind(&self) -> SurfaceKind { self.kind }
    #[inline] pub fn polygons(&self) -> &[Polygon] { &self.polygons }
    #[inline] pub fn len(&self) -> usize { self.polygons.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.polygons.is_empty() }

    #[inline]
    pub fn with_polygons(kind: SurfaceKind, polygons: Vec<Polygon>) -> Self {
        Self { kind, polygons }
    }
}

/// All surface buckets of one building.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceBuckets {
    pub wall: SurfaceBucket,
    pub roof: SurfaceBucket,
    pub ground: SurfaceBucket,
    pub unclassified: SurfaceBucket,
}

impl Default for SurfaceBuckets {
    fn default() -> Self {
        Self {
            wall: SurfaceBucket::new(SurfaceKind::Wall),
            roof: SurfaceBucket::new(SurfaceKind::Roof),
            ground: SurfaceBucket::new(SurfaceKind::Ground),
            unclassified: SurfaceBucket::new(SurfaceKind::Unclassified),
        }
    }
}

impl SurfaceBuckets {
    /// Total number of polygons across all buckets.
    pub fn polygon_count(&self) -> usize {
        self.wall.len() + self.roof.len() + self.ground.len() + self.unclassified.len()
    }
}

/// Which encoding produced a building's surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationPath {
    /// Thematic `WallSurface`/`RoofSurface`/`GroundSurface` boundaries.
    Typed,
    /// LOD geometry (`lodXSolid`, `lodXMultiSurface`, ...) without labels.
    LodKeyed,
    /// Last resort: bare `WallSurface`/`RoofSurface` scan after the LOD search found nothing.
    Fallback,
    /// Nothing usable found.
    Empty,
}

impl fmt::Display for ClassificationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Typed => "typed",
            Self::LodKeyed => "lod-keyed",
            Self::Fallback => "fallback",
            Self::Empty => "empty",
        })
    }
}

/// Result of classifying one `Building` element.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedBuilding {
    pub id: Option<String>,
    pub surfaces: SurfaceBuckets,
    pub path: ClassificationPath,
    /// Polygons dropped as degenerate while classifying.
    pub dropped: usize,
}

/// Options that stay fixed for every building of a run.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyOptions {
    pub lod: Lod,
    pub swap_axes: bool,
    pub mode: SurfaceMode,
}

/// Candidate geometry element names for `lod`, in search order.
pub fn geometry_candidates(lod: Lod) -> [String; 4] {
    let prefix = lod.prefix();
    [
        format!("{prefix}Solid"),
        format!("{prefix}MultiSurface"),
        format!("{prefix}CompositeSurface"),
        // Provider alias seen in Mecklenburg-Vorpommern exports.
        format!("BuildingGeometry3DLoD{}", lod.level()),
    ]
}

/// Polygons collected from one scan, plus the number of degenerate polygons dropped.
#[derive(Default)]
struct Collected {
    polygons: Vec<Polygon>,
    dropped: usize,
}

impl Collected {
    fn extend(&mut self, other: Collected) {
        self.polygons.extend(other.polygons);
        self.dropped += other.dropped;
    }
}

/// Assemble every `Polygon` below each `container`-named element under `building`.
fn collect_polygons<N: GmlNode>(building: N, container: &str, swap_axes: bool) -> Collected {
    let mut out = Collected::default();
    for geom in building.descendants_named(container) {
        let dim = geom.srs_dimension();
        for poly in geom.descendants_named("Polygon") {
            match assemble_polygon(poly, dim, swap_axes) {
                Ok(polygon) => out.polygons.push(polygon),
                Err(err) => {
                    warn!(element = err.element_id(), "{err}");
                    out.dropped += 1;
                }
            }
        }
    }
    out
}

/// Classify the surfaces of one `Building` element into buckets.
///
/// In [`SurfaceMode::Typed`], thematic boundary surfaces win whenever any of
/// them yields a polygon. Otherwise LOD geometry fills the unclassified bucket.
/// Only when that is empty too are `WallSurface`/`RoofSurface` scanned as a
/// last resort, leaving Ground empty.
pub fn classify_building<N: GmlNode>(building: N, opts: &ClassifyOptions) -> ClassifiedBuilding {
    let id = building.gml_id().map(str::to_string);
    let mut surfaces = SurfaceBuckets::default();
    let mut dropped = 0;

    let path = 'path: {
        if opts.mode == SurfaceMode::Typed {
            let [wall, roof, ground] = SurfaceKind::TYPED.map(|kind| {
                collect_polygons(building, kind.element_name().unwrap_or_default(), opts.swap_axes)
            });
            dropped += wall.dropped + roof.dropped + ground.dropped;
            if !(wall.polygons.is_empty() && roof.polygons.is_empty() && ground.polygons.is_empty()) {
                surfaces.wall = SurfaceBucket::with_polygons(SurfaceKind::Wall, wall.polygons);
                surfaces.roof = SurfaceBucket::with_polygons(SurfaceKind::Roof, roof.polygons);
                surfaces.ground = SurfaceBucket::with_polygons(SurfaceKind::Ground, ground.polygons);
                break 'path ClassificationPath::Typed;
            }
        }

        let mut primary = Collected::default();
        for candidate in geometry_candidates(opts.lod) {
            primary.extend(collect_polygons(building, &candidate, opts.swap_axes));
        }
        dropped += primary.dropped;
        if !primary.polygons.is_empty() {
            surfaces.unclassified = SurfaceBucket::with_polygons(SurfaceKind::Unclassified, primary.polygons);
            break 'path ClassificationPath::LodKeyed;
        }

        // Typed mode already scanned these and found nothing.
        if opts.mode == SurfaceMode::Typed {
            break 'path ClassificationPath::Empty;
        }

        let wall = collect_polygons(building, "WallSurface", opts.swap_axes);
        let roof = collect_polygons(building, "RoofSurface", opts.swap_axes);
        dropped += wall.dropped + roof.dropped;
        if wall.polygons.is_empty() && roof.polygons.is_empty() {
            break 'path ClassificationPath::Empty;
        }
        surfaces.wall = SurfaceBucket::with_polygons(SurfaceKind::Wall, wall.polygons);
        surfaces.roof = SurfaceBucket::with_polygons(SurfaceKind::Roof, roof.polygons);
        ClassificationPath::Fallback
    };

    debug!(building = id.as_deref().unwrap_or("-"), %path, polygons = surfaces.polygon_count(), dropped, "classified");

    ClassifiedBuilding { id, surfaces, path, dropped }
}
