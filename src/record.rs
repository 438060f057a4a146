use crate::geom::{Footprint, wkt};
use crate::gml::ClassifiedBuilding;

/// One building, ready to be handed to a store.
///
/// All geometry fields are SRID-tagged multi-polygon text; empty buckets use
/// the explicit empty form so every record has the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingRecord {
    id: Option<String>,
    filename: String,
    wall: String,
    roof: String,
    ground: String,
    unclassified: String,
    footprint: String,
    region: String,
}

impl BuildingRecord {
    /// Serialize a classified building and its footprint.
    pub fn new(building: &ClassifiedBuilding, footprint: &Footprint, filename: &str, srid: u32, region: &str) -> Self {
        let surfaces = &building.surfaces;
        Self {
            id: building.id.clone(),
            filename: filename.to_string(),
            wall: wkt::surface_ewkt(srid, surfaces.wall.polygons()),
            roof: wkt::surface_ewkt(srid, surfaces.roof.polygons()),
            ground: wkt::surface_ewkt(srid, surfaces.ground.polygons()),
            unclassified: wkt::surface_ewkt(srid, surfaces.unclassified.polygons()),
            footprint: wkt::footprint_ewkt(srid, footprint.polygons()),
            region: region.to_string(),
        }
    }

    /// Building `gml:id`. `None` when the element had none; never synthesized.
    #[inline] pub fn id(&self) -> Option<&str> { self.id.as_deref() }
    /// Name of the source file.
    #[inline] pub fn filename(&self) -> &str { &self.filename }
    #[inline] pub fn wall(&self) -> &str { &self.wall }
    #[inline] pub fn roof(&self) -> &str { &self.roof }
    #[inline] pub fn ground(&self) -> &str { &self.ground }
    #[inline] pub fn unclassified(&self) -> &str { &self.unclassified }
    #[inline] pub fn footprint(&self) -> &str { &self.footprint }
    #[inline] pub fn region(&self) -> &str { &self.region }
}
