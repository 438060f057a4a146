//! SQL text for PostGIS upserts.
//!
//! Table and column names come from trusted settings and are emitted as-is so
//! schema-qualified names keep working. Values are always quoted literals.

use crate::config::StoreSettings;
use crate::import::ImportRecord;
use crate::record::BuildingRecord;

/// Quote a string as a SQL literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn transformed(ewkt: &str, target_srs: u32) -> String {
    format!("ST_Transform({}::geometry, {target_srs})", quote_literal(ewkt))
}

type Field<'a> = (&'a str, String);

/// Column/value pairs of one building row.
struct Row<'a> {
    id: Field<'a>,
    filename: Field<'a>,
    geometry: Vec<Field<'a>>,
    region: Field<'a>,
}

impl<'a> Row<'a> {
    fn new(settings: &'a StoreSettings, record: &BuildingRecord) -> Self {
        let c = &settings.columns;
        let srs = settings.target_srs;
        let mut geometry = vec![
            (c.roof.as_str(), transformed(record.roof(), srs)),
            (c.wall.as_str(), transformed(record.wall(), srs)),
            (c.ground.as_str(), transformed(record.ground(), srs)),
            (c.footprint.as_str(), transformed(record.footprint(), srs)),
        ];
        if let Some(col) = c.unclassified.as_deref() {
            geometry.push((col, transformed(record.unclassified(), srs)));
        }
        Self {
            id: (c.id.as_str(), record.id().map_or_else(|| "NULL".to_string(), quote_literal)),
            filename: (c.filename.as_str(), quote_literal(record.filename())),
            geometry,
            region: (c.region.as_str(), quote_literal(record.region())),
        }
    }

    /// Insert order: id, file name, geometry columns, region.
    fn fields(&self) -> impl Iterator<Item = &Field<'a>> {
        [&self.id, &self.filename].into_iter()
            .chain(&self.geometry)
            .chain([&self.region])
    }

    fn insert(&self, table: &str) -> String {
        let columns: Vec<&str> = self.fields().map(|(col, _)| *col).collect();
        let values: Vec<&str> = self.fields().map(|(_, value)| value.as_str()).collect();
        format!("INSERT INTO {table} ({}) VALUES ({})", columns.join(", "), values.join(", "))
    }

    /// Conflict updates: geometry columns, then file name and region.
    fn updates(&self) -> String {
        self.geometry.iter()
            .chain([&self.filename, &self.region])
            .map(|(col, _)| format!("{col}=EXCLUDED.{col}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `INSERT ... ON CONFLICT (id) DO UPDATE` for one building.
///
/// A conflicting id overwrites every geometry column, the file name and the
/// region tag. Records without an id insert a `NULL` key.
pub fn upsert_statement(settings: &StoreSettings, record: &BuildingRecord) -> String {
    let row = Row::new(settings, record);
    format!("{} ON CONFLICT ({}) DO UPDATE SET {};", row.insert(&settings.table), row.id.0, row.updates())
}

/// Plain `INSERT` for one building, used for records without an id.
pub fn insert_statement(settings: &StoreSettings, record: &BuildingRecord) -> String {
    format!("{};", Row::new(settings, record).insert(&settings.table))
}

/// Completion row for one imported file.
pub fn import_statement(settings: &StoreSettings, record: &ImportRecord) -> String {
    format!(
        "INSERT INTO {} (filename, sha256, count, region) VALUES ({}, {}, {}, {});",
        settings.imports_table,
        quote_literal(&record.filename),
        quote_literal(&record.sha256),
        record.count,
        quote_literal(&record.region),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Footprint;
    use crate::gml::{ClassificationPath, ClassifiedBuilding, SurfaceBuckets};

    fn record(id: Option<&str>) -> BuildingRecord {
        let building = ClassifiedBuilding {
            id: id.map(str::to_string),
            surfaces: SurfaceBuckets::default(),
            path: ClassificationPath::Empty,
            dropped: 0,
        };
        BuildingRecord::new(&building, &Footprint::empty(), "o'neil.gml", 25832, "BY")
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(""), "''");
    }

    #[test]
    fn upsert_overwrites_on_conflict() {
        let sql = upsert_statement(&StoreSettings::default(), &record(Some("DEBY_1")));
        assert!(sql.starts_with("INSERT INTO buildings (id, filename, roof, wall, ground, footprint, bl) VALUES ('DEBY_1', 'o''neil.gml', "));
        assert!(sql.contains("ST_Transform('SRID=25832; MULTIPOLYGONZ EMPTY'::geometry, 4326)"));
        assert!(sql.contains("ST_Transform('SRID=25832; MULTIPOLYGON EMPTY'::geometry, 4326), 'BY')"));
        assert!(sql.ends_with(
            "ON CONFLICT (id) DO UPDATE SET roof=EXCLUDED.roof, wall=EXCLUDED.wall, ground=EXCLUDED.ground, \
             footprint=EXCLUDED.footprint, filename=EXCLUDED.filename, bl=EXCLUDED.bl;"
        ));
    }

    #[test]
    fn unclassified_column_when_configured() {
        let mut settings = StoreSettings::default();
        settings.columns.unclassified = Some("geometry".into());
        let sql = upsert_statement(&settings, &record(Some("DEBY_1")));
        assert!(sql.starts_with("INSERT INTO buildings (id, filename, roof, wall, ground, footprint, geometry, bl) VALUES "));
        assert!(sql.ends_with(
            "ON CONFLICT (id) DO UPDATE SET roof=EXCLUDED.roof, wall=EXCLUDED.wall, ground=EXCLUDED.ground, \
             footprint=EXCLUDED.footprint, geometry=EXCLUDED.geometry, filename=EXCLUDED.filename, bl=EXCLUDED.bl;"
        ));
    }

    #[test]
    fn missing_id_is_null() {
        let settings = StoreSettings::default();
        assert!(upsert_statement(&settings, &record(None)).contains("VALUES (NULL, "));

        let plain = insert_statement(&settings, &record(None));
        assert!(plain.starts_with("INSERT INTO buildings (id, filename, "));
        assert!(plain.contains("VALUES (NULL, "));
        assert!(!plain.contains("ON CONFLICT"));
    }

    #[test]
    fn import_row() {
        let rec = ImportRecord { filename: "a.gml".into(), sha256: "ff".into(), count: 12, region: "".into() };
        assert_eq!(
            import_statement(&StoreSettings::default(), &rec),
            "INSERT INTO imports (filename, sha256, count, region) VALUES ('a.gml', 'ff', 12, '');"
        );
    }
}
