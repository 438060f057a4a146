use std::fs;
use std::io::Write;
use std::path::Path;

use citygml2pg::{
    FileStatus, ImportConfig, ImportError, Importer, Lod, MemoryStore, ScriptStore, Store, StoreSettings,
    find_input_files,
};
use flate2::{Compression, write::GzEncoder};

const SRID: u32 = 25832;

fn city_model(buildings: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<core:CityModel xmlns:core="http://www.opengis.net/citygml/2.0"
    xmlns:bldg="http://www.opengis.net/citygml/building/2.0"
    xmlns:gml="http://www.opengis.net/gml">
  {buildings}
</core:CityModel>"#
    )
}

fn surface(kind: &str, pos_list: &str, dim: u8) -> String {
    format!(
        r#"<bldg:boundedBy><bldg:{kind}><bldg:lod2MultiSurface><gml:MultiSurface><gml:surfaceMember>
             <gml:Polygon><gml:exterior><gml:LinearRing>
               <gml:posList srsDimension="{dim}">{pos_list}</gml:posList>
             </gml:LinearRing></gml:exterior></gml:Polygon>
           </gml:surfaceMember></gml:MultiSurface></bldg:lod2MultiSurface></bldg:{kind}></bldg:boundedBy>"#
    )
}

fn building(id: &str, surfaces: &[String]) -> String {
    format!(r#"<core:cityObjectMember><bldg:Building gml:id="{id}">{}</bldg:Building></core:cityObjectMember>"#, surfaces.concat())
}

fn square_building(id: &str) -> String {
    building(id, &[surface("GroundSurface", "0 0 0 10 0 0 10 10 0 0 10 0 0 0 0", 3)])
}

fn importer() -> Importer {
    Importer::new(ImportConfig::new(SRID, Lod::Lod2))
}

fn import(doc: &str) -> MemoryStore {
    let store = MemoryStore::new();
    importer().import_document(doc, "tile.gml", &store).unwrap();
    store
}

#[test]
fn square_ground_surface_becomes_footprint() {
    let store = import(&city_model(&square_building("DEBY_LOD2_1")));
    let record = store.get("DEBY_LOD2_1").unwrap();

    assert_eq!(record.footprint(), "SRID=25832; MULTIPOLYGON(((0 0,10 0,10 10,0 10,0 0)))");
    assert_eq!(record.ground(), "SRID=25832; MULTIPOLYGON(((0 0 0,10 0 0,10 10 0,0 10 0,0 0 0)))");
    assert_eq!(record.wall(), "SRID=25832; MULTIPOLYGONZ EMPTY");
    assert_eq!(record.roof(), "SRID=25832; MULTIPOLYGONZ EMPTY");
    assert_eq!(record.filename(), "tile.gml");
}

#[test]
fn unclosed_ground_ring_is_closed() {
    let doc = city_model(&building("B1", &[surface("GroundSurface", "0 0 10 0 10 10 0 10", 2)]));
    let record = import(&doc).get("B1").unwrap();

    assert_eq!(record.ground(), "SRID=25832; MULTIPOLYGON(((0 0,10 0,10 10,0 10,0 0)))");
    assert_eq!(record.footprint(), "SRID=25832; MULTIPOLYGON(((0 0,10 0,10 10,0 10,0 0)))");
}

#[test]
fn degenerate_ground_ring_keeps_walls_and_roofs() {
    let doc = city_model(&building("B1", &[
        surface("WallSurface", "0 0 0 10 0 0 10 0 5 0 0 5 0 0 0", 3),
        surface("RoofSurface", "0 0 5 10 0 5 10 10 5 0 0 5", 3),
        // Two distinct points only.
        surface("GroundSurface", "0 0 0 10 0 0 10 0 0 0 0 0", 3),
    ]));
    let record = import(&doc).get("B1").unwrap();

    assert_eq!(record.ground(), "SRID=25832; MULTIPOLYGONZ EMPTY");
    assert_eq!(record.footprint(), "SRID=25832; MULTIPOLYGON EMPTY");
    assert_eq!(record.wall(), "SRID=25832; MULTIPOLYGON(((0 0 0,10 0 0,10 0 5,0 0 5,0 0 0)))");
    assert_eq!(record.roof(), "SRID=25832; MULTIPOLYGON(((0 0 5,10 0 5,10 10 5,0 0 5)))");
}

#[test]
fn buildings_without_id_are_kept() {
    let doc = city_model(&format!(
        "{}{}",
        square_building("A"),
        r#"<core:cityObjectMember><bldg:Building/></core:cityObjectMember>"#,
    ));
    let store = import(&doc);
    let records = store.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].id(), None);
    assert_eq!(records[1].footprint(), "SRID=25832; MULTIPOLYGON EMPTY");
}

fn write_gz(path: &Path, text: &str) {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(text.as_bytes()).unwrap();
    fs::write(path, enc.finish().unwrap()).unwrap();
}

#[test]
fn rerun_skips_unchanged_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.gml"), city_model(&square_building("A"))).unwrap();
    write_gz(&dir.path().join("b.gml.gz"), &city_model(&square_building("B")));
    fs::write(dir.path().join("c.gml"), "<core:CityModel><bldg:Building>").unwrap();

    let files = find_input_files(dir.path()).unwrap();
    assert_eq!(files.len(), 3);

    let store = MemoryStore::new();
    let first = importer().run(dir.path(), &files, &store).unwrap();
    assert_eq!(first.reports[0].status, FileStatus::Imported);
    assert_eq!(first.reports[1].status, FileStatus::Imported);
    assert_eq!(first.reports[1].buildings, 1);
    assert!(matches!(first.reports[2].status, FileStatus::Failed(_)));
    assert_eq!(first.buildings(), 2);

    let ledger = store.imported().unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.get("c.gml").is_none());
    assert_eq!(ledger.get("b.gml.gz").unwrap().count, 1);

    // Change one file; the others stay as they were.
    fs::write(dir.path().join("a.gml"), city_model(&format!("{}{}", square_building("A"), square_building("A2")))).unwrap();
    let second = importer().run(dir.path(), &files, &store).unwrap();
    assert_eq!(second.reports[0].status, FileStatus::Imported);
    assert_eq!(second.reports[0].buildings, 2);
    assert_eq!(second.reports[1].status, FileStatus::Skipped);
    assert!(matches!(second.reports[2].status, FileStatus::Failed(_)));
    assert_eq!((second.imported(), second.skipped(), second.failed()), (1, 1, 1));
}

#[test]
fn failed_batch_does_not_mark_file_complete() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.gml");
    let buildings: String = (0..3).map(|i| square_building(&format!("B{i}"))).collect();
    fs::write(&path, city_model(&buildings)).unwrap();

    let mut config = ImportConfig::new(SRID, Lod::Lod2);
    config.batch_size = 1;
    let store = MemoryStore::with_batch_limit(2);
    let summary = Importer::new(config).run(dir.path(), &[path], &store).unwrap();

    assert!(matches!(summary.reports[0].status, FileStatus::Failed(ref reason) if reason.contains("batch limit")));
    // Two batches were accepted before the store refused the third.
    assert_eq!(summary.reports[0].buildings, 2);
    assert_eq!(store.records().len(), 2);
    assert!(store.imported().unwrap().is_empty());
}

#[test]
fn malformed_document_is_a_per_file_error() {
    let err = importer().import_document("<CityModel>", "broken.gml", &MemoryStore::new()).unwrap_err();
    assert!(matches!(err, ImportError::MalformedDocument { .. }));
    assert!(err.to_string().contains("broken.gml"));
}

#[test]
fn script_store_output_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tile.gml");
    fs::write(&input, city_model(&square_building("DEBY_1"))).unwrap();
    let script = dir.path().join("import.sql");
    let ledger = dir.path().join("imports.json");

    {
        let store = ScriptStore::open(&script, &ledger, StoreSettings::default()).unwrap();
        let summary = importer().run(dir.path(), &[input.clone()], &store).unwrap();
        assert_eq!(summary.buildings(), 1);
    }

    let sql = fs::read_to_string(&script).unwrap();
    assert!(sql.contains("'SRID=25832; MULTIPOLYGON(((0 0,10 0,10 10,0 10,0 0)))'::geometry"));
    assert!(sql.contains("INSERT INTO imports (filename, sha256, count, region) VALUES ('tile.gml', "));

    let store = ScriptStore::open(&script, &ledger, StoreSettings::default()).unwrap();
    let summary = importer().run(dir.path(), &[input], &store).unwrap();
    assert_eq!(summary.reports[0].status, FileStatus::Skipped);
}

#[test]
fn latin1_document_is_decoded_per_declaration() {
    let dir = tempfile::tempdir().unwrap();
    let doc = city_model(&building("DEBY_1", &[
        "<bldg:name>Hauptstra\u{df}e</bldg:name>".to_string(),
        surface("GroundSurface", "0 0 0 10 0 0 10 10 0 0 10 0 0 0 0", 3),
    ]))
    .replace("encoding=\"UTF-8\"", "encoding=\"ISO-8859-1\"");
    // Re-encode as Latin-1: every char is below U+0100.
    let bytes: Vec<u8> = doc.chars().map(|c| c as u8).collect();
    assert!(bytes.contains(&0xDF));
    let path = dir.path().join("latin1.gml");
    fs::write(&path, bytes).unwrap();

    let store = MemoryStore::new();
    let summary = importer().run(dir.path(), &[path], &store).unwrap();
    assert_eq!(summary.reports[0].status, FileStatus::Imported);
    assert_eq!(summary.reports[0].buildings, 1);
    assert_eq!(store.get("DEBY_1").unwrap().footprint(), "SRID=25832; MULTIPOLYGON(((0 0,10 0,10 10,0 10,0 0)))");
}

#[test]
fn same_file_name_in_two_directories_is_tracked_separately() {
    let dir = tempfile::tempdir().unwrap();
    for (sub, id) in [("a", "A"), ("b", "B")] {
        fs::create_dir(dir.path().join(sub)).unwrap();
        fs::write(dir.path().join(sub).join("tile.gml"), city_model(&square_building(id))).unwrap();
    }
    let files = find_input_files(dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    let store = MemoryStore::new();
    let first = importer().run(dir.path(), &files, &store).unwrap();
    assert_eq!(first.imported(), 2);

    let ledger = store.imported().unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.get("a/tile.gml").is_some());
    assert!(ledger.get("b/tile.gml").is_some());
    assert_eq!(store.get("A").unwrap().filename(), "tile.gml");

    for _ in 0..2 {
        let again = importer().run(dir.path(), &files, &store).unwrap();
        assert_eq!((again.imported(), again.skipped(), again.failed()), (0, 2, 0));
    }
}
