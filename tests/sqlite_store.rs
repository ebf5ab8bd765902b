use grid_editor::persist::{PersistenceGateway, SnapshotStore, SqliteStore};
use grid_editor::transfer::{self, TransferKind};
use grid_editor::value::default_seed;
use grid_editor::{CellValue, Coord, GridError, Session, SessionConfig};
use pretty_assertions::assert_eq;

#[test]
fn snapshot_survives_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("grid.db");

    {
        let store = SqliteStore::open(&db).unwrap();
        let mut s = Session::new(store, SessionConfig::default(), default_seed()).unwrap();
        s.select(Coord::new(1, 2), Coord::new(1, 2)).unwrap();
        s.edit_selected("5500").unwrap();
        s.save().unwrap();
    }

    let store = SqliteStore::open(&db).unwrap();
    let mut s = Session::new(store, SessionConfig::default(), Vec::new()).unwrap();
    assert!(s.restore().unwrap());
    assert_eq!(s.matrix()[1][2], CellValue::Number(5500.0));
    assert_eq!(s.matrix().len(), default_seed().len());
}

#[test]
fn keys_are_independent_slots() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("grid.db");

    let mut a = PersistenceGateway::new(SqliteStore::open(&db).unwrap(), "a");
    a.save(&vec![vec![CellValue::text("first")]]).unwrap();
    let b = PersistenceGateway::new(SqliteStore::open(&db).unwrap(), "b");
    assert_eq!(b.restore().unwrap(), None);
    assert_eq!(a.restore().unwrap(), Some(vec![vec![CellValue::text("first")]]));
}

#[test]
fn corrupt_row_in_the_database_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("grid.db");
    let mut store = SqliteStore::open(&db).unwrap();
    store.set("spreadsheetData", "{\"rows\": 3}").unwrap();

    let mut s = Session::new(store, SessionConfig::default(), default_seed()).unwrap();
    assert!(matches!(s.restore(), Err(GridError::CorruptSnapshot(_))));
    assert_eq!(s.matrix(), default_seed());
}

#[test]
fn csv_import_replaces_the_grid_and_is_undoable() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("people.csv");
    std::fs::write(&csv, "Name,Age\nZed,41\nYan,\n").unwrap();

    let mut s = Session::new(SqliteStore::in_memory().unwrap(), SessionConfig::default(), default_seed())
        .unwrap();
    assert_eq!(s.import(TransferKind::Csv, &csv).unwrap(), 3);
    assert_eq!(
        s.matrix(),
        vec![
            vec![CellValue::text("Name"), CellValue::text("Age")],
            vec![CellValue::text("Zed"), CellValue::Number(41.0)],
            vec![CellValue::text("Yan"), CellValue::Empty],
        ]
    );
    assert!(s.undo());
    assert_eq!(s.matrix(), default_seed());

    let out = dir.path().join("out.csv");
    s.export(TransferKind::Csv, &out).unwrap();
    assert_eq!(transfer::import(TransferKind::Csv, &out).unwrap(), default_seed());
}
