use std::fs;

use stock_viewer::Error;
use stock_viewer::chart::{ChartRequest, XAxis, assemble_chart};
use stock_viewer::ingest::{ingest_csv, remove_records};
use stock_viewer::store::RecordStore;
use tempfile::tempdir;

const PRICES: &str = "Date,Open,Close\n2024-05-30,100,101.5\n2024-05-31,101,99.25\n2024-06-01,99,102\n";

#[test]
fn upload_is_copied_and_recorded() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let store = RecordStore::open(dir.path().join("db.json"));

    let record = ingest_csv(&store, &data, "20240101_US_AAPL.csv", PRICES.as_bytes()).unwrap();

    assert_eq!(record.id, 1);
    assert_eq!(record.category, "US");
    assert_eq!(record.ticker_code, "AAPL");
    assert_eq!(fs::read_to_string(&record.file_path).unwrap(), PRICES);
    assert_eq!(store.get_by_id(1).unwrap(), Some(record));
}

#[test]
fn badly_named_upload_leaves_no_trace() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let store = RecordStore::open(dir.path().join("db.json"));

    let err = ingest_csv(&store, &data, "bad.csv", PRICES.as_bytes()).unwrap_err();
    assert!(matches!(err, Error::InvalidFileName { .. }));
    assert!(store.list_all().unwrap().is_empty());
    assert!(!data.join("bad.csv").exists());
}

#[test]
fn failed_record_insert_keeps_the_earlier_upload() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let store = RecordStore::open(dir.path().join("db.json"));
    let first = ingest_csv(&store, &data, "20240101_US_AAPL.csv", PRICES.as_bytes()).unwrap();

    // a directory in place of the document file makes every write fail
    let broken_path = dir.path().join("broken");
    fs::create_dir(&broken_path).unwrap();
    let broken = RecordStore::open(broken_path.clone());
    let replacement = "Date,Close\n2024-06-02,1\n";
    let err = ingest_csv(&broken, &data, "20240101_US_AAPL.csv", replacement.as_bytes())
        .unwrap_err();

    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(fs::read_to_string(&first.file_path).unwrap(), PRICES);
    assert_eq!(fs::read_dir(&data).unwrap().count(), 1);
}

#[test]
fn path_components_are_refused() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(dir.path().join("db.json"));

    let err = ingest_csv(&store, dir.path(), "../20240101_US_AAPL.csv", PRICES.as_bytes())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFileName { .. }));
}

#[test]
fn uploaded_file_charts_with_ticker_label() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let store = RecordStore::open(dir.path().join("db.json"));
    let record = ingest_csv(&store, &data, "20240601_JP_7203.csv", PRICES.as_bytes()).unwrap();

    let chart = assemble_chart(&store, &[record.id], &ChartRequest::default()).unwrap();

    assert_eq!(chart.x_axis, XAxis::Date);
    assert_eq!(chart.x_label, "Date");
    assert_eq!(chart.y_label, "Close");
    assert_eq!(chart.traces.len(), 1);
    assert_eq!(chart.traces[0].name, "7203");
    let closes: Vec<f64> = chart.traces[0].points.iter().map(|p| p.1).collect();
    assert_eq!(closes, vec![101.5, 99.25, 102.0]);
}

#[test]
fn chart_overlays_several_files() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let store = RecordStore::open(dir.path().join("db.json"));
    let a = ingest_csv(&store, &data, "20240601_JP_7203.csv", PRICES.as_bytes()).unwrap();
    let b = ingest_csv(&store, &data, "20240601_US_KO.csv", PRICES.as_bytes()).unwrap();

    let chart = assemble_chart(&store, &[a.id, b.id], &ChartRequest::default()).unwrap();
    let names: Vec<&str> = chart.traces.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["7203", "KO"]);
}

#[test]
fn chart_errors_are_specific() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let store = RecordStore::open(dir.path().join("db.json"));
    let record = ingest_csv(&store, &data, "20240601_JP_7203.csv", PRICES.as_bytes()).unwrap();

    assert!(matches!(
        assemble_chart(&store, &[], &ChartRequest::default()),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        assemble_chart(&store, &[99], &ChartRequest::default()),
        Err(Error::RecordNotFound(99))
    ));

    let request = ChartRequest {
        y_col: "Volume".to_string(),
        ..ChartRequest::default()
    };
    match assemble_chart(&store, &[record.id], &request) {
        Err(Error::MissingColumn { column, .. }) => assert_eq!(column, "Volume"),
        other => panic!("unexpected result: {:?}", other),
    }

    fs::remove_file(&record.file_path).unwrap();
    assert!(matches!(
        assemble_chart(&store, &[record.id], &ChartRequest::default()),
        Err(Error::Io { .. })
    ));
}

#[test]
fn remove_records_deletes_files_and_tolerates_missing_ones() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let store = RecordStore::open(dir.path().join("db.json"));
    let a = ingest_csv(&store, &data, "20240601_JP_7203.csv", PRICES.as_bytes()).unwrap();
    let b = ingest_csv(&store, &data, "20240601_US_KO.csv", PRICES.as_bytes()).unwrap();
    fs::remove_file(&b.file_path).unwrap();

    let removed = remove_records(&store, &[a.id, b.id, 77]).unwrap();

    assert_eq!(removed, 2);
    assert!(store.list_all().unwrap().is_empty());
    assert!(!std::path::Path::new(&a.file_path).exists());
}
