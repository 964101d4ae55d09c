use std::fs::File;
use std::io::Write;

use pillbox_config::{TraceEvent, load_weight_trace};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.csv");
    let mut f = File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    (dir, path)
}

#[rstest]
fn loads_weights_and_lifecycle_events() {
    let (_dir, path) = write_csv(
        "ms,event,grams\n0,weight,4.10\n100,connected,\n200,weight, 4.10\n1300,weight,0.02\n5000,disconnected,\n",
    );
    let rows = load_weight_trace(&path).expect("load");
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[1].event, TraceEvent::Connected);
    assert_eq!(rows[1].grams, None);
    assert_eq!(rows[2].grams, Some(4.10));
    assert_eq!(rows[4].event, TraceEvent::Disconnected);
}

#[rstest]
fn rejects_wrong_headers() {
    let (_dir, path) = write_csv("time,kind,g\n0,weight,1.0\n");
    let err = load_weight_trace(&path).expect_err("bad headers");
    assert!(err.to_string().contains("ms,event,grams"));
}

#[rstest]
fn rejects_weight_without_grams() {
    let (_dir, path) = write_csv("ms,event,grams\n0,weight,\n");
    let err = load_weight_trace(&path).expect_err("missing grams");
    assert!(err.to_string().contains("without grams"));
}

#[rstest]
fn rejects_unknown_event() {
    let (_dir, path) = write_csv("ms,event,grams\n0,tare,\n");
    let err = load_weight_trace(&path).expect_err("bad event");
    assert!(err.to_string().contains("invalid CSV row 2"));
}

#[rstest]
fn rejects_decreasing_timestamps() {
    let (_dir, path) = write_csv("ms,event,grams\n10,weight,1.0\n5,weight,1.0\n");
    let err = load_weight_trace(&path).expect_err("out of order");
    assert!(err.to_string().contains("non-decreasing"));
}

#[rstest]
fn rejects_empty_trace() {
    let (_dir, path) = write_csv("ms,event,grams\n");
    let err = load_weight_trace(&path).expect_err("empty");
    assert!(err.to_string().contains("empty"));
}
