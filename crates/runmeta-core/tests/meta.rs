//! Meta lifecycle: construction, heartbeat cadence, shutdown flush, reload.

use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeZone, Utc};
use runmeta_core::{
    fields, iso_timestamp, Api, Environment, Meta, MetaConfig, MetaError, MetadataDocument,
    ProgramInfo, RunState,
};
use tempfile::tempdir;

fn new_meta(out_dir: &Path) -> Meta {
    let config = MetaConfig::default()
        .with_out_dir(out_dir)
        .with_host("worker-7")
        .with_username("svc-train")
        .with_cuda_version_file(out_dir.join("cuda-version.txt"));
    let env = Environment::local().with_program(
        ProgramInfo::default()
            .with_program("train.py")
            .with_args(["--seed", "1"]),
    );
    let started_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    Meta::with_environment(&Api::without_vcs(), config, started_at, env)
}

fn read_doc(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).expect("metadata file");
    assert!(text.ends_with('\n'), "missing trailing newline");
    serde_json::from_str(&text).expect("valid JSON")
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").expect("ISO timestamp")
}

#[test]
fn test_construction_does_not_write() {
    let dir = tempdir().unwrap();
    let meta = new_meta(dir.path());

    assert!(!meta.path().exists());
    assert_eq!(meta.probe_reports().len(), 10);
    let doc = meta.snapshot();
    assert_eq!(doc.get_str(fields::HOST), Some("worker-7"));
    assert_eq!(doc.get_str(fields::USERNAME), Some("svc-train"));
    assert_eq!(doc.get_str(fields::STATE), Some("running"));
}

#[test]
fn test_write_into_missing_directory_fails_cleanly() {
    let dir = tempdir().unwrap();
    let meta = new_meta(&dir.path().join("not-created"));

    assert!(matches!(meta.write(), Err(MetaError::Io { .. })));
    // Lock is free again: the next update does not block.
    meta.set_state(RunState::Failed);
    assert_eq!(meta.snapshot().get_str(fields::STATE), Some("failed"));
}

#[tokio::test]
async fn test_shutdown_before_start_returns() {
    let dir = tempdir().unwrap();
    let mut meta = new_meta(dir.path());

    tokio::time::timeout(Duration::from_secs(5), meta.shutdown())
        .await
        .expect("shutdown blocked")
        .unwrap();
    assert!(!meta.path().exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_flushes_final_heartbeat() {
    let dir = tempdir().unwrap();
    let mut meta = new_meta(dir.path());
    meta.start().unwrap();

    meta.set_state(RunState::Finished);
    meta.set_exit_code(0);
    let requested = parse_ts(&iso_timestamp(Utc::now()));
    meta.shutdown().await.unwrap();

    let doc = read_doc(meta.path());
    let heartbeat = parse_ts(doc[fields::HEARTBEAT_AT].as_str().unwrap());
    assert!(heartbeat >= requested, "{heartbeat} < {requested}");
    assert_eq!(doc[fields::STATE], "finished");
    assert_eq!(doc[fields::EXIT_CODE], 0);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_writes_once_per_interval() {
    let dir = tempdir().unwrap();
    let mut meta = new_meta(dir.path());
    let path = meta.path().to_path_buf();
    meta.start().unwrap();
    // Second start is ignored.
    meta.start().unwrap();

    tokio::time::sleep(Duration::from_millis(15_500)).await;
    assert!(!path.exists(), "wrote before the interval elapsed");

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(path.exists(), "no write after 16 ticks");
    std::fs::remove_file(&path).unwrap();

    // Elapsed time reset after the flush: the next write is 16 ticks later.
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(!path.exists(), "counter was not reset");

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(path.exists());

    meta.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_survives_write_failures() {
    let dir = tempdir().unwrap();
    let out_dir = dir.path().join("late");
    let mut meta = new_meta(&out_dir);
    meta.start().unwrap();

    // First heartbeat fails: the directory does not exist yet.
    tokio::time::sleep(Duration::from_millis(16_500)).await;
    assert!(!meta.path().exists());

    std::fs::create_dir_all(&out_dir).unwrap();
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert!(meta.path().exists(), "heartbeat loop died after a failed write");

    meta.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reload_reproduces_fields() {
    let dir = tempdir().unwrap();
    let mut first = new_meta(dir.path());
    first
        .writer()
        .update(|doc| doc.set("custom", serde_json::json!({"lr": 0.1})));
    first.write().unwrap();
    first.shutdown().await.unwrap();
    let written = read_doc(first.path());

    let second = new_meta(dir.path());
    let reloaded = second.snapshot();
    assert_eq!(reloaded.get("custom"), Some(&serde_json::json!({"lr": 0.1})));

    second.write().unwrap();
    let rewritten = read_doc(second.path());

    let strip = |v: &serde_json::Value| {
        let mut doc: MetadataDocument = serde_json::from_value(v.clone()).unwrap();
        doc.remove(fields::HEARTBEAT_AT);
        doc
    };
    assert_eq!(strip(&written), strip(&rewritten));

    let before = parse_ts(written[fields::HEARTBEAT_AT].as_str().unwrap());
    let after = parse_ts(rewritten[fields::HEARTBEAT_AT].as_str().unwrap());
    assert!(after >= before);
}
