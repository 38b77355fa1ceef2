//! Loader round-trip, backup and rendering tests

mod common;

use common::storage_config;
use edp_server::etl::loader::{Loader, CSV_FILE, SNAPSHOT_FILE};
use edp_server::etl::models::TransformBatch;
use edp_server::etl::transformer::Transformer;
use edp_server::etl::EtlError;
use serde_json::json;
use tempfile::TempDir;

fn batch_of(names: &[&str]) -> TransformBatch {
    let raw: Vec<_> = names
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "country": "Testland",
                "domains": [format!("{}.edu", name.to_lowercase())],
                "web_pages": [format!("www.{}.edu", name.to_lowercase())]
            })
        })
        .collect();
    Transformer::new().transform(&raw)
}

#[tokio::test]
async fn read_returns_none_before_first_save() {
    let root = TempDir::new().unwrap();
    let loader = Loader::new(storage_config(root.path()));

    assert!(loader.read().await.unwrap().is_none());
}

#[tokio::test]
async fn save_then_read_round_trips_records() {
    let root = TempDir::new().unwrap();
    let loader = Loader::new(storage_config(root.path()));
    let batch = batch_of(&["Alpha", "Beta"]);

    let report = loader.save(&batch).await.unwrap();
    assert_eq!(report.records_loaded, 2);
    assert!(report.csv_path.is_some());

    let snapshot = loader.read().await.unwrap().unwrap();
    assert_eq!(snapshot.records, batch.records);
    assert_eq!(snapshot.metadata.success_count, 2);
    assert_eq!(snapshot.metadata.total_input, 2);
}

#[tokio::test]
async fn backup_is_taken_before_every_overwrite() {
    let root = TempDir::new().unwrap();
    let config = storage_config(root.path());
    let loader = Loader::new(config.clone());

    let first = batch_of(&["Alpha"]);
    let second = batch_of(&["Beta", "Gamma"]);

    loader.save(&first).await.unwrap();
    let first_bytes = std::fs::read(config.data_dir.join(SNAPSHOT_FILE)).unwrap();

    loader.save(&second).await.unwrap();

    // Exactly one backup, byte-identical to the first snapshot.
    let backups: Vec<_> = std::fs::read_dir(&config.backup_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(std::fs::read(&backups[0]).unwrap(), first_bytes);

    // The primary reflects only the second batch.
    let snapshot = loader.read().await.unwrap().unwrap();
    assert_eq!(snapshot.records, second.records);
}

#[tokio::test]
async fn first_save_creates_no_backup() {
    let root = TempDir::new().unwrap();
    let config = storage_config(root.path());
    let loader = Loader::new(config.clone());

    loader.save(&batch_of(&["Alpha"])).await.unwrap();

    let backups = std::fs::read_dir(&config.backup_dir).unwrap().count();
    assert_eq!(backups, 0);
}

#[tokio::test]
async fn empty_batch_skips_csv_generation() {
    let root = TempDir::new().unwrap();
    let config = storage_config(root.path());
    let loader = Loader::new(config.clone());

    let report = loader.save(&batch_of(&[])).await.unwrap();

    assert_eq!(report.records_loaded, 0);
    assert!(report.csv_path.is_none());
    assert!(!config.data_dir.join(CSV_FILE).exists());

    let snapshot = loader.read().await.unwrap().unwrap();
    assert!(snapshot.records.is_empty());
}

#[tokio::test]
async fn csv_rendering_is_written_alongside_the_snapshot() {
    let root = TempDir::new().unwrap();
    let config = storage_config(root.path());
    let loader = Loader::new(config.clone());

    loader.save(&batch_of(&["Alpha"])).await.unwrap();

    let text = std::fs::read_to_string(config.data_dir.join(CSV_FILE)).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "id,name,country,alpha_two_code,state_province,domains,web_pages,last_updated"
    );
    assert!(lines.next().unwrap().contains("testland-alpha"));
}

#[tokio::test]
async fn tampered_snapshot_fails_the_read() {
    let root = TempDir::new().unwrap();
    let config = storage_config(root.path());
    let loader = Loader::new(config.clone());

    loader.save(&batch_of(&["Alpha"])).await.unwrap();

    let path = config.data_dir.join(SNAPSHOT_FILE);
    let mut value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    value["records"][0]["name"] = json!("Tampered");
    std::fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();

    let err = loader.read().await.unwrap_err();
    assert!(matches!(err, EtlError::CorruptSnapshot { .. }));
}

#[tokio::test]
async fn backups_are_pruned_past_the_retention_cap() {
    let root = TempDir::new().unwrap();
    let mut config = storage_config(root.path());
    config.backup_retention = 2;
    let loader = Loader::new(config.clone());

    for round in 0..5 {
        let name = format!("School{round}");
        loader.save(&batch_of(&[name.as_str()])).await.unwrap();
    }

    let backups = std::fs::read_dir(&config.backup_dir).unwrap().count();
    assert_eq!(backups, 2);
}

#[tokio::test]
async fn exports_embed_the_current_date() {
    let root = TempDir::new().unwrap();
    let loader = Loader::new(storage_config(root.path()));

    // No snapshot yet: both renderings refuse.
    assert!(matches!(
        loader.export_csv().await.unwrap_err(),
        EtlError::NoSnapshot
    ));

    loader.save(&batch_of(&["Alpha"])).await.unwrap();

    let csv = loader.export_csv().await.unwrap();
    assert!(csv.filename.starts_with("universities-"));
    assert!(csv.filename.ends_with(".csv"));
    assert_eq!(csv.content_type, "text/csv");

    let json_export = loader.export_json().await.unwrap();
    assert!(json_export.filename.ends_with(".json"));
    let value: serde_json::Value = serde_json::from_slice(&json_export.body).unwrap();
    assert_eq!(value["records"][0]["country"], "Testland");
}
