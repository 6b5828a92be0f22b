mod common;

use ledgerlift::config::MigrationConfig;
use ledgerlift::idmap::HashIdMapper;
use ledgerlift::import::{BatchImporter, SkipReason};

use common::{prepare_database, write_clean_sources, write_collection, Fixture};
use serde_json::json;

#[tokio::test]
async fn clean_import_reaches_full_parity() {
    let fx = Fixture::new();
    let pool = prepare_database(&fx.db_path).await;
    write_clean_sources(&fx.source_dir);

    let config = MigrationConfig::default();
    let mapper = HashIdMapper;
    let mut importer = BatchImporter::new(&pool, &config, &mapper);
    let stats = importer.run(&fx.source_dir, false).await.unwrap();

    assert_eq!(stats.total_records(), 32);
    assert_eq!(stats.successful_imports(), 32);
    assert_eq!(stats.failed_imports(), 0);
    assert_eq!(stats.duplicates_skipped(), 0);

    for (table, expected) in [
        ("users", 3i64),
        ("categories", 2),
        ("accounts", 5),
        ("transactions", 20),
        ("budgets", 2),
    ] {
        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, expected, "row count for {table}");
    }
}

#[tokio::test]
async fn rerun_with_force_is_idempotent() {
    let fx = Fixture::new();
    let pool = prepare_database(&fx.db_path).await;
    write_clean_sources(&fx.source_dir);

    let config = MigrationConfig::default();
    let mapper = HashIdMapper;

    let mut first = BatchImporter::new(&pool, &config, &mapper);
    first.run(&fx.source_dir, false).await.unwrap();

    let mut second = BatchImporter::new(&pool, &config, &mapper);
    let stats = second.run(&fx.source_dir, true).await.unwrap();

    // Records with source ids upsert onto themselves; duplicate detection
    // covers the unique tuples. Either way the row counts do not grow.
    assert_eq!(stats.failed_imports(), 0);
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(users, 3);
    let transactions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(transactions, 20);
}

#[tokio::test]
async fn rerun_without_force_is_refused() {
    let fx = Fixture::new();
    let pool = prepare_database(&fx.db_path).await;
    write_clean_sources(&fx.source_dir);

    let config = MigrationConfig::default();
    let mapper = HashIdMapper;
    let mut first = BatchImporter::new(&pool, &config, &mapper);
    first.run(&fx.source_dir, false).await.unwrap();

    let mut second = BatchImporter::new(&pool, &config, &mapper);
    let err = second.run(&fx.source_dir, false).await.unwrap_err();
    assert!(err.to_string().contains("--force-rerun"));
}

#[tokio::test]
async fn missing_dependency_source_cascades_to_skips() {
    let fx = Fixture::new();
    let pool = prepare_database(&fx.db_path).await;
    write_clean_sources(&fx.source_dir);
    std::fs::remove_file(fx.source_dir.join("users.json")).unwrap();

    let config = MigrationConfig::default();
    let mapper = HashIdMapper;
    let mut importer = BatchImporter::new(&pool, &config, &mapper);
    let stats = importer.run(&fx.source_dir, false).await.unwrap();

    assert!(matches!(
        stats.collections["users"].skipped,
        Some(SkipReason::MissingSource(_))
    ));
    assert!(matches!(
        stats.collections["accounts"].skipped,
        Some(SkipReason::DependencyUnsatisfied(_))
    ));
    assert!(matches!(
        stats.collections["transactions"].skipped,
        Some(SkipReason::DependencyUnsatisfied(_))
    ));
    assert!(matches!(
        stats.collections["budgets"].skipped,
        Some(SkipReason::DependencyUnsatisfied(_))
    ));
    // Categories depend on nothing and still import.
    assert!(stats.collections["categories"].skipped.is_none());
    assert_eq!(stats.collections["categories"].successful, 2);
}

#[tokio::test]
async fn forward_reference_is_rejected_not_fatal() {
    let fx = Fixture::new();
    let pool = prepare_database(&fx.db_path).await;
    write_clean_sources(&fx.source_dir);

    // One transaction points at an account no source file defines.
    let mut rows: Vec<serde_json::Value> = serde_json::from_slice(
        &std::fs::read(fx.source_dir.join("transactions.json")).unwrap(),
    )
    .unwrap();
    rows.push(json!({
        "id": "t-stray",
        "account_id": "a-nonexistent",
        "amount": 11.0,
        "gst_amount": 1.0,
        "occurred_at": "2026-02-01T00:00:00Z",
    }));
    write_collection(&fx.source_dir, "transactions.json", &rows);

    let config = MigrationConfig::default();
    let mapper = HashIdMapper;
    let mut importer = BatchImporter::new(&pool, &config, &mapper);
    let stats = importer.run(&fx.source_dir, false).await.unwrap();

    let tx_stats = &stats.collections["transactions"];
    assert_eq!(tx_stats.successful, 20);
    assert_eq!(tx_stats.failed, 1);
    assert!(tx_stats
        .errors
        .iter()
        .any(|e| e.record_id.as_deref() == Some("t-stray") && e.field == "account_id"));

    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transactions t LEFT JOIN accounts a ON a.id = t.account_id \
         WHERE a.id IS NULL",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn gst_mismatch_is_rejected() {
    let fx = Fixture::new();
    let pool = prepare_database(&fx.db_path).await;
    write_clean_sources(&fx.source_dir);

    let mut rows: Vec<serde_json::Value> = serde_json::from_slice(
        &std::fs::read(fx.source_dir.join("transactions.json")).unwrap(),
    )
    .unwrap();
    rows.push(json!({
        "id": "t-badgst",
        "account_id": "a1",
        "amount": 110.0,
        "gst_amount": 10.50,
        "occurred_at": "2026-02-01T00:00:00Z",
    }));
    write_collection(&fx.source_dir, "transactions.json", &rows);

    let config = MigrationConfig::default();
    let mapper = HashIdMapper;
    let mut importer = BatchImporter::new(&pool, &config, &mapper);
    let stats = importer.run(&fx.source_dir, false).await.unwrap();

    let tx_stats = &stats.collections["transactions"];
    assert_eq!(tx_stats.failed, 1);
    assert!(tx_stats
        .errors
        .iter()
        .any(|e| e.record_id.as_deref() == Some("t-badgst") && e.field == "gst_amount"));
}

#[tokio::test]
async fn dry_run_writes_nothing_anywhere() {
    let fx = Fixture::new();
    let pool = prepare_database(&fx.db_path).await;
    write_clean_sources(&fx.source_dir);

    let config = MigrationConfig::default();
    let mapper = HashIdMapper;
    let mut importer = BatchImporter::new(&pool, &config, &mapper).dry_run(true);
    let stats = importer.run(&fx.source_dir, false).await.unwrap();

    assert_eq!(stats.successful_imports(), 32);
    assert!(stats.dry_run);

    for table in ["users", "categories", "accounts", "transactions", "budgets"] {
        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0, "{table} should stay empty on a dry run");
    }
}
