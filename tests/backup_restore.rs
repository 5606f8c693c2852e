//! End-to-end tests for the backup/restore engine over the bundled store.

use tempfile::TempDir;
use workhub_backup::backup::{BackupEngine, BackupError, BackupKind, OperatorContext};
use workhub_backup::store::{MemoryStore, ReadView, Store, Value};

fn ctx() -> OperatorContext {
    OperatorContext::new("test-operator")
}

async fn engine_with_seed(dir: &TempDir) -> BackupEngine<MemoryStore> {
    let store = MemoryStore::in_memory();
    store
        .execute_in_transaction(&[
            "CREATE TABLE \"t\" (\"id\" INT, \"name\" TEXT)".to_string(),
            "INSERT INTO \"t\" (\"id\", \"name\") VALUES (1, 'a'), (2, 'b')".to_string(),
        ])
        .await
        .unwrap();
    BackupEngine::new(store, dir.path()).unwrap()
}

async fn rows_of(store: &MemoryStore, table: &str) -> Vec<Vec<Value>> {
    let view = store.read_view().await.unwrap();
    let (_, rows) = view.stream_rows(table).unwrap();
    rows
}

/// Back up t(id, name) with (1,'a'),(2,'b'), delete
/// all rows, restore, and find exactly the original rows again.
#[tokio::test]
async fn round_trip_restores_deleted_rows() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_seed(&dir).await;

    let record = engine.trigger_backup(&ctx(), Some("snap1")).await.unwrap();
    engine
        .store()
        .execute_in_transaction(&["DELETE FROM \"t\"".to_string()])
        .await
        .unwrap();
    assert!(rows_of(engine.store(), "t").await.is_empty());

    engine.restore_backup(&ctx(), &record.filename).await.unwrap();
    assert_eq!(
        rows_of(engine.store(), "t").await,
        vec![
            vec![Value::Int(1), Value::Text("a".into())],
            vec![Value::Int(2), Value::Text("b".into())],
        ]
    );
}

/// Values containing the statement terminator, quotes, and newlines must
/// survive a dump/restore cycle unchanged.
#[tokio::test]
async fn round_trip_preserves_hostile_values() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::in_memory();
    store
        .execute_in_transaction(&[
            "CREATE TABLE \"m\" (\"id\" INT, \"body\" TEXT)".to_string(),
        ])
        .await
        .unwrap();
    let hostile = "it's; DROP TABLE \"m\"; -- \nsecond line";
    store
        .execute_in_transaction(&[format!(
            "INSERT INTO \"m\" (\"id\", \"body\") VALUES (1, '{}'), (2, NULL)",
            hostile.replace('\'', "''")
        )])
        .await
        .unwrap();
    let engine = BackupEngine::new(store, dir.path()).unwrap();

    let record = engine.trigger_backup(&ctx(), None).await.unwrap();
    engine
        .store()
        .execute_in_transaction(&["DELETE FROM \"m\"".to_string()])
        .await
        .unwrap();
    engine.restore_backup(&ctx(), &record.filename).await.unwrap();

    assert_eq!(
        rows_of(engine.store(), "m").await,
        vec![
            vec![Value::Int(1), Value::Text(hostile.into())],
            vec![Value::Int(2), Value::Null],
        ]
    );
}

/// Table names containing quotes and semicolons are legal in the store, so
/// the engine must be able to replay its own dumps of them: the statement
/// splitter has to treat a quoted identifier as opaque.
#[tokio::test]
async fn round_trip_preserves_hostile_identifiers() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::in_memory();
    store
        .execute_in_transaction(&[
            "CREATE TABLE \"it's\" (\"id\" INT)".to_string(),
            "CREATE TABLE \"a;b\" (\"id\" INT)".to_string(),
            "INSERT INTO \"it's\" (\"id\") VALUES (1)".to_string(),
            "INSERT INTO \"a;b\" (\"id\") VALUES (2)".to_string(),
        ])
        .await
        .unwrap();
    let engine = BackupEngine::new(store, dir.path()).unwrap();

    let record = engine.trigger_backup(&ctx(), None).await.unwrap();
    engine
        .store()
        .execute_in_transaction(&[
            "DROP TABLE \"it's\"".to_string(),
            "DROP TABLE \"a;b\"".to_string(),
        ])
        .await
        .unwrap();
    engine.restore_backup(&ctx(), &record.filename).await.unwrap();

    let view = engine.store().read_view().await.unwrap();
    assert_eq!(view.list_tables(), vec!["a;b".to_string(), "it's".to_string()]);
    assert_eq!(rows_of(engine.store(), "it's").await, vec![vec![Value::Int(1)]]);
    assert_eq!(rows_of(engine.store(), "a;b").await, vec![vec![Value::Int(2)]]);
}

/// Restoring the same file twice yields the same state,
/// because every table block drops and recreates its table.
#[tokio::test]
async fn restore_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_seed(&dir).await;
    let record = engine.trigger_backup(&ctx(), None).await.unwrap();

    engine.restore_backup(&ctx(), &record.filename).await.unwrap();
    let first = rows_of(engine.store(), "t").await;
    engine.restore_backup(&ctx(), &record.filename).await.unwrap();
    assert_eq!(rows_of(engine.store(), "t").await, first);
    assert_eq!(first.len(), 2);
}

/// Traversal attempts and foreign names return
/// ValidationError and touch neither the filesystem nor the store.
#[tokio::test]
async fn malformed_filenames_are_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_seed(&dir).await;

    for bad in ["../../etc/passwd", "notabackup.sql"] {
        assert!(matches!(
            engine.delete_backup(&ctx(), bad).await,
            Err(BackupError::Validation(_))
        ));
        assert!(matches!(
            engine.restore_backup(&ctx(), bad).await,
            Err(BackupError::Validation(_))
        ));
    }

    // No snapshot was taken and no file was created.
    assert!(engine.list_backups().await.unwrap().is_empty());
    assert_eq!(rows_of(engine.store(), "t").await.len(), 2);
}

/// Restoring a well-formed name that does not exist returns NotFound, but
/// only after the safety snapshot has been captured, because the snapshot
/// runs before the catalog read.
#[tokio::test]
async fn missing_backup_returns_not_found_after_snapshot() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_seed(&dir).await;

    let err = engine
        .restore_backup(&ctx(), "backup_2026-01-01_00-00-00.sql")
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::NotFound(_)));

    let records = engine.list_backups().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, BackupKind::PreRestore);
}

/// After any restore call a fresh
/// auto-snapshot exists, and that snapshot is itself restorable.
#[tokio::test]
async fn safety_snapshot_exists_and_is_restorable() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_seed(&dir).await;
    let record = engine.trigger_backup(&ctx(), None).await.unwrap();
    engine.restore_backup(&ctx(), &record.filename).await.unwrap();

    let snapshot = engine
        .list_backups()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.kind == BackupKind::PreRestore)
        .expect("auto-snapshot missing");

    // Mutate, then restore from the snapshot itself.
    engine
        .store()
        .execute_in_transaction(&["DELETE FROM \"t\" WHERE \"id\" = 1".to_string()])
        .await
        .unwrap();
    engine.restore_backup(&ctx(), &snapshot.filename).await.unwrap();
    assert_eq!(rows_of(engine.store(), "t").await.len(), 2);
}

/// Backups taken within the same second never share a filename: the later
/// one takes the next free timestamp instead of overwriting, so an existing
/// script is immutable for its whole life.
#[tokio::test]
async fn same_second_backups_never_overwrite_each_other() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_seed(&dir).await;

    let a = engine.trigger_backup(&ctx(), Some("first")).await.unwrap();
    let b = engine.trigger_backup(&ctx(), Some("second")).await.unwrap();
    assert_ne!(a.filename, b.filename);
    assert_eq!(engine.list_backups().await.unwrap().len(), 2);

    // Two immediate restores file two distinct safety snapshots; the second
    // snapshot must not clobber the first.
    engine.restore_backup(&ctx(), &a.filename).await.unwrap();
    engine.restore_backup(&ctx(), &b.filename).await.unwrap();
    let snapshots: Vec<_> = engine
        .list_backups()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.kind == BackupKind::PreRestore)
        .collect();
    assert_eq!(snapshots.len(), 2);
    assert_ne!(snapshots[0].filename, snapshots[1].filename);
}

/// If the N-th statement of a script is invalid, nothing from
/// that script is observable afterwards.
#[tokio::test]
async fn failed_restore_rolls_back_completely() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_seed(&dir).await;

    // A validly named script whose last statement is garbage.
    let filename = "backup_2026-08-23_10-00-00.sql";
    let script = "SET FOREIGN_KEY_CHECKS = 0;\n\
                  START TRANSACTION;\n\
                  DROP TABLE IF EXISTS \"t\";\n\
                  CREATE TABLE \"t\" (\"id\" INT, \"name\" TEXT);\n\
                  INSERT INTO \"t\" (\"id\", \"name\") VALUES (9, 'ghost');\n\
                  THIS IS NOT SQL;\n";
    std::fs::write(dir.path().join(filename), script).unwrap();

    let before = rows_of(engine.store(), "t").await;
    let err = engine.restore_backup(&ctx(), filename).await.unwrap_err();
    match err {
        BackupError::Restore { statement, .. } => assert_eq!(statement, 6),
        other => panic!("expected Restore error, got {other:?}"),
    }

    // The dropped/recreated/ghost-row state from earlier statements must not
    // be visible: the store matches its pre-restore state exactly.
    assert_eq!(rows_of(engine.store(), "t").await, before);
}

/// Listing returns exactly the pattern-matching files, newest first,
/// with sizes from the filesystem.
#[tokio::test]
async fn listing_reflects_catalog_contents() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_seed(&dir).await;

    let first = engine.trigger_backup(&ctx(), Some("one")).await.unwrap();
    std::fs::write(dir.path().join("stray.sql"), "SELECT 1;").unwrap();

    let records = engine.list_backups().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, first.filename);
    let on_disk = std::fs::metadata(dir.path().join(&first.filename)).unwrap().len();
    assert_eq!(records[0].size_bytes, on_disk);

    engine.delete_backup(&ctx(), &first.filename).await.unwrap();
    assert!(engine.list_backups().await.unwrap().is_empty());
    // The stray file is untouched by catalog operations.
    assert!(dir.path().join("stray.sql").exists());
}

/// Deleting one backup never affects the others.
#[tokio::test]
async fn delete_is_scoped_to_one_backup() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_seed(&dir).await;

    let a = engine.trigger_backup(&ctx(), Some("a")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let b = engine.trigger_backup(&ctx(), Some("b")).await.unwrap();
    assert_ne!(a.filename, b.filename);

    engine.delete_backup(&ctx(), &a.filename).await.unwrap();
    let remaining = engine.list_backups().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].filename, b.filename);

    assert!(matches!(
        engine.delete_backup(&ctx(), &a.filename).await,
        Err(BackupError::NotFound(_))
    ));
}

/// Dumps of a multi-table store replay table blocks in the order they were
/// written (the view's stable order).
#[tokio::test]
async fn multi_table_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::in_memory();
    store
        .execute_in_transaction(&[
            "CREATE TABLE \"projects\" (\"id\" INT, \"title\" TEXT)".to_string(),
            "CREATE TABLE \"tasks\" (\"id\" INT, \"project_id\" INT, \"note\" TEXT)".to_string(),
            "INSERT INTO \"projects\" (\"id\", \"title\") VALUES (1, 'launch')".to_string(),
            "INSERT INTO \"tasks\" (\"id\", \"project_id\", \"note\") VALUES (1, 1, NULL)".to_string(),
        ])
        .await
        .unwrap();
    let engine = BackupEngine::new(store, dir.path()).unwrap();

    let record = engine.trigger_backup(&ctx(), None).await.unwrap();
    engine
        .store()
        .execute_in_transaction(&[
            "DROP TABLE \"projects\"".to_string(),
            "DROP TABLE \"tasks\"".to_string(),
        ])
        .await
        .unwrap();

    engine.restore_backup(&ctx(), &record.filename).await.unwrap();
    let view = engine.store().read_view().await.unwrap();
    assert_eq!(view.list_tables(), vec!["projects".to_string(), "tasks".to_string()]);
    assert_eq!(rows_of(engine.store(), "tasks").await, vec![vec![
        Value::Int(1),
        Value::Int(1),
        Value::Null,
    ]]);
}
