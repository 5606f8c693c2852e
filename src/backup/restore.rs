//! Safety snapshots and transactional script replay.
//!
//! One restore moves through `Validating → Snapshotting → Reading →
//! Replaying → {Committed | RolledBack}`. Validation happens before this
//! module is reached (filenames arrive as parsed [`BackupName`]s), and any
//! failure before Replaying terminates with the store untouched, because no
//! transaction has been opened yet.

use tracing::{info, warn};

use crate::store::Store;

use super::catalog::BackupCatalog;
use super::dump;
use super::error::{BackupError, BackupResult};
use super::name::{BackupKind, BackupName, BackupRecord};
use super::script;

/// Description recorded in the header of every automatic snapshot.
const SNAPSHOT_DESCRIPTION: &str = "automatic snapshot before restore";

/// Captures the unconditional pre-restore safety dump.
///
/// This is a normal dump with the reserved description and the
/// `backup_before_restore_` naming convention, so the snapshot is itself
/// independently restorable. A failure is reported as `Snapshot` and blocks
/// the restore that requested it: proceeding without a fresh fallback would
/// turn a bad script into unrecoverable data loss.
pub async fn snapshot_before_restore<S: Store>(
    store: &S,
    catalog: &BackupCatalog,
) -> BackupResult<BackupRecord> {
    match dump::generate(store, catalog, BackupKind::PreRestore, SNAPSHOT_DESCRIPTION).await {
        Ok(record) => Ok(record),
        Err(e) => {
            warn!(error = %e, "safety snapshot failed; restore will not proceed");
            Err(BackupError::snapshot(e.to_string()))
        }
    }
}

/// Replays the named script against the live store, atomically.
///
/// ## Steps
/// 1. Capture the safety snapshot (failure blocks the restore).
/// 2. Read the full script from the catalog.
/// 3. Recover individual statements with the quote-aware splitter.
/// 4. Replay every statement, in file order, inside one store transaction.
///
/// On any statement failure the store rolls the transaction back and the
/// error names the statement; the store is then exactly as it was before the
/// restore attempt began.
pub async fn restore<S: Store>(
    store: &S,
    catalog: &BackupCatalog,
    name: &BackupName,
) -> BackupResult<()> {
    let snapshot = snapshot_before_restore(store, catalog).await?;
    info!(snapshot = %snapshot.filename, "safety snapshot captured");

    let text = catalog.read(name).await?;
    let statements = script::split_statements(&text);
    if statements.is_empty() {
        return Err(BackupError::Restore {
            statement: 0,
            detail: "script contains no statements".to_string(),
        });
    }

    store
        .execute_in_transaction(&statements)
        .await
        .map_err(|e| to_restore_error(&e))?;

    info!(backup = %name, statements = statements.len(), "restore committed");
    Ok(())
}

/// Maps a store transaction failure to `Restore`, recovering the 1-based
/// statement position from the context the store attaches.
fn to_restore_error(err: &anyhow::Error) -> BackupError {
    let detail = format!("{:#}", err);
    let statement = detail
        .strip_prefix("statement ")
        .and_then(|rest| rest.split(':').next())
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);
    BackupError::Restore { statement, detail }
}
