//! Dump generation: serializing the whole store into one replayable script.

use tracing::info;

use crate::store::{ReadView, Store};

use super::catalog::BackupCatalog;
use super::error::{BackupError, BackupResult};
use super::name::{BackupKind, BackupName, BackupRecord};
use super::script;

/// Produces a complete dump script for the live store and files it in the
/// catalog under a fresh name of the given kind.
///
/// ## Algorithm
/// 1. Pick the first unused name of the given kind, starting from the
///    current second. An existing script is never overwritten: a dump in
///    the same second as an earlier one takes the next free timestamp.
/// 2. Capture one consistent read view of the store; every table in the
///    script reflects the same instant.
/// 3. Enumerate tables in the view's stable order. For each, fetch the
///    store's own create statement and its rows in storage order, and feed
///    both through the script serializer.
/// 4. Wrap the concatenation with the metadata header and the transactional
///    preamble/postamble, then write the whole script through the catalog.
///
/// Backups are read-only with respect to the store: any failure here leaves
/// the store entirely untouched and is reported as `Generation`.
pub async fn generate<S: Store>(
    store: &S,
    catalog: &BackupCatalog,
    kind: BackupKind,
    description: &str,
) -> BackupResult<BackupRecord> {
    let mut name = BackupName::now(kind);
    while catalog.exists(&name).await {
        name = name.next_second();
    }
    let view = store
        .read_view()
        .await
        .map_err(|e| BackupError::generation(format!("{:#}", e)))?;

    let mut body = String::new();
    let tables = view.list_tables();
    let mut total_rows = 0usize;
    for table in &tables {
        let create = view
            .get_create_statement(table)
            .map_err(|e| BackupError::generation(format!("{:#}", e)))?;
        let (columns, rows) = view
            .stream_rows(table)
            .map_err(|e| BackupError::generation(format!("{:#}", e)))?;
        total_rows += rows.len();

        body.push('\n');
        body.push_str(&script::render_schema_block(table, &create));
        body.push_str(
            &script::render_data_block(table, &columns, &rows)
                .map_err(|e| BackupError::generation(format!("{:#}", e)))?,
        );
    }

    let mut text = script::render_header(description, name.timestamp());
    text.push_str(script::PREAMBLE);
    text.push_str(&body);
    text.push('\n');
    text.push_str(script::POSTAMBLE);

    let record = catalog.write(&name, &text).await?;
    info!(
        backup = %record.filename,
        tables = tables.len(),
        rows = total_rows,
        size_bytes = record.size_bytes,
        "dump generated"
    );
    Ok(record)
}
