//! The backup engine: dump generation, the backup catalog, safety
//! snapshots, and transactional restore.
//!
//! [`BackupEngine`] is the facade the surrounding application calls. It owns
//! a [`BackupCatalog`] directory and an injected store handle, and exposes
//! the four operator-facing operations: trigger a backup, list backups,
//! delete a backup, restore a backup. Filenames received from outside are
//! parsed exactly once, at this boundary, into [`BackupName`]s.
//!
//! Authorization is explicitly not this module's concern: callers pass an
//! [`OperatorContext`] naming the already-authorized operator, which the
//! engine only records in its structured logs.

mod catalog;
mod dump;
mod error;
mod name;
mod restore;
mod script;

pub use catalog::BackupCatalog;
pub use error::{BackupError, BackupResult};
pub use name::{BackupKind, BackupName, BackupRecord};
pub use script::split_statements;

use std::path::PathBuf;

use tracing::info;

use crate::store::Store;

/// Identifies the already-authorized operator on whose behalf an operation
/// runs. The capability check itself happens outside the backup engine; this
/// context exists so every destructive action is attributable in the logs.
#[derive(Clone, Debug)]
pub struct OperatorContext {
    operator: String,
}

impl OperatorContext {
    /// Creates a context for the named operator.
    pub fn new(operator: impl Into<String>) -> Self {
        Self { operator: operator.into() }
    }

    /// The operator's name, for logging and audit.
    pub fn operator(&self) -> &str {
        &self.operator
    }
}

/// The backup/restore engine over an injected store.
///
/// Every operation executes synchronously within the call that triggered it:
/// the caller awaits the full duration of dump generation or script replay,
/// and there is no background worker and no cancellation once a replay's
/// transaction is open. Atomicity and isolation of a single restore are
/// delegated to the store's own transaction.
pub struct BackupEngine<S: Store> {
    store: S,
    catalog: BackupCatalog,
}

impl<S: Store> BackupEngine<S> {
    /// Creates an engine over the given store, keeping backups in `dir`
    /// (created if absent).
    pub fn new<P: Into<PathBuf>>(store: S, dir: P) -> BackupResult<Self> {
        let catalog = BackupCatalog::open(dir)?;
        Ok(Self { store, catalog })
    }

    /// The store this engine operates on.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The catalog this engine files backups in.
    pub fn catalog(&self) -> &BackupCatalog {
        &self.catalog
    }

    /// Produces a manual backup of the entire store.
    ///
    /// The optional description is recorded in the script header. Backups
    /// never mutate the store; a `Generation` failure leaves both the store
    /// and all existing backups untouched.
    pub async fn trigger_backup(
        &self,
        ctx: &OperatorContext,
        description: Option<&str>,
    ) -> BackupResult<BackupRecord> {
        info!(operator = %ctx.operator(), "backup requested");
        dump::generate(
            &self.store,
            &self.catalog,
            BackupKind::Manual,
            description.unwrap_or(""),
        )
        .await
    }

    /// Lists all backups in the catalog, newest first.
    pub async fn list_backups(&self) -> BackupResult<Vec<BackupRecord>> {
        self.catalog.list().await
    }

    /// Deletes one backup by filename.
    ///
    /// The filename is validated against the backup naming pattern before
    /// any filesystem access; a name that does not parse is rejected with
    /// `Validation` and nothing is touched.
    pub async fn delete_backup(&self, ctx: &OperatorContext, filename: &str) -> BackupResult<()> {
        let name = BackupName::parse(filename)?;
        self.catalog.delete(&name).await?;
        info!(operator = %ctx.operator(), backup = %name, "backup deleted");
        Ok(())
    }

    /// Restores the store from one backup by filename.
    ///
    /// A fresh safety snapshot is captured unconditionally before the replay
    /// begins; if the snapshot fails, the restore is blocked and the store
    /// is untouched. The replay itself is all-or-nothing: on any statement
    /// failure the store's transaction rolls back and the returned `Restore`
    /// error carries the failing statement's detail.
    pub async fn restore_backup(&self, ctx: &OperatorContext, filename: &str) -> BackupResult<()> {
        let name = BackupName::parse(filename)?;
        info!(operator = %ctx.operator(), backup = %name, "restore requested");
        restore::restore(&self.store, &self.catalog, &name).await
    }
}
