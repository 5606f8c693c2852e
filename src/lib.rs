//! # workhub-backup - Backup and Restore Engine for the Workhub Store
//!
//! This crate exports an entire relational store into a portable, replayable
//! SQL script and can later replay such a script to reconstruct state,
//! automatically protecting the current state with a safety snapshot before
//! any destructive replay. Features:
//! - **Lossless dumps**: schema and rows serialized through the engine's own
//!   escaping primitive, one INSERT per row, NULL-aware
//! - **Atomic restore**: the whole script replays inside one store
//!   transaction, with full rollback on any statement failure
//! - **Safety snapshots**: every restore is preceded by an unconditional
//!   automatic dump, filed under its own naming convention
//! - **Strict naming boundary**: backup filenames are parsed exactly once;
//!   anything outside the `backup_*.sql` pattern never reaches the
//!   filesystem
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ BackupEngine │────▶│ Dump Generator │────▶│  Serializer  │
//! │   (facade)   │     │  (read view)   │     │  (script.rs) │
//! └──────┬───────┘     └───────┬────────┘     └──────────────┘
//!        │                     │
//!        │             ┌───────▼────────┐     ┌──────────────┐
//!        └────────────▶│ BackupCatalog  │     │    Store     │
//!                      │  (directory)   │     │ (trait, txn) │
//!                      └────────────────┘     └──────────────┘
//! ```
//!
//! The store is an explicit, injected handle (`store::Store`); the bundled
//! `store::MemoryStore` backs the operator CLI and the tests. Authorization
//! is out of scope: callers pass an `OperatorContext` that the engine only
//! logs.
//!
//! ## Usage Example
//!
//! ```no_run
//! use workhub_backup::backup::{BackupEngine, OperatorContext};
//! use workhub_backup::store::MemoryStore;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let store = MemoryStore::open("./data/store.json")?;
//! let engine = BackupEngine::new(store, "./data/backups")?;
//! let ctx = OperatorContext::new("admin");
//!
//! let record = engine.trigger_backup(&ctx, Some("before migration")).await?;
//! engine.restore_backup(&ctx, &record.filename).await?;
//! # Ok(())
//! # }
//! ```

/// Backup engine: dump generation, catalog, safety snapshots, restore
pub mod backup;

/// Store layer: value model, escaping primitives, store traits, MemoryStore
pub mod store;

pub use backup::{BackupEngine, BackupError, BackupKind, BackupRecord, OperatorContext};
pub use store::{MemoryStore, Store, Value};
