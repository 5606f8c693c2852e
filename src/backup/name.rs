//! Backup naming: the single boundary where filenames are parsed.
//!
//! A backup filename doubles as its identifier, so it is the one external
//! input that must never reach the filesystem unchecked. All operations
//! therefore parse incoming names into a [`BackupName`] exactly once, here;
//! everything downstream works with the typed value and never with a raw
//! string. A name that does not parse cannot name a file outside the
//! catalog directory; there is no code path that opens one.

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use std::fmt;

use super::error::{BackupError, BackupResult};

/// File extension shared by all backup scripts.
const EXTENSION: &str = ".sql";
/// Filename prefix for operator-triggered backups.
const MANUAL_PREFIX: &str = "backup_";
/// Filename prefix for automatic pre-restore snapshots.
const PRE_RESTORE_PREFIX: &str = "backup_before_restore_";
/// Timestamp layout embedded in filenames.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Distinguishes operator-triggered backups from automatic safety snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BackupKind {
    /// A backup explicitly requested by an operator.
    Manual,
    /// The automatic snapshot captured immediately before a restore.
    PreRestore,
}

/// A validated backup identity: kind plus second-resolution timestamp.
///
/// Can only be obtained by generating a fresh name ([`BackupName::now`]) or
/// by parsing an externally supplied filename ([`BackupName::parse`]), so
/// holding one is proof the name is well-formed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupName {
    kind: BackupKind,
    timestamp: NaiveDateTime,
}

impl BackupName {
    /// Creates a name of the given kind stamped with the given local time.
    pub fn at(kind: BackupKind, timestamp: NaiveDateTime) -> Self {
        Self { kind, timestamp }
    }

    /// Creates a name of the given kind stamped with the current local time.
    pub fn now(kind: BackupKind) -> Self {
        // Truncate to whole seconds: that is all the filename can carry.
        let now = chrono::Local::now().naive_local();
        let ts = now.with_nanosecond(0).unwrap_or(now);
        Self { kind, timestamp: ts }
    }

    /// Parses an externally supplied filename.
    ///
    /// Accepts exactly `backup_<YYYY-MM-DD_HH-mm-ss>.sql` and
    /// `backup_before_restore_<YYYY-MM-DD_HH-mm-ss>.sql`; anything else is a
    /// `Validation` error. Path separators, traversal sequences, and foreign
    /// extensions all fail the pattern, which closes the path-traversal
    /// avenue before any filesystem call is made.
    pub fn parse(filename: &str) -> BackupResult<Self> {
        let stem = filename
            .strip_suffix(EXTENSION)
            .ok_or_else(|| BackupError::validation(filename))?;

        // The pre-restore prefix also starts with the manual prefix, so it
        // must be tried first.
        let (kind, raw_ts) = if let Some(ts) = stem.strip_prefix(PRE_RESTORE_PREFIX) {
            (BackupKind::PreRestore, ts)
        } else if let Some(ts) = stem.strip_prefix(MANUAL_PREFIX) {
            (BackupKind::Manual, ts)
        } else {
            return Err(BackupError::validation(filename));
        };

        let timestamp = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT)
            .map_err(|_| BackupError::validation(filename))?;

        // parse_from_str tolerates nothing extra, but make the invariant
        // explicit: the parsed name must render back to the exact input.
        let name = Self { kind, timestamp };
        if name.to_string() != filename {
            return Err(BackupError::validation(filename));
        }
        Ok(name)
    }

    /// The same kind stamped one second later. Filenames carry
    /// second-resolution timestamps, so this is the next name that can
    /// possibly be free when the current one is already taken.
    pub fn next_second(&self) -> Self {
        Self { kind: self.kind, timestamp: self.timestamp + chrono::Duration::seconds(1) }
    }

    /// The backup kind encoded in the name.
    pub fn kind(&self) -> BackupKind {
        self.kind
    }

    /// The creation timestamp encoded in the name.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

impl fmt::Display for BackupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            BackupKind::Manual => MANUAL_PREFIX,
            BackupKind::PreRestore => PRE_RESTORE_PREFIX,
        };
        write!(f, "{}{}{}", prefix, self.timestamp.format(TIMESTAMP_FORMAT), EXTENSION)
    }
}

/// A catalog listing entry: a derived, read-only view over one backup file.
///
/// Never persisted independently; size and modification time are read
/// straight from filesystem metadata each time the catalog lists.
#[derive(Clone, Debug, Serialize)]
pub struct BackupRecord {
    /// The backup's filename (also its identifier).
    pub filename: String,
    /// The backup kind parsed from the filename.
    pub kind: BackupKind,
    /// Creation time, from filesystem metadata.
    pub created_at: chrono::DateTime<chrono::Local>,
    /// File size in bytes, from filesystem metadata.
    pub size_bytes: u64,
}
