//! The backup catalog: a directory of dump scripts.
//!
//! Every file the catalog touches is addressed by a parsed [`BackupName`],
//! never by a raw string, so by the time a request reaches this module it
//! can only name a well-formed `backup_*.sql` file directly inside the
//! catalog directory. Unrelated files that happen to live there are
//! invisible to `list` and unreachable by `read`/`delete`.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use tokio::fs as tfs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::error::{BackupError, BackupResult};
use super::name::{BackupName, BackupRecord};

/// Filesystem-backed directory of backup scripts.
pub struct BackupCatalog {
    /// Directory containing all backup files
    dir: PathBuf,
}

impl BackupCatalog {
    /// Opens the catalog over the given directory, creating it if needed.
    pub fn open<P: Into<PathBuf>>(dir: P) -> BackupResult<Self> {
        let dir: PathBuf = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| BackupError::generation(format!("create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    /// The directory this catalog manages.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_of(&self, name: &BackupName) -> PathBuf {
        self.dir.join(name.to_string())
    }

    /// Lists all backups, newest first.
    ///
    /// Returns exactly the directory entries whose names parse as backup
    /// names; anything else is skipped with a warning. Size and creation
    /// time are read straight from filesystem metadata.
    pub async fn list(&self) -> BackupResult<Vec<BackupRecord>> {
        let mut entries = tfs::read_dir(&self.dir)
            .await
            .map_err(|e| BackupError::generation(format!("read {}: {}", self.dir.display(), e)))?;

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BackupError::generation(e.to_string()))?
        {
            let filename = entry.file_name().to_string_lossy().into_owned();
            let name = match BackupName::parse(&filename) {
                Ok(name) => name,
                Err(_) => {
                    warn!(%filename, "skipping foreign file in backup directory");
                    continue;
                }
            };
            let meta = entry
                .metadata()
                .await
                .map_err(|e| BackupError::generation(format!("{}: {}", filename, e)))?;
            let created_at: DateTime<Local> = meta
                .modified()
                .map(DateTime::<Local>::from)
                .unwrap_or_else(|_| Local::now());
            records.push(BackupRecord {
                filename,
                kind: name.kind(),
                created_at,
                size_bytes: meta.len(),
            });
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.filename.cmp(&a.filename)));
        Ok(records)
    }

    /// Reads the full script for the named backup.
    pub async fn read(&self, name: &BackupName) -> BackupResult<String> {
        let path = self.path_of(name);
        match tfs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BackupError::not_found(name.to_string()))
            }
            Err(e) => Err(BackupError::generation(format!("{}: {}", name, e))),
        }
    }

    /// Whether a script with this name is already filed.
    pub async fn exists(&self, name: &BackupName) -> bool {
        tfs::metadata(self.path_of(name)).await.is_ok()
    }

    /// Writes a new script under the given name and returns its record.
    ///
    /// Scripts are immutable once written: if the name is already taken the
    /// write is refused and the existing file stays untouched. Callers pick
    /// an unused name first (see [`BackupCatalog::exists`]).
    pub async fn write(&self, name: &BackupName, contents: &str) -> BackupResult<BackupRecord> {
        let path = self.path_of(name);
        let mut file = tfs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    BackupError::generation(format!("{}: a backup with this name already exists", name))
                }
                _ => BackupError::generation(format!("write {}: {}", name, e)),
            })?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| BackupError::generation(format!("write {}: {}", name, e)))?;
        let meta = tfs::metadata(&path)
            .await
            .map_err(|e| BackupError::generation(format!("{}: {}", name, e)))?;
        let created_at = meta
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());
        Ok(BackupRecord {
            filename: name.to_string(),
            kind: name.kind(),
            created_at,
            size_bytes: meta.len(),
        })
    }

    /// Deletes the named backup. Unrelated backups are never affected.
    pub async fn delete(&self, name: &BackupName) -> BackupResult<()> {
        let path = self.path_of(name);
        match tfs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BackupError::not_found(name.to_string()))
            }
            Err(e) => Err(BackupError::generation(format!("delete {}: {}", name, e))),
        }
    }
}
