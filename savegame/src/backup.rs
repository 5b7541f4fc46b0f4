//! Full-file snapshot of the live savegame via SQLite's online backup API.
//!
//! This always copies every page. Incremental backup tools select rows by
//! `last_updated` instead (see [`SqliteGameDb::chunks_updated_since`]).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use rusqlite::backup::Backup;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::store::SqliteGameDb;

/// Copy every page in one step.
const ALL_PAGES: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// Snapshot written to this path.
    Written(PathBuf),
    /// Destination was the live database; nothing was touched.
    RefusedLiveDatabase,
}

impl SqliteGameDb {
    /// Snapshot the live database to `destination`.
    ///
    /// Relative destinations land in the configured backups directory. An
    /// existing file is overwritten. Pointing at the live database itself is
    /// refused with a logged error and no file changes.
    pub fn create_backup(&self, destination: impl AsRef<Path>) -> Result<BackupOutcome> {
        let destination = self.config().backups_dir.join(destination.as_ref());

        if is_same_file(&destination, self.path()) {
            log::error!("Cannot overwrite current running database. Choose another destination.");
            return Ok(BackupOutcome::RefusedLiveDatabase);
        }

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        if destination.exists() {
            log::warn!("File {} exists. Overwriting file.", destination.display());
        }

        let mut target = Connection::open(&destination)?;
        target.execute_batch("PRAGMA journal_mode = OFF;")?;

        self.with_conn(|conn| {
            let backup = Backup::new(conn, &mut target)?;
            backup.run_to_completion(ALL_PAGES, Duration::ZERO, None)?;
            Ok(())
        })?;

        target.close().map_err(|(_, err)| StoreError::Sql(err))?;

        log::info!(
            "Backed up {} to {}",
            self.path().display(),
            destination.display()
        );
        Ok(BackupOutcome::Written(destination))
    }

    /// `<stem>-<YYYY-MM-DD_HH-MM-SS>.<ext>` for the live file, local time.
    pub fn default_backup_filename(&self) -> String {
        backup_filename_at(self.path(), Local::now().naive_local())
    }
}

fn backup_filename_at(live: &Path, at: chrono::NaiveDateTime) -> String {
    let stem = live
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "savegame".to_string());
    let stamp = at.format("%Y-%m-%d_%H-%M-%S");

    match live.extension() {
        Some(ext) => format!("{stem}-{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{stamp}"),
    }
}

/// A destination that does not exist yet cannot be the live file.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
