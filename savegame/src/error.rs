use std::path::PathBuf;

use thiserror::Error;

/// Where to point players once automated repair has given up.
pub const REPAIR_GUIDE: &str =
    "https://wiki.vintagestory.at/index.php/Repairing_a_corrupt_savegame_or_worldmap";

/// Errors surfaced by the savegame store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file could not be opened in the requested access mode.
    #[error("cannot open savegame database {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    /// Integrity check still failing after the single repair attempt.
    #[error("savegame database integrity bad: {0}. See {REPAIR_GUIDE}")]
    DatabaseIntegrity(String),
    /// Adding the `last_updated` column or its index failed.
    #[error("migrating table {table} failed: {source}")]
    Migration {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("savegame database is closed")]
    Closed,
    #[error("savegame database is opened read-only")]
    ReadOnly,
}

pub type Result<T> = std::result::Result<T, StoreError>;
