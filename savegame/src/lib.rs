//! Savegame persistence for the world server.
//!
//! A single SQLite file holds five tables: `chunk`, `mapchunk`, `mapregion`,
//! `playerdata` and `gamedata`. Every table carries a `last_updated` column
//! (epoch seconds, indexed) that each write stamps, so an external backup tool
//! can copy only rows changed since its previous run.
//!
//! Opening a savegame read-write creates missing tables and migrates older
//! files in place before any write statement is prepared. See
//! [`SqliteGameDb::open_or_create`].

/// Full-file snapshots through SQLite's online backup API.
pub mod backup;

/// Open-time settings ([`StoreConfig`]), optionally from `SAVEGAME_*` env vars.
pub mod config;

/// The [`GameDatabaseConnection`] capability handed to the host.
pub mod connection;

pub mod error;

mod integrity;

/// Lazy full-table scans ([`ChunkRows`]).
pub mod rows;

/// Table definitions and the `last_updated` migration.
pub mod schema;

pub mod store;

pub use backup::BackupOutcome;
pub use config::StoreConfig;
pub use connection::GameDatabaseConnection;
pub use error::{Result, StoreError};
pub use rows::ChunkRows;
pub use schema::ChunkTable;
pub use store::SqliteGameDb;
pub use world_core::types::{ChunkPos, DbChunk};
