//! Table definitions and the in-place `last_updated` migration.
//!
//! Older savegames predate the `last_updated` column. Opening one read-write
//! adds the column (defaulting existing rows to 0) and its index, without
//! rebuilding any table.

use rusqlite::Connection;
use world_core::types::ChunkPos;

use crate::error::{Result, StoreError};

/// Tables that store [`world_core::types::DbChunk`]-shaped rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkTable {
    Chunk,
    MapChunk,
    MapRegion,
}

impl ChunkTable {
    pub const ALL: [ChunkTable; 3] = [
        ChunkTable::Chunk,
        ChunkTable::MapChunk,
        ChunkTable::MapRegion,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ChunkTable::Chunk => "chunk",
            ChunkTable::MapChunk => "mapchunk",
            ChunkTable::MapRegion => "mapregion",
        }
    }

    /// Whether rows are keyed per column rather than per chunk.
    pub const fn is_columnar(self) -> bool {
        matches!(self, ChunkTable::MapChunk | ChunkTable::MapRegion)
    }

    /// Save key for `pos` in this table; columnar tables ignore `pos.y`.
    pub const fn key_for(self, pos: ChunkPos) -> u64 {
        if self.is_columnar() {
            pos.column().to_chunk_index()
        } else {
            pos.to_chunk_index()
        }
    }

    pub(crate) fn upsert_sql(self) -> String {
        format!(
            "INSERT OR REPLACE INTO {} (position, data, last_updated) \
             VALUES (?1, ?2, unixepoch('now'))",
            self.name()
        )
    }
}

/// Every table carrying a `last_updated` column, in migration order.
pub const LAST_UPDATED_TABLES: [&str; 5] = [
    "chunk",
    "mapchunk",
    "mapregion",
    "playerdata",
    "gamedata",
];

pub const LAST_UPDATED_COLUMN: &str = "last_updated";

const CREATE_TABLES_SQL: &str = "
    CREATE TABLE IF NOT EXISTS chunk (
        position INTEGER PRIMARY KEY,
        data BLOB,
        last_updated INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS mapchunk (
        position INTEGER PRIMARY KEY,
        data BLOB,
        last_updated INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS mapregion (
        position INTEGER PRIMARY KEY,
        data BLOB,
        last_updated INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS gamedata (
        savegameid INTEGER PRIMARY KEY,
        data BLOB,
        last_updated INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS playerdata (
        playerid INTEGER PRIMARY KEY AUTOINCREMENT,
        playeruid TEXT,
        data BLOB,
        last_updated INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS index_playeruid ON playerdata(playeruid);
";

/// Create all five tables and the `playeruid` index when missing.
///
/// Existing tables are left untouched, including legacy ones without
/// `last_updated`; [`ensure_last_updated_column`] handles those.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES_SQL)?;
    Ok(())
}

/// Add `last_updated` and `index_<table>_last_updated` wherever missing.
///
/// Safe to run any number of times. Returns the tables that gained the column
/// on this call. A failure leaves that table untouched and is fatal: write
/// statements bind to `last_updated`.
pub fn ensure_last_updated_column(conn: &mut Connection) -> Result<Vec<&'static str>> {
    let mut altered = Vec::new();

    for table in LAST_UPDATED_TABLES {
        let tx = conn
            .transaction()
            .map_err(|source| StoreError::Migration { table, source })?;

        if has_column(&tx, table, LAST_UPDATED_COLUMN)
            .map_err(|source| StoreError::Migration { table, source })?
        {
            log::info!("Found existing last_updated column on {table}");
        } else {
            log::info!("Adding last_updated column to {table}");
            tx.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN last_updated INTEGER NOT NULL DEFAULT 0;"
            ))
            .map_err(|source| StoreError::Migration { table, source })?;
            altered.push(table);
        }

        // Tables created fresh already have the column but still need the index.
        if !has_index(&tx, &last_updated_index(table))
            .map_err(|source| StoreError::Migration { table, source })?
        {
            log::info!("Adding last_updated index to {table}");
            tx.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {index} ON {table}(last_updated);",
                index = last_updated_index(table)
            ))
            .map_err(|source| StoreError::Migration { table, source })?;
        }

        tx.commit()
            .map_err(|source| StoreError::Migration { table, source })?;
    }

    Ok(altered)
}

pub fn last_updated_index(table: &str) -> String {
    format!("index_{table}_last_updated")
}

pub fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn has_index(conn: &Connection, index: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
        [index],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn has_table(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
