//! The savegame store: one SQLite connection guarded by one lock.
//!
//! Every mutation runs inside a single immediate transaction while the lock is
//! held, so a batch either lands completely or not at all. Each written row is
//! stamped with `unixepoch('now')`, evaluated by SQLite when the row's
//! statement runs.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior};
use world_core::constants::SAVEGAME_ID;
use world_core::types::{ChunkPos, DbChunk};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::rows::ChunkRows;
use crate::schema::{self, ChunkTable};

/// Statements kept warm in the connection's statement cache.
const STANDING_TABLES: [ChunkTable; 2] = [ChunkTable::Chunk, ChunkTable::MapChunk];

/// A savegame file behind one SQLite connection.
///
/// Every call, reads included, takes the same lock: a single
/// `rusqlite::Connection` is not usable from two threads at once. Readers
/// therefore never observe a half-applied batch.
#[derive(Debug)]
pub struct SqliteGameDb {
    conn: Mutex<Option<Connection>>,
    writable: AtomicBool,
    config: StoreConfig,
}

impl SqliteGameDb {
    /// Open (or, when writable, create) the savegame at `config.path`.
    ///
    /// Order matters: integrity check, then schema creation and the
    /// `last_updated` migration, then the standing statements are prepared.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        let conn = open_connection(&config, config.writable)?;

        let store = Self {
            conn: Mutex::new(Some(conn)),
            writable: AtomicBool::new(config.writable),
            config,
        };

        if store.config.integrity_check {
            store.integrity_check()?;
        }
        if store.is_writable() {
            store.with_conn(prepare_schema)?;
        }

        log::info!(
            "Opened savegame database {} ({})",
            store.config.path.display(),
            if store.is_writable() { "read-write" } else { "read-only" }
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panic mid-transaction drops the Transaction, which rolls back.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// Run `f` inside one immediate transaction, committing only on success.
    fn write_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        if !self.is_writable() {
            return Err(StoreError::ReadOnly);
        }
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }

    // ------------------------------------------------------------------
    //  Chunk-shaped tables
    // ------------------------------------------------------------------

    pub fn get_chunk(&self, position: u64, table: ChunkTable) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| read_chunk(conn, position, table))
    }

    pub fn get_map_chunk(&self, position: u64) -> Result<Option<Vec<u8>>> {
        self.get_chunk(position, ChunkTable::MapChunk)
    }

    pub fn get_map_region(&self, position: u64) -> Result<Option<Vec<u8>>> {
        self.get_chunk(position, ChunkTable::MapRegion)
    }

    pub fn chunk_exists(&self, position: u64, table: ChunkTable) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .prepare_cached(&format!(
                    "SELECT 1 FROM {} WHERE position = ?1",
                    table.name()
                ))?
                .query_row([to_sql_key(position)], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn map_chunk_exists(&self, position: u64) -> Result<bool> {
        self.chunk_exists(position, ChunkTable::MapChunk)
    }

    pub fn map_region_exists(&self, position: u64) -> Result<bool> {
        self.chunk_exists(position, ChunkTable::MapRegion)
    }

    /// Read many `chunk` rows inside one read transaction.
    ///
    /// The result lines up with `positions`; missing rows are `None`.
    pub fn get_chunks(&self, positions: &[ChunkPos]) -> Result<Vec<Option<Vec<u8>>>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut out = Vec::with_capacity(positions.len());
            for pos in positions {
                out.push(read_chunk(&tx, ChunkTable::Chunk.key_for(*pos), ChunkTable::Chunk)?);
            }
            tx.commit()?;
            Ok(out)
        })
    }

    /// Lazily scan every row of `table` in key order.
    ///
    /// Each row is read under its own short lock, so other store calls
    /// (including ones from the scanning thread) interleave with the scan.
    pub fn all_chunks(&self, table: ChunkTable) -> ChunkRows<'_> {
        ChunkRows::new(self, table)
    }

    pub fn all_map_chunks(&self) -> ChunkRows<'_> {
        self.all_chunks(ChunkTable::MapChunk)
    }

    pub fn all_map_regions(&self) -> ChunkRows<'_> {
        self.all_chunks(ChunkTable::MapRegion)
    }

    /// Call `action` for every row of `table`, stopping at the first error.
    ///
    /// `action` may use this store.
    pub fn for_each_chunk(&self, table: ChunkTable, mut action: impl FnMut(DbChunk)) -> Result<()> {
        for chunk in self.all_chunks(table) {
            action(chunk?);
        }
        Ok(())
    }

    /// Upsert a batch into `table` in one transaction.
    ///
    /// Columnar tables store each chunk under its column key.
    pub fn set_chunks(&self, table: ChunkTable, chunks: &[DbChunk]) -> Result<()> {
        self.write_transaction(|tx| {
            let mut stmt = tx.prepare_cached(&table.upsert_sql())?;
            for chunk in chunks {
                stmt.execute(params![
                    to_sql_key(table.key_for(chunk.position)),
                    chunk.data.as_slice()
                ])?;
            }
            Ok(())
        })
    }

    pub fn set_map_chunks(&self, chunks: &[DbChunk]) -> Result<()> {
        self.set_chunks(ChunkTable::MapChunk, chunks)
    }

    pub fn set_map_regions(&self, chunks: &[DbChunk]) -> Result<()> {
        self.set_chunks(ChunkTable::MapRegion, chunks)
    }

    pub fn delete_chunks(&self, table: ChunkTable, positions: &[ChunkPos]) -> Result<()> {
        self.write_transaction(|tx| {
            let mut stmt =
                tx.prepare_cached(&format!("DELETE FROM {} WHERE position = ?1", table.name()))?;
            for pos in positions {
                stmt.execute([to_sql_key(table.key_for(*pos))])?;
            }
            Ok(())
        })
    }

    pub fn delete_map_chunks(&self, positions: &[ChunkPos]) -> Result<()> {
        self.delete_chunks(ChunkTable::MapChunk, positions)
    }

    pub fn delete_map_regions(&self, positions: &[ChunkPos]) -> Result<()> {
        self.delete_chunks(ChunkTable::MapRegion, positions)
    }

    /// Number of rows in the `chunk` table.
    pub fn quantity_chunks(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunk", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    /// Keys in `table` written at or after `since` (epoch seconds).
    pub fn chunks_updated_since(&self, table: ChunkTable, since: i64) -> Result<Vec<u64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT position FROM {} WHERE last_updated >= ?1 ORDER BY position",
                table.name()
            ))?;
            let keys = stmt
                .query_map([since], |row| row.get::<_, i64>(0))?
                .map(|key| key.map(from_sql_key))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        })
    }

    // ------------------------------------------------------------------
    //  Player data
    // ------------------------------------------------------------------

    pub fn get_player_data(&self, playeruid: &str) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            let data = conn
                .prepare_cached("SELECT data FROM playerdata WHERE playeruid = ?1 LIMIT 1")?
                .query_row([playeruid], |row| row.get::<_, Option<Vec<u8>>>(0))
                .optional()?;
            Ok(data.flatten())
        })
    }

    /// Store `data` for `playeruid`; `None` deletes the player's row.
    ///
    /// Update-then-insert inside one immediate transaction, so there is
    /// never a second row for the same uid from this store.
    pub fn set_player_data(&self, playeruid: &str, data: Option<&[u8]>) -> Result<()> {
        self.write_transaction(|tx| {
            let Some(data) = data else {
                tx.prepare_cached("DELETE FROM playerdata WHERE playeruid = ?1")?
                    .execute([playeruid])?;
                return Ok(());
            };

            let updated = tx
                .prepare_cached(
                    "UPDATE playerdata SET data = ?2, last_updated = unixepoch('now') \
                     WHERE playeruid = ?1",
                )?
                .execute(params![playeruid, data])?;

            if updated == 0 {
                tx.prepare_cached(
                    "INSERT INTO playerdata (playeruid, data, last_updated) \
                     VALUES (?1, ?2, unixepoch('now'))",
                )?
                .execute(params![playeruid, data])?;
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    //  Global game data
    // ------------------------------------------------------------------

    /// The singleton global-data blob, if any.
    ///
    /// Read failures are logged and reported as "no data": a fresh save
    /// legitimately has none.
    pub fn get_game_data(&self) -> Option<Vec<u8>> {
        let result = self.with_conn(|conn| {
            let data = conn
                .query_row("SELECT data FROM gamedata LIMIT 1", [], |row| {
                    row.get::<_, Option<Vec<u8>>>(0)
                })
                .optional()?;
            Ok(data.flatten())
        });

        match result {
            Ok(data) => data,
            Err(err) => {
                log::warn!("Exception thrown on GetGameData: {err}");
                None
            }
        }
    }

    pub fn store_game_data(&self, data: &[u8]) -> Result<()> {
        self.write_transaction(|tx| {
            tx.execute(
                "INSERT OR REPLACE INTO gamedata (savegameid, data, last_updated) \
                 VALUES (?1, ?2, unixepoch('now'))",
                params![SAVEGAME_ID, data],
            )?;
            Ok(())
        })
    }

    /// Whether this file looks like a savegame of the current layout.
    pub fn quick_correct_savegame_version_test(&self) -> Result<bool> {
        self.with_conn(|conn| Ok(schema::has_table(conn, "gamedata")?))
    }

    // ------------------------------------------------------------------
    //  Lifecycle
    // ------------------------------------------------------------------

    /// Reopen a read-only store read-write and bring its schema up to date.
    pub fn upgrade_to_write_access(&self) -> Result<()> {
        let mut guard = self.lock();
        if guard.is_none() {
            return Err(StoreError::Closed);
        }

        if !self.is_writable() {
            let mut conn = open_connection(&self.config, true)?;
            prepare_schema(&mut conn)?;
            if let Some(old) = guard.replace(conn) {
                close_connection(old)?;
            }
            self.writable.store(true, Ordering::Release);
            log::info!(
                "Upgraded savegame database {} to write access",
                self.config.path.display()
            );
            return Ok(());
        }

        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        prepare_schema(conn)
    }

    /// Compact the file. Can take a long time on large saves.
    pub fn vacuum(&self) -> Result<()> {
        if !self.is_writable() {
            return Err(StoreError::ReadOnly);
        }
        self.with_conn(|conn| {
            conn.execute_batch("VACUUM;")?;
            Ok(())
        })
    }

    /// Release the cached statements and the connection.
    ///
    /// Calling it again is a no-op; later store calls fail with
    /// [`StoreError::Closed`].
    pub fn close(&self) -> Result<()> {
        let conn = self.lock().take();
        match conn {
            Some(conn) => {
                close_connection(conn)?;
                log::info!("Closed savegame database {}", self.config.path.display());
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for SqliteGameDb {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Failed to close savegame database: {e}");
        }
    }
}

/// Open `config.path` with the requested access and apply the pragmas.
fn open_connection(config: &StoreConfig, writable: bool) -> Result<Connection> {
    let flags = if writable {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    } else {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    };
    let open_error = |source| StoreError::DatabaseOpen {
        path: config.path.clone(),
        source,
    };

    let conn = Connection::open_with_flags(&config.path, flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)
        .map_err(open_error)?;
    conn.busy_timeout(config.busy_timeout).map_err(open_error)?;

    // SQLite opens lazily; touch the schema so unreadable files fail here.
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(open_error)?;

    configure_connection(&conn, config.corruption_protection, writable).map_err(open_error)?;
    Ok(conn)
}

fn configure_connection(
    conn: &Connection,
    corruption_protection: bool,
    writable: bool,
) -> rusqlite::Result<()> {
    let synchronous = if corruption_protection { "FULL" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA synchronous = {synchronous};"))?;

    // Switching journal mode needs write access.
    if writable {
        let journal_mode = if corruption_protection { "WAL" } else { "MEMORY" };
        conn.execute_batch(&format!("PRAGMA journal_mode = {journal_mode};"))?;
    }
    Ok(())
}

/// Create tables, migrate, then rebuild the standing statements.
///
/// Cached statements prepared before the migration bind to the old column
/// set, so the cache is flushed before the upserts are prepared again.
fn prepare_schema(conn: &mut Connection) -> Result<()> {
    schema::ensure_schema(conn)?;
    let altered = schema::ensure_last_updated_column(conn)?;
    if !altered.is_empty() {
        log::info!("Migrated tables to last_updated: {}", altered.join(", "));
    }

    conn.flush_prepared_statement_cache();
    for table in STANDING_TABLES {
        conn.prepare_cached(&table.upsert_sql())?;
    }
    Ok(())
}

fn close_connection(conn: Connection) -> Result<()> {
    conn.flush_prepared_statement_cache();
    conn.close().map_err(|(_, err)| StoreError::Sql(err))
}

fn read_chunk(conn: &Connection, position: u64, table: ChunkTable) -> Result<Option<Vec<u8>>> {
    let data = conn
        .prepare_cached(&format!("SELECT data FROM {} WHERE position = ?1", table.name()))?
        .query_row([to_sql_key(position)], |row| row.get::<_, Option<Vec<u8>>>(0))
        .optional()?;
    Ok(data.flatten())
}

/// SQLite integers are signed; keys are stored bit-for-bit.
pub(crate) const fn to_sql_key(position: u64) -> i64 {
    position as i64
}

pub(crate) const fn from_sql_key(position: i64) -> u64 {
    position as u64
}
