use rusqlite::OptionalExtension;
use world_core::types::{ChunkPos, DbChunk};

use crate::error::Result;
use crate::schema::ChunkTable;
use crate::store::{from_sql_key, SqliteGameDb};

/// Lazy full-table scan returned by [`SqliteGameDb::all_chunks`].
///
/// Rows are fetched one at a time in key order with a keyset cursor, so only
/// the current row is ever materialized. The store lock is taken per row and
/// released before the row is handed out, so the caller may use the store
/// between rows. Rows written behind the cursor during a scan are not seen.
/// After the first error the iterator is exhausted.
pub struct ChunkRows<'a> {
    store: &'a SqliteGameDb,
    table: ChunkTable,
    cursor: Option<i64>,
    done: bool,
}

impl<'a> ChunkRows<'a> {
    pub(crate) fn new(store: &'a SqliteGameDb, table: ChunkTable) -> Self {
        Self {
            store,
            table,
            cursor: None,
            done: false,
        }
    }

    pub fn table(&self) -> ChunkTable {
        self.table
    }

    fn fetch_next(&mut self) -> Result<Option<DbChunk>> {
        let table = self.table.name();
        let cursor = self.cursor;

        let row = self.store.with_conn(|conn| {
            let row = match cursor {
                None => conn
                    .prepare_cached(&format!(
                        "SELECT position, data FROM {table} ORDER BY position LIMIT 1"
                    ))?
                    .query_row([], read_row)
                    .optional()?,
                Some(last) => conn
                    .prepare_cached(&format!(
                        "SELECT position, data FROM {table} WHERE position > ?1 ORDER BY position LIMIT 1"
                    ))?
                    .query_row([last], read_row)
                    .optional()?,
            };
            Ok(row)
        })?;

        Ok(row.map(|(key, data)| {
            self.cursor = Some(key);
            DbChunk {
                position: ChunkPos::from_chunk_index(from_sql_key(key)),
                data: data.unwrap_or_default(),
            }
        }))
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, Option<Vec<u8>>)> {
    Ok((row.get(0)?, row.get(1)?))
}

impl Iterator for ChunkRows<'_> {
    type Item = Result<DbChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fetch_next() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl std::fmt::Debug for ChunkRows<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRows")
            .field("table", &self.table)
            .field("cursor", &self.cursor)
            .field("done", &self.done)
            .finish()
    }
}
