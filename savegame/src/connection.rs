//! The capability the host game server depends on.
//!
//! The host holds a `Box<dyn GameDatabaseConnection>` (or a generic bound)
//! handed to it at startup, and never reaches into the store's connection.

use std::path::Path;

use world_core::types::{ChunkPos, DbChunk};

use crate::backup::BackupOutcome;
use crate::error::Result;
use crate::schema::ChunkTable;
use crate::store::SqliteGameDb;

pub trait GameDatabaseConnection: Send + Sync {
    fn integrity_check(&self) -> Result<bool>;

    fn get_chunk(&self, position: u64, table: ChunkTable) -> Result<Option<Vec<u8>>>;

    fn chunk_exists(&self, position: u64, table: ChunkTable) -> Result<bool>;

    fn get_chunks(&self, positions: &[ChunkPos]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Lazy scan; see [`SqliteGameDb::all_chunks`] for the locking contract.
    fn all_chunks<'a>(&'a self, table: ChunkTable)
        -> Box<dyn Iterator<Item = Result<DbChunk>> + 'a>;

    fn set_chunks(&self, table: ChunkTable, chunks: &[DbChunk]) -> Result<()>;

    fn set_map_chunks(&self, chunks: &[DbChunk]) -> Result<()> {
        self.set_chunks(ChunkTable::MapChunk, chunks)
    }

    fn set_map_regions(&self, chunks: &[DbChunk]) -> Result<()> {
        self.set_chunks(ChunkTable::MapRegion, chunks)
    }

    fn delete_chunks(&self, table: ChunkTable, positions: &[ChunkPos]) -> Result<()>;

    fn get_player_data(&self, playeruid: &str) -> Result<Option<Vec<u8>>>;

    /// `None` deletes the player's row.
    fn set_player_data(&self, playeruid: &str, data: Option<&[u8]>) -> Result<()>;

    fn get_game_data(&self) -> Option<Vec<u8>>;

    fn store_game_data(&self, data: &[u8]) -> Result<()>;

    fn create_backup(&self, destination: &Path) -> Result<BackupOutcome>;

    fn close(&self) -> Result<()>;
}

impl GameDatabaseConnection for SqliteGameDb {
    fn integrity_check(&self) -> Result<bool> {
        SqliteGameDb::integrity_check(self)
    }

    fn get_chunk(&self, position: u64, table: ChunkTable) -> Result<Option<Vec<u8>>> {
        SqliteGameDb::get_chunk(self, position, table)
    }

    fn chunk_exists(&self, position: u64, table: ChunkTable) -> Result<bool> {
        SqliteGameDb::chunk_exists(self, position, table)
    }

    fn get_chunks(&self, positions: &[ChunkPos]) -> Result<Vec<Option<Vec<u8>>>> {
        SqliteGameDb::get_chunks(self, positions)
    }

    fn all_chunks<'a>(
        &'a self,
        table: ChunkTable,
    ) -> Box<dyn Iterator<Item = Result<DbChunk>> + 'a> {
        Box::new(SqliteGameDb::all_chunks(self, table))
    }

    fn set_chunks(&self, table: ChunkTable, chunks: &[DbChunk]) -> Result<()> {
        SqliteGameDb::set_chunks(self, table, chunks)
    }

    fn delete_chunks(&self, table: ChunkTable, positions: &[ChunkPos]) -> Result<()> {
        SqliteGameDb::delete_chunks(self, table, positions)
    }

    fn get_player_data(&self, playeruid: &str) -> Result<Option<Vec<u8>>> {
        SqliteGameDb::get_player_data(self, playeruid)
    }

    fn set_player_data(&self, playeruid: &str, data: Option<&[u8]>) -> Result<()> {
        SqliteGameDb::set_player_data(self, playeruid, data)
    }

    fn get_game_data(&self) -> Option<Vec<u8>> {
        SqliteGameDb::get_game_data(self)
    }

    fn store_game_data(&self, data: &[u8]) -> Result<()> {
        SqliteGameDb::store_game_data(self, data)
    }

    fn create_backup(&self, destination: &Path) -> Result<BackupOutcome> {
        SqliteGameDb::create_backup(self, destination)
    }

    fn close(&self) -> Result<()> {
        SqliteGameDb::close(self)
    }
}
