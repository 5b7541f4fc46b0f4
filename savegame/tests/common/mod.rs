#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;
use savegame::{SqliteGameDb, StoreConfig};
use tempfile::TempDir;

/// A scratch directory holding `world.vcdbs` and a `Backups/` folder.
pub struct Scratch {
    pub dir: TempDir,
    pub db_path: PathBuf,
    pub backups_dir: PathBuf,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("world.vcdbs");
        let backups_dir = dir.path().join("Backups");
        Self {
            dir,
            db_path,
            backups_dir,
        }
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig::new(&self.db_path).with_backups_dir(&self.backups_dir)
    }

    pub fn open(&self) -> SqliteGameDb {
        SqliteGameDb::open_or_create(self.config()).expect("open_or_create")
    }

    /// Side connection for inspecting or tampering with the file.
    pub fn raw(&self) -> Connection {
        raw(&self.db_path)
    }
}

pub fn raw(path: &Path) -> Connection {
    let conn = Connection::open(path).expect("open raw connection");
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .expect("busy timeout");
    conn
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        .expect("count rows")
}

pub fn last_updated(conn: &Connection, table: &str, position: u64) -> i64 {
    conn.query_row(
        &format!("SELECT last_updated FROM {table} WHERE position = ?1"),
        [position as i64],
        |r| r.get(0),
    )
    .expect("last_updated")
}

pub fn epoch_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs() as i64
}

/// Schema written by servers that predate `last_updated`.
pub const LEGACY_SCHEMA: &str = "
    CREATE TABLE chunk (position integer PRIMARY KEY, data BLOB);
    CREATE TABLE mapchunk (position integer PRIMARY KEY, data BLOB);
    CREATE TABLE mapregion (position integer PRIMARY KEY, data BLOB);
    CREATE TABLE gamedata (savegameid integer PRIMARY KEY, data BLOB);
    CREATE TABLE playerdata (playerid integer PRIMARY KEY AUTOINCREMENT, playeruid TEXT, data BLOB);
    CREATE INDEX index_playeruid on playerdata(playeruid);
";
