//! Opening savegames written before `last_updated` existed.

mod common;

use common::{count_rows, epoch_now, last_updated, Scratch, LEGACY_SCHEMA};
use rusqlite::params;
use savegame::schema::{has_column, has_index, last_updated_index, LAST_UPDATED_TABLES};
use savegame::{ChunkPos, ChunkTable, DbChunk, SqliteGameDb};

const LEGACY_CHUNKS: u32 = 50;

/// Build a pre-`last_updated` savegame with some rows in every table.
fn write_legacy_savegame(scratch: &Scratch) {
    let conn = scratch.raw();
    conn.execute_batch(LEGACY_SCHEMA).unwrap();

    for i in 0..LEGACY_CHUNKS {
        let key = ChunkPos::new(i, i % 4, i * 2).to_chunk_index() as i64;
        conn.execute(
            "INSERT INTO chunk (position, data) VALUES (?1, ?2)",
            params![key, vec![i as u8; 16]],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO mapchunk (position, data) VALUES (?1, ?2)",
        params![ChunkPos::new(1, 0, 1).to_chunk_index() as i64, b"mapchunk".to_vec()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO mapregion (position, data) VALUES (?1, ?2)",
        params![ChunkPos::new(0, 0, 0).to_chunk_index() as i64, b"mapregion".to_vec()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO playerdata (playeruid, data) VALUES ('legacy-player', ?1)",
        params![b"inventory".to_vec()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO gamedata (savegameid, data) VALUES (1, ?1)",
        params![b"calendar".to_vec()],
    )
    .unwrap();
}

fn schema_snapshot(conn: &rusqlite::Connection) -> Vec<(String, String)> {
    let mut stmt = conn
        .prepare("SELECT name, sql FROM sqlite_master WHERE sql IS NOT NULL ORDER BY name")
        .unwrap();
    stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap()
}

#[test]
fn legacy_rows_survive_with_zero_timestamp() {
    let scratch = Scratch::new();
    write_legacy_savegame(&scratch);

    let store = scratch.open();
    let raw = scratch.raw();

    for table in LAST_UPDATED_TABLES {
        assert!(has_column(&raw, table, "last_updated").unwrap(), "{table}");
        assert!(has_index(&raw, &last_updated_index(table)).unwrap(), "{table}");
    }

    assert_eq!(count_rows(&raw, "chunk"), LEGACY_CHUNKS as i64);
    let stale: i64 = raw
        .query_row("SELECT COUNT(*) FROM chunk WHERE last_updated = 0", [], |r| r.get(0))
        .unwrap();
    assert_eq!(stale, LEGACY_CHUNKS as i64);

    let pos = ChunkPos::new(7, 3, 14);
    assert_eq!(
        store.get_chunk(pos.to_chunk_index(), ChunkTable::Chunk).unwrap(),
        Some(vec![7u8; 16])
    );
    assert_eq!(
        store.get_map_chunk(ChunkPos::new(1, 0, 1).to_chunk_index()).unwrap(),
        Some(b"mapchunk".to_vec())
    );
    assert_eq!(store.get_player_data("legacy-player").unwrap(), Some(b"inventory".to_vec()));
    assert_eq!(store.get_game_data(), Some(b"calendar".to_vec()));
}

#[test]
fn writes_after_migration_stamp_the_new_column() {
    let scratch = Scratch::new();
    write_legacy_savegame(&scratch);
    let store = scratch.open();
    let raw = scratch.raw();

    let pos = ChunkPos::new(7, 3, 14);
    let untouched = ChunkPos::new(8, 0, 16);
    let before = epoch_now();
    store
        .set_chunks(ChunkTable::Chunk, &[DbChunk::new(pos, b"rebuilt".to_vec())])
        .unwrap();
    store
        .set_map_chunks(&[DbChunk::new(ChunkPos::new(1, 9, 1), b"redrawn".to_vec())])
        .unwrap();

    assert!(last_updated(&raw, "chunk", pos.to_chunk_index()) >= before);
    assert_eq!(last_updated(&raw, "chunk", untouched.to_chunk_index()), 0);
    assert!(last_updated(&raw, "mapchunk", ChunkPos::new(1, 0, 1).to_chunk_index()) >= before);
    assert_eq!(count_rows(&raw, "chunk"), LEGACY_CHUNKS as i64);
    assert_eq!(
        store.chunks_updated_since(ChunkTable::Chunk, before).unwrap(),
        vec![pos.to_chunk_index()]
    );
}

#[test]
fn reopening_does_not_migrate_again() {
    let scratch = Scratch::new();
    write_legacy_savegame(&scratch);

    scratch.open().close().unwrap();
    let after_first = schema_snapshot(&scratch.raw());

    scratch.open().close().unwrap();
    let after_second = schema_snapshot(&scratch.raw());

    assert_eq!(after_first, after_second);
    let columns: i64 = scratch
        .raw()
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('chunk') WHERE name = 'last_updated'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(columns, 1);
}

#[test]
fn read_only_open_leaves_legacy_file_alone() {
    let scratch = Scratch::new();
    write_legacy_savegame(&scratch);

    let store = SqliteGameDb::open_or_create(scratch.config().with_writable(false)).unwrap();
    assert!(!store.is_writable());
    assert!(!has_column(&scratch.raw(), "chunk", "last_updated").unwrap());
    assert_eq!(store.quantity_chunks().unwrap(), LEGACY_CHUNKS as u64);

    store.upgrade_to_write_access().unwrap();
    assert!(store.is_writable());
    assert!(has_column(&scratch.raw(), "chunk", "last_updated").unwrap());

    store
        .set_chunks(ChunkTable::Chunk, &[DbChunk::new(ChunkPos::new(0, 0, 0), b"new".to_vec())])
        .unwrap();
}
