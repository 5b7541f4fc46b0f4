//! `PRAGMA integrity_check` with a single VACUUM-based repair attempt.
//!
//! Repair rewrites the whole file and can run for hours on a large save, so it
//! is attempted exactly once; if the check still fails the caller gets
//! [`StoreError::DatabaseIntegrity`] and recovery is left to the player.

use rusqlite::{Connection, ErrorCode};

use crate::error::{Result, StoreError, REPAIR_GUIDE};
use crate::store::SqliteGameDb;

impl SqliteGameDb {
    /// Check the file, repairing once if needed.
    ///
    /// Returns `Ok(true)` when the file is (now) consistent.
    pub fn integrity_check(&self) -> Result<bool> {
        self.with_conn(|conn| check_and_repair(conn, repair))
    }
}

fn check_and_repair(
    conn: &Connection,
    repair: impl FnOnce(&Connection) -> rusqlite::Result<()>,
) -> Result<bool> {
    if run_integrity_check(conn, true)? {
        return Ok(true);
    }

    log::info!(
        "Database integrity check failed. Attempting basic repair procedure (via VACUUM), \
         this might take minutes to hours depending on the size of the savegame..."
    );

    if let Err(err) = repair(conn) {
        log::error!("Unable to repair: {err}. Recommend any of the solutions posted at {REPAIR_GUIDE}");
        return Err(StoreError::DatabaseIntegrity(format!("repair failed: {err}")));
    }

    if run_integrity_check(conn, false)? {
        log::info!("Database integrity check now okay");
        Ok(true)
    } else {
        log::error!(
            "Database integrity still bad after repair. Recommend any of the solutions posted at {REPAIR_GUIDE}"
        );
        Err(StoreError::DatabaseIntegrity(
            "integrity check still failing after repair".to_string(),
        ))
    }
}

/// `true` when SQLite reports a single `ok` row.
///
/// Corruption detected while running the check counts as a failed check
/// rather than an error.
fn run_integrity_check(conn: &Connection, log_results: bool) -> Result<bool> {
    let lines = match collect_integrity_report(conn) {
        Ok(lines) => lines,
        Err(err) if is_corruption(&err) => {
            log::warn!("integrity_check aborted: {err}");
            return Ok(false);
        }
        Err(err) => return Err(err.into()),
    };

    let ok = lines.len() == 1 && lines[0].eq_ignore_ascii_case("ok");
    if !ok && log_results {
        for line in &lines {
            log::warn!("integrity_check: {line}");
        }
    }
    Ok(ok)
}

fn collect_integrity_report(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA integrity_check")?;
    let lines = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(lines)
}

fn is_corruption(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseCorrupt) | Some(ErrorCode::NotADatabase)
    )
}

fn repair(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA writable_schema = ON;")?;
    let vacuumed = conn.execute_batch("VACUUM;");
    conn.execute_batch("PRAGMA writable_schema = OFF;")?;
    vacuumed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::Path;

    /// An index whose stored entries no longer match its definition.
    fn write_mismatched_index(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE t (x INTEGER, y INTEGER);
             CREATE INDEX ti ON t(x);
             INSERT INTO t VALUES (1, 100), (2, 50), (3, 10);
             PRAGMA writable_schema = ON;
             UPDATE sqlite_master SET sql = 'CREATE INDEX ti ON t(y)' WHERE name = 'ti';
             PRAGMA writable_schema = OFF;",
        )
        .unwrap();
    }

    #[test]
    fn healthy_file_skips_repair() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();

        let attempts = Cell::new(0);
        let ok = check_and_repair(&conn, |_| {
            attempts.set(attempts.get() + 1);
            Ok(())
        })
        .unwrap();

        assert!(ok);
        assert_eq!(attempts.get(), 0);
    }

    #[test]
    fn persistent_corruption_is_repaired_once_then_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.vcdbs");
        write_mismatched_index(&path);
        let conn = Connection::open(&path).unwrap();

        let attempts = Cell::new(0);
        let err = check_and_repair(&conn, |conn| {
            attempts.set(attempts.get() + 1);
            repair(conn)
        })
        .unwrap_err();

        assert_eq!(attempts.get(), 1);
        assert!(matches!(err, StoreError::DatabaseIntegrity(_)), "{err}");
        assert!(err.to_string().contains(REPAIR_GUIDE), "{err}");
        assert!(!run_integrity_check(&conn, false).unwrap());
    }

    #[test]
    fn failed_repair_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.vcdbs");
        write_mismatched_index(&path);
        let conn = Connection::open(&path).unwrap();

        let err = check_and_repair(&conn, |_| {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                Some("disk full".to_string()),
            ))
        })
        .unwrap_err();

        match err {
            StoreError::DatabaseIntegrity(reason) => {
                assert!(reason.starts_with("repair failed"), "{reason}")
            }
            other => panic!("expected DatabaseIntegrity, got {other:?}"),
        }
    }
}
