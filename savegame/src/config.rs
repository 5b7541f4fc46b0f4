//! Open-time settings for a savegame database.
//!
//! The host passes these explicitly; [`StoreConfig::from_env`] is a
//! convenience for tools that want the `SAVEGAME_*` environment (or a `.env`
//! file) to decide instead.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BACKUPS_DIR: &str = "Backups";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Live savegame file.
    pub path: PathBuf,
    /// Open read-write (creating the file if missing) instead of read-only.
    pub writable: bool,
    /// WAL journal with full fsync instead of a memory journal without fsync.
    pub corruption_protection: bool,
    /// Run `PRAGMA integrity_check` (and one repair attempt) while opening.
    pub integrity_check: bool,
    /// Relative backup destinations are resolved against this directory.
    pub backups_dir: PathBuf,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writable: true,
            corruption_protection: true,
            integrity_check: false,
            backups_dir: PathBuf::from(DEFAULT_BACKUPS_DIR),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn with_corruption_protection(mut self, enabled: bool) -> Self {
        self.corruption_protection = enabled;
        self
    }

    pub fn with_integrity_check(mut self, enabled: bool) -> Self {
        self.integrity_check = enabled;
        self
    }

    pub fn with_backups_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backups_dir = dir.into();
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Build a config for `path`, overriding defaults from the environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `SAVEGAME_READ_ONLY` | `false` |
    /// | `SAVEGAME_CORRUPTION_PROTECTION` | `true` |
    /// | `SAVEGAME_INTEGRITY_CHECK` | `false` |
    /// | `SAVEGAME_BACKUPS_DIR` | `Backups` |
    /// | `SAVEGAME_BUSY_TIMEOUT_MS` | `5000` |
    pub fn from_env(path: impl AsRef<Path>) -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(path, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        path: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = Self::new(path.as_ref());

        if let Some(read_only) = lookup("SAVEGAME_READ_ONLY").and_then(|v| parse_flag(&v)) {
            config.writable = !read_only;
        }
        if let Some(flag) = lookup("SAVEGAME_CORRUPTION_PROTECTION").and_then(|v| parse_flag(&v)) {
            config.corruption_protection = flag;
        }
        if let Some(flag) = lookup("SAVEGAME_INTEGRITY_CHECK").and_then(|v| parse_flag(&v)) {
            config.integrity_check = flag;
        }
        if let Some(dir) = lookup("SAVEGAME_BACKUPS_DIR").filter(|v| !v.trim().is_empty()) {
            config.backups_dir = PathBuf::from(dir);
        }
        match lookup("SAVEGAME_BUSY_TIMEOUT_MS").map(|v| v.trim().parse::<u64>()) {
            Some(Ok(ms)) => config.busy_timeout = Duration::from_millis(ms),
            Some(Err(err)) => {
                log::warn!("Ignoring invalid SAVEGAME_BUSY_TIMEOUT_MS: {err}");
            }
            None => {}
        }

        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            log::warn!("Ignoring unrecognized boolean value {other:?}");
            None
        }
    }
}
