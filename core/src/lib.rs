//! Types shared between the host game server and the savegame store.
//!
//! The store never looks inside chunk payloads; the only world knowledge it
//! needs is how a chunk coordinate packs into the 64-bit save key, which lives
//! in [`types::ChunkPos`].

use log::{Level, LevelFilter, Record};
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::{pattern::PatternEncoder, Encode},
    filter::threshold::ThresholdFilter,
};
use std::{backtrace::Backtrace, env};

pub mod constants;
pub mod types;

const LOGGING_PATTERN: &str = "{d} {l} {f}:{L} - {m}\n";

/// Pattern encoder that appends a backtrace to `Error` records.
///
/// Capturing only happens when `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE` is
/// set, read once when the logger is built.
#[derive(Debug)]
struct ErrorBacktraceEncoder {
    inner: PatternEncoder,
    capture: bool,
}

impl ErrorBacktraceEncoder {
    fn new() -> Self {
        Self {
            inner: PatternEncoder::new(LOGGING_PATTERN),
            capture: ["RUST_BACKTRACE", "RUST_LIB_BACKTRACE"]
                .iter()
                .any(|var| env::var_os(var).is_some()),
        }
    }
}

impl Encode for ErrorBacktraceEncoder {
    fn encode(&self, w: &mut dyn log4rs::encode::Write, record: &Record<'_>) -> anyhow::Result<()> {
        if !self.capture || record.level() != Level::Error {
            return self.inner.encode(w, record);
        }

        self.inner.encode(
            w,
            &Record::builder()
                .args(format_args!(
                    "{}\nBacktrace:\n{}",
                    record.args(),
                    Backtrace::capture()
                ))
                .metadata(record.metadata().clone())
                .module_path(record.module_path())
                .file(record.file())
                .line(record.line())
                .build(),
        )
    }
}

/// Install the process-wide logger.
///
/// Records at `log_level` and above go to stderr. When `file_path` is given,
/// the same records are also appended to that file.
pub fn initialize_logger(log_level: LevelFilter, file_path: Option<&str>) -> anyhow::Result<()> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(ErrorBacktraceEncoder::new()))
        .build();

    let mut config_builder = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(log_level)))
            .build("stderr", Box::new(stderr)),
    );
    let mut root_builder = Root::builder().appender("stderr");

    if let Some(file_path) = file_path {
        let logfile = FileAppender::builder()
            .encoder(Box::new(ErrorBacktraceEncoder::new()))
            .build(file_path)?;

        config_builder =
            config_builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root_builder = root_builder.appender("logfile");
    }

    let config = config_builder.build(root_builder.build(log_level))?;

    let _handle = log4rs::init_config(config)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log4rs::encode::writer::simple::SimpleWriter;

    fn encode(encoder: &ErrorBacktraceEncoder, level: Level, message: &str) -> String {
        let mut out = SimpleWriter(Vec::new());
        encoder
            .encode(
                &mut out,
                &Record::builder()
                    .args(format_args!("{message}"))
                    .level(level)
                    .build(),
            )
            .unwrap();
        String::from_utf8(out.0).unwrap()
    }

    #[test]
    fn backtrace_is_appended_to_errors_only() {
        let encoder = ErrorBacktraceEncoder {
            inner: PatternEncoder::new("{l} {m}"),
            capture: true,
        };

        let error = encode(&encoder, Level::Error, "corrupt savegame");
        assert!(error.starts_with("ERROR corrupt savegame\nBacktrace:\n"), "{error}");

        let warning = encode(&encoder, Level::Warn, "overwriting backup");
        assert_eq!(warning, "WARN overwriting backup");
    }

    #[test]
    fn capture_disabled_leaves_errors_untouched() {
        let encoder = ErrorBacktraceEncoder {
            inner: PatternEncoder::new("{l} {m}"),
            capture: false,
        };
        assert_eq!(encode(&encoder, Level::Error, "closed"), "ERROR closed");
    }
}
