//! C6 — the pool's log sink.
//!
//! Two levels only: info and error, each a single timestamped line written
//! synchronously to stdout/stderr. This is installed as the process-wide
//! backend for the standard [`log`] facade, so pool-internal code just calls
//! `log::info!`/`log::error!` (ambient diagnostics from the CLI/config layer
//! may use other levels; this backend passes those through unfiltered by
//! level, filtering is handled by the configured [`log::LevelFilter`]).
//!
//! The C++ original formats into a fixed `char[1024]` buffer before writing;
//! that was a manual-memory-safety concession, not an observable behavior,
//! so it is not reproduced here — `format!` has no such bound.

use std::io::Write;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

struct PoolLogger;

impl Log for PoolLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{timestamp}] {}\n", record.args());

        match record.level() {
            Level::Error | Level::Warn => {
                let _ = std::io::stderr().write_all(line.as_bytes());
            }
            _ => {
                let _ = std::io::stdout().write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: PoolLogger = PoolLogger;

/// Installs the pool's logger as the process-wide [`log`] backend.
///
/// Idempotent-safe to call once per process; a second call from, e.g., a
/// test harness that already installed a logger returns the underlying
/// `SetLoggerError`, which callers are expected to ignore.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // `log::set_max_level` is process-global; run serially so this test
    // doesn't race other tests in the crate that also touch it.
    #[test]
    #[serial]
    fn enabled_respects_max_level() {
        log::set_max_level(LevelFilter::Info);
        let logger = PoolLogger;
        assert!(logger.enabled(&Metadata::builder().level(Level::Info).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Debug).build()));
    }
}
