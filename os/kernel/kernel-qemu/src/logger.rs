use crate::qemu_fmt::QemuSink;
use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `Debug` in debug builds, `Info` otherwise.
#[must_use]
pub const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Format a record as one `[LEVEL] target: message` line.
///
/// # Errors
/// Whatever `out` reports.
pub fn write_record(out: &mut impl fmt::Write, record: &Record) -> fmt::Result {
    writeln!(out, "[{}] {}: {}", record.level(), record.target(), record.args())
}

pub struct QemuLogger {
    max_level: LevelFilter,
}

impl QemuLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Install as the global logger. Call this once during early init.
    ///
    /// # Errors
    /// [`SetLoggerError`] if a logger is already installed.
    pub fn init(self) -> Result<(), SetLoggerError> {
        static mut LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Off);

        let max_level = self.max_level;
        // SAFETY: Single-threaded early boot; the static is written once before
        // a shared reference to it is handed to `log`.
        let logger: &'static Self = unsafe {
            let slot = &raw mut LOGGER;
            slot.write(self);
            &*slot
        };
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Best-effort: the debug console cannot fail.
        let _ = write_record(&mut QemuSink, record);
    }

    fn flush(&self) {}
}
