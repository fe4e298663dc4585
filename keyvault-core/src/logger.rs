//! Bridge from the `log` facade to a host-provided sink.
//!
//! The vault logs through `log::{debug, info, warn}`. Hosts that do not run
//! their own `log` backend can install a [`Logger`] with [`set_logger`]; every
//! record from this workspace is forwarded to it, while debug and trace
//! records from other crates are dropped.

use std::sync::{Arc, OnceLock};

/// Receives formatted log messages.
///
/// ```rust
/// use keyvault_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Handles one message at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Very detailed tracing, such as individual derivations.
    Trace,
    /// Debugging information.
    Debug,
    /// Lifecycle events.
    Info,
    /// Rollbacks and unprotected secrets at rest.
    Warn,
    /// Failures.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

const OWN_MODULE_PREFIX: &str = "keyvault";

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Debug and trace records are only kept when they come from this workspace.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let is_own = module_path.is_some_and(|path| path.starts_with(OWN_MODULE_PREFIX));
    is_own || level <= log::Level::Info
}

/// Installs `logger` as the process-wide sink.
///
/// Only the first call has an effect. If another `log` backend is already
/// installed the sink is stored but never receives messages.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("keyvault logger already set");
        return;
    }
    if let Err(err) = init_logger() {
        eprintln!("failed to install keyvault logger: {err}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
