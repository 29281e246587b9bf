//! Bridge from the `log` crate facade into a loghub logger
//!
//! `log` accepts a global logger only once per process, so the bridge is
//! installed on the first redirect and stays installed. Redirecting and
//! cancelling only swap its target and the `log` max level.

use super::{Logger, Record};
use crate::error::{LoghubError, Result};
use crate::level::Level;
use parking_lot::RwLock;
use std::sync::OnceLock;

/// Logger name records from the `log` facade are written under
pub const STD_LOG_LOGGER: &str = "stdlog";

static TARGET: RwLock<Option<Logger>> = parking_lot::const_rwlock(None);
static INSTALLED: OnceLock<std::result::Result<(), String>> = OnceLock::new();

struct StdLogBridge;

impl log::Log for StdLogBridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        TARGET
            .read()
            .as_ref()
            .map_or(false, |logger| logger.enabled(Level::from_log(metadata.level())))
    }

    fn log(&self, record: &log::Record<'_>) {
        // Appenders run unlocked so they may redirect, cancel or log again
        let Some(logger) = current() else {
            return;
        };

        let level = Level::from_log(record.level());
        if !logger.enabled(level) {
            return;
        }
        let entry = Record::new(level, logger.name(), record.args().to_string())
            .with_field("target", record.target());
        logger.log_record(&entry);
    }

    fn flush(&self) {
        if let Some(logger) = current() {
            let _ = logger.sync();
        }
    }
}

fn current() -> Option<Logger> {
    TARGET.read().clone()
}

/// Handle returned by a successful redirect
#[derive(Debug)]
pub struct StdLogRedirect {
    _private: (),
}

impl StdLogRedirect {
    /// Stop routing `log` records; same as [`cancel`]
    pub fn cancel(self) {
        cancel();
    }
}

pub(crate) fn redirect(logger: Logger) -> Result<StdLogRedirect> {
    let installed = INSTALLED
        .get_or_init(|| log::set_boxed_logger(Box::new(StdLogBridge)).map_err(|e| e.to_string()));
    if let Err(reason) = installed {
        return Err(LoghubError::StdLogRedirect(reason.clone()));
    }

    *TARGET.write() = Some(logger);
    log::set_max_level(log::LevelFilter::Trace);
    Ok(StdLogRedirect { _private: () })
}

/// Stop routing `log` records. A no-op when nothing is redirected.
pub fn cancel() {
    if TARGET.write().take().is_some() && matches!(INSTALLED.get(), Some(Ok(()))) {
        log::set_max_level(log::LevelFilter::Off);
    }
}

pub fn is_redirected() -> bool {
    TARGET.read().is_some()
}
