//! Logger facade and the pipelines behind it
//!
//! A [`Logger`] is bound to a name, not to a pipeline: it holds the shared
//! [`LoggerSlot`] for that name, and the manager swaps the slot's pipeline on
//! update. Every facade issued for a name observes the swap on its next record.

use super::Record;
use crate::error::{LoghubError, Result};
use crate::level::Level;
use crate::plugin::{Appender, ConsoleAppender, ConsoleEncoder, ConsoleTarget};
use arc_swap::ArcSwap;
use std::borrow::Cow;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Instance name of the fallback sink
pub const FALLBACK_APPENDER: &str = "__fallback__";

/// One output of a pipeline
#[derive(Clone)]
pub struct Sink {
    name: String,
    level: Option<Level>,
    appender: Arc<dyn Appender>,
}

impl Sink {
    pub fn new(name: impl Into<String>, level: Option<Level>, appender: Arc<dyn Appender>) -> Self {
        Self {
            name: name.into(),
            level,
            appender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn appender(&self) -> &Arc<dyn Appender> {
        &self.appender
    }

    fn accepts(&self, level: Level) -> bool {
        self.level.map_or(true, |min| level >= min)
    }
}

/// The leveled logger instance currently bound to a name
#[derive(Clone)]
pub struct Pipeline {
    level: Level,
    sinks: Vec<Sink>,
}

impl Pipeline {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            sinks: Vec::new(),
        }
    }

    /// Builder-style method for adding an unfiltered sink
    pub fn with_appender(self, name: impl Into<String>, appender: Arc<dyn Appender>) -> Self {
        self.with_sink(Sink::new(name, None, appender))
    }

    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Minimal pipeline used when nothing usable is configured:
    /// plain text to stderr
    pub fn fallback(level: Level) -> Self {
        let appender = ConsoleAppender::new(ConsoleTarget::Stderr, Box::new(ConsoleEncoder::new()));
        Self::new(level).with_appender(FALLBACK_APPENDER, Arc::new(appender))
    }

    pub fn is_fallback(&self) -> bool {
        self.sinks.len() == 1 && self.sinks[0].name == FALLBACK_APPENDER
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    /// Deliver a record to every sink that accepts its level.
    /// Level gating against the logger threshold is the caller's job.
    pub fn emit(&self, record: &Record<'_>) {
        for sink in self.sinks.iter().filter(|s| s.accepts(record.level)) {
            if let Err(e) = sink.appender.append(record) {
                tracing::warn!(appender = %sink.name, error = %e, "Failed to write log record");
            }
        }
    }

    /// Flush every sink; all are attempted and the first error is returned
    pub fn sync(&self) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(source) = sink.appender.sync() {
                first_error.get_or_insert(LoghubError::Sync {
                    name: sink.name.clone(),
                    source,
                });
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Name-bound cell shared by the manager and every facade for that name
pub(crate) struct LoggerSlot {
    pipeline: ArcSwap<Pipeline>,
    /// `0` means no override, otherwise a [`Level`] discriminant
    level_override: AtomicU8,
    /// Set once the pipeline was supplied by the caller instead of config
    external: AtomicBool,
}

impl LoggerSlot {
    pub(crate) fn new(pipeline: Arc<Pipeline>, level_override: Option<Level>) -> Self {
        Self {
            pipeline: ArcSwap::new(pipeline),
            level_override: AtomicU8::new(level_override.map_or(0, Level::to_u8)),
            external: AtomicBool::new(false),
        }
    }

    pub(crate) fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.load_full()
    }

    pub(crate) fn swap(&self, pipeline: Arc<Pipeline>) -> Arc<Pipeline> {
        self.pipeline.swap(pipeline)
    }

    pub(crate) fn set_override(&self, level: Option<Level>) {
        self.level_override
            .store(level.map_or(0, Level::to_u8), Ordering::Release);
    }

    pub(crate) fn level_override(&self) -> Option<Level> {
        Level::from_u8(self.level_override.load(Ordering::Acquire))
    }

    pub(crate) fn mark_external(&self) {
        self.external.store(true, Ordering::Release);
    }

    pub(crate) fn is_external(&self) -> bool {
        self.external.load(Ordering::Acquire)
    }

    fn effective_level(&self) -> Level {
        self.level_override()
            .unwrap_or_else(|| self.pipeline.load().level())
    }
}

/// Handle for emitting records under a name
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    slot: Arc<LoggerSlot>,
}

impl Logger {
    pub(crate) fn new(name: Arc<str>, slot: Arc<LoggerSlot>) -> Self {
        Self { name, slot }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective threshold: the explicit override if set, else the pipeline's
    pub fn level(&self) -> Level {
        self.slot.effective_level()
    }

    pub fn enabled(&self, level: Level) -> bool {
        level != Level::Off && level >= self.level()
    }

    /// The pipeline bound to this name right now
    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.slot.pipeline()
    }

    pub fn log(&self, level: Level, message: impl Display) {
        if self.enabled(level) {
            let message = message.to_string();
            self.slot
                .pipeline
                .load()
                .emit(&Record::new(level, &self.name, message));
        }
    }

    /// Emit a record with key/value fields
    pub fn log_fields(&self, level: Level, message: impl Display, fields: &[(&str, &dyn Display)]) {
        if !self.enabled(level) {
            return;
        }
        let mut record = Record::new(level, &self.name, message.to_string());
        for (key, value) in fields {
            record = record.with_field(Cow::Borrowed(*key), value);
        }
        self.slot.pipeline.load().emit(&record);
    }

    /// Emit a prepared record. Its level is still checked against this logger.
    pub fn log_record(&self, record: &Record<'_>) {
        if self.enabled(record.level) {
            self.slot.pipeline.load().emit(record);
        }
    }

    pub fn trace(&self, message: impl Display) {
        self.log(Level::Trace, message)
    }

    pub fn debug(&self, message: impl Display) {
        self.log(Level::Debug, message)
    }

    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message)
    }

    pub fn warn(&self, message: impl Display) {
        self.log(Level::Warn, message)
    }

    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message)
    }

    /// Flush this logger's sinks only
    pub fn sync(&self) -> Result<()> {
        self.slot.pipeline().sync()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .finish()
    }
}
