//! Log record handed from a logger to its sinks

use crate::level::Level;
use chrono::{DateTime, Local};
use std::borrow::Cow;
use std::fmt::Display;

/// A single log event
#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub time: DateTime<Local>,
    pub level: Level,
    /// Name of the logger that produced the record
    pub logger: &'a str,
    pub message: Cow<'a, str>,
    /// Structured key/value context, in insertion order
    pub fields: Vec<(Cow<'a, str>, String)>,
}

impl<'a> Record<'a> {
    pub fn new(level: Level, logger: &'a str, message: impl Into<Cow<'a, str>>) -> Self {
        Self {
            time: Local::now(),
            level,
            logger,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style method for attaching a field
    pub fn with_field(mut self, key: impl Into<Cow<'a, str>>, value: impl Display) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Builder-style method for overriding the timestamp
    pub fn with_time(mut self, time: DateTime<Local>) -> Self {
        self.time = time;
        self
    }
}
