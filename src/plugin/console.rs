use super::{Appender, Encoder};
use crate::config::ConfigTree;
use crate::error::{LoghubError, Result};
use crate::logs::Record;
use std::io::{self, Write};

/// Standard stream a console appender writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
}

/// Writes encoded records to stdout or stderr
pub struct ConsoleAppender {
    target: ConsoleTarget,
    encoder: Box<dyn Encoder>,
}

impl ConsoleAppender {
    pub fn new(target: ConsoleTarget, encoder: Box<dyn Encoder>) -> Self {
        Self { target, encoder }
    }

    /// Options: `target` (`stdout` or `stderr`, default `stdout`)
    pub fn from_options(options: &ConfigTree, encoder: Box<dyn Encoder>) -> Result<Self> {
        let target = match options.get_str("target").as_deref() {
            None | Some("") | Some("stdout") => ConsoleTarget::Stdout,
            Some("stderr") => ConsoleTarget::Stderr,
            Some(other) => {
                return Err(LoghubError::InvalidConfig(format!(
                    "console target must be stdout or stderr, got '{}'",
                    other
                )))
            }
        };
        Ok(Self::new(target, encoder))
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }
}

impl Appender for ConsoleAppender {
    fn append(&self, record: &Record<'_>) -> io::Result<()> {
        let bytes = self.encoder.encode(record);
        match self.target {
            ConsoleTarget::Stdout => io::stdout().lock().write_all(&bytes),
            ConsoleTarget::Stderr => io::stderr().lock().write_all(&bytes),
        }
    }

    fn sync(&self) -> io::Result<()> {
        match self.target {
            ConsoleTarget::Stdout => io::stdout().flush(),
            ConsoleTarget::Stderr => io::stderr().flush(),
        }
    }
}
