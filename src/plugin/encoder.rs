//! Built-in encoders

use super::{option_bool, Encoder};
use crate::config::ConfigTree;
use crate::error::{LoghubError, Result};
use crate::level::Level;
use crate::logs::Record;

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Read `time_format`, rejecting strings chrono cannot render
fn time_format(options: &ConfigTree) -> Result<String> {
    let format = match options.get_str("time_format").filter(|f| !f.is_empty()) {
        Some(format) => format,
        None => return Ok(DEFAULT_TIME_FORMAT.to_string()),
    };
    let invalid = chrono::format::StrftimeItems::new(&format)
        .any(|item| matches!(item, chrono::format::Item::Error));
    if invalid {
        return Err(LoghubError::InvalidConfig(format!(
            "invalid time_format: {}",
            format
        )));
    }
    Ok(format)
}

/// Tab-separated text line: time, level, logger, message, fields
#[derive(Debug, Clone)]
pub struct ConsoleEncoder {
    color: bool,
    time_format: String,
}

impl ConsoleEncoder {
    pub fn new() -> Self {
        Self {
            color: false,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    /// Options: `color` (bool), `time_format` (chrono format string)
    pub fn from_options(options: &ConfigTree) -> Result<Self> {
        Ok(Self {
            color: option_bool(options, "color", false)?,
            time_format: time_format(options)?,
        })
    }

    fn level_label(&self, level: Level) -> String {
        let label = level.as_str().to_ascii_uppercase();
        if !self.color {
            return label;
        }
        let code = match level {
            Level::Trace => "90",
            Level::Debug => "36",
            Level::Info => "32",
            Level::Warn => "33",
            Level::Error | Level::Off => "31",
        };
        format!("\x1b[{}m{}\x1b[0m", code, label)
    }
}

impl Default for ConsoleEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for ConsoleEncoder {
    fn encode(&self, record: &Record<'_>) -> Vec<u8> {
        let mut line = format!(
            "{}\t{}\t{}\t{}",
            record.time.format(&self.time_format),
            self.level_label(record.level),
            record.logger,
            record.message
        );
        if !record.fields.is_empty() {
            line.push('\t');
            let fields: Vec<String> = record
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            line.push_str(&fields.join(" "));
        }
        line.push('\n');
        line.into_bytes()
    }
}

/// One JSON object per line
#[derive(Debug, Clone)]
pub struct JsonEncoder {
    time_key: String,
    level_key: String,
    logger_key: String,
    message_key: String,
    time_format: String,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self {
            time_key: "ts".to_string(),
            level_key: "level".to_string(),
            logger_key: "logger".to_string(),
            message_key: "msg".to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    /// Options: `time_key`, `level_key`, `logger_key`, `message_key`, `time_format`
    pub fn from_options(options: &ConfigTree) -> Result<Self> {
        let defaults = Self::new();
        let pick = |key: &str, default: String| {
            options
                .get_str(key)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };
        Ok(Self {
            time_key: pick("time_key", defaults.time_key),
            level_key: pick("level_key", defaults.level_key),
            logger_key: pick("logger_key", defaults.logger_key),
            message_key: pick("message_key", defaults.message_key),
            time_format: time_format(options)?,
        })
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for JsonEncoder {
    fn encode(&self, record: &Record<'_>) -> Vec<u8> {
        let mut object = serde_json::Map::new();
        object.insert(
            self.time_key.clone(),
            record.time.format(&self.time_format).to_string().into(),
        );
        object.insert(self.level_key.clone(), record.level.as_str().into());
        object.insert(self.logger_key.clone(), record.logger.into());
        object.insert(self.message_key.clone(), record.message.as_ref().into());
        for (key, value) in &record.fields {
            object.insert(key.to_string(), value.clone().into());
        }

        let mut bytes = serde_json::to_vec(&serde_json::Value::Object(object))
            .unwrap_or_else(|e| format!("{{\"encode_error\":\"{}\"}}", e).into_bytes());
        bytes.push(b'\n');
        bytes
    }
}
