//! Typed, validated view of a configuration tree
//!
//! ```yaml
//! appenders:
//!   console:                 # appender plugin
//!     - name: CONSOLE        # instance name, defaults to the plugin name
//!       target: stdout
//!       level: debug         # optional per-sink minimum
//!       encoder:
//!         console:           # encoder plugin and its options
//! loggers:
//!   root:
//!     level: info
//!     appender_refs: [CONSOLE]
//!   logger:
//!     - name: app.db
//!       level: debug
//! ```

use super::tree::{ConfigTree, Value};
use crate::error::{LoghubError, Result};
use crate::level::Level;
use std::collections::HashSet;

/// Name of the root logger entry
pub const ROOT_LOGGER: &str = "root";

/// Encoder used when an appender does not name one
pub const DEFAULT_ENCODER: &str = "console";

/// Encoder plugin selection with its options
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSpec {
    pub kind: String,
    pub options: ConfigTree,
}

/// One configured appender instance
#[derive(Debug, Clone, PartialEq)]
pub struct AppenderSpec {
    /// Appender plugin name (`console`, `file`, ...)
    pub kind: String,
    /// Instance name referenced by loggers
    pub name: String,
    pub level: Option<Level>,
    pub encoder: EncoderSpec,
    /// Remaining keys, handed to the plugin constructor
    pub options: ConfigTree,
}

/// A named logger entry. Absent fields inherit from the nearest ancestor.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerSpec {
    pub name: String,
    pub level: Option<Level>,
    pub appender_refs: Option<Vec<String>>,
}

/// Effective settings for one logger name after inheritance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLogger {
    pub level: Level,
    pub appender_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub appenders: Vec<AppenderSpec>,
    pub root: ResolvedLogger,
    pub loggers: Vec<LoggerSpec>,
}

impl LogConfig {
    /// Build and validate the typed view
    pub fn from_tree(tree: &ConfigTree) -> Result<Self> {
        let appenders = match tree.get("appenders") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Tree(kinds)) => parse_appenders(kinds)?,
            Some(_) => return Err(invalid("'appenders' must be a mapping")),
        };

        let root = match tree.get("loggers.root") {
            None | Some(Value::Null) => ResolvedLogger {
                level: Level::Info,
                appender_refs: Vec::new(),
            },
            Some(Value::Tree(root)) => {
                let spec = parse_logger(ROOT_LOGGER.to_string(), root)?;
                ResolvedLogger {
                    level: spec.level.unwrap_or(Level::Info),
                    appender_refs: spec.appender_refs.unwrap_or_default(),
                }
            }
            Some(_) => return Err(invalid("'loggers.root' must be a mapping")),
        };

        let loggers = match tree.get("loggers.logger") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Tree(single)) => vec![parse_named_logger(single)?],
            Some(Value::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_tree()
                        .ok_or_else(|| invalid("'loggers.logger' entries must be mappings"))
                        .and_then(parse_named_logger)
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(invalid("'loggers.logger' must be a list")),
        };

        let config = Self {
            appenders,
            root,
            loggers,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for appender in &self.appenders {
            if !names.insert(appender.name.as_str()) {
                return Err(invalid(format!(
                    "duplicate appender name: {}",
                    appender.name
                )));
            }
        }

        let mut logger_names = HashSet::new();
        for logger in &self.loggers {
            if !logger_names.insert(logger.name.as_str()) {
                return Err(invalid(format!("duplicate logger name: {}", logger.name)));
            }
        }

        let refs = self
            .root
            .appender_refs
            .iter()
            .map(|r| (ROOT_LOGGER, r))
            .chain(self.loggers.iter().flat_map(|l| {
                l.appender_refs
                    .iter()
                    .flatten()
                    .map(move |r| (l.name.as_str(), r))
            }));
        for (logger, reference) in refs {
            if !names.contains(reference.as_str()) {
                return Err(invalid(format!(
                    "logger '{}' references unknown appender '{}'",
                    logger, reference
                )));
            }
        }

        Ok(())
    }

    pub fn appender(&self, name: &str) -> Option<&AppenderSpec> {
        self.appenders.iter().find(|a| a.name == name)
    }

    /// Effective settings for `name`, inheriting field by field from
    /// `a.b.c` → `a.b` → `a` → root
    pub fn resolve(&self, name: &str) -> ResolvedLogger {
        let mut level = None;
        let mut appender_refs = None;

        let mut candidate = Some(name);
        while let Some(current) = candidate {
            if let Some(spec) = self.loggers.iter().find(|l| l.name == current) {
                level = level.or(spec.level);
                if appender_refs.is_none() {
                    appender_refs = spec.appender_refs.clone();
                }
            }
            if level.is_some() && appender_refs.is_some() {
                break;
            }
            candidate = current.rfind('.').map(|pos| &current[..pos]);
        }

        ResolvedLogger {
            level: level.unwrap_or(self.root.level),
            appender_refs: appender_refs.unwrap_or_else(|| self.root.appender_refs.clone()),
        }
    }
}

fn invalid(reason: impl Into<String>) -> LoghubError {
    LoghubError::InvalidConfig(reason.into())
}

fn parse_appenders(kinds: &ConfigTree) -> Result<Vec<AppenderSpec>> {
    let mut appenders = Vec::new();
    for (kind, value) in kinds.iter() {
        match value {
            Value::Null => {}
            Value::Tree(instance) => appenders.push(parse_appender(kind, instance)?),
            Value::List(items) => {
                for item in items {
                    let instance = item.as_tree().ok_or_else(|| {
                        invalid(format!("'appenders.{}' entries must be mappings", kind))
                    })?;
                    appenders.push(parse_appender(kind, instance)?);
                }
            }
            _ => {
                return Err(invalid(format!(
                    "'appenders.{}' must be a mapping or a list",
                    kind
                )))
            }
        }
    }
    Ok(appenders)
}

fn parse_appender(kind: &str, instance: &ConfigTree) -> Result<AppenderSpec> {
    let name = instance
        .get_str("name")
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| kind.to_string());

    let level = parse_level(instance, "level")?;

    let encoder = match instance.get_key("encoder") {
        None | Some(Value::Null) => EncoderSpec {
            kind: DEFAULT_ENCODER.to_string(),
            options: ConfigTree::new(),
        },
        Some(Value::Str(kind)) => EncoderSpec {
            kind: kind.clone(),
            options: ConfigTree::new(),
        },
        Some(Value::Tree(encoder)) if encoder.len() == 1 => {
            let (kind, options) = encoder
                .iter()
                .next()
                .ok_or_else(|| invalid(format!("appender '{}' has an empty encoder", name)))?;
            let options = match options {
                Value::Null => ConfigTree::new(),
                Value::Tree(options) => options.clone(),
                _ => {
                    return Err(invalid(format!(
                        "encoder options for appender '{}' must be a mapping",
                        name
                    )))
                }
            };
            EncoderSpec {
                kind: kind.to_string(),
                options,
            }
        }
        Some(_) => {
            return Err(invalid(format!(
                "appender '{}' must name exactly one encoder",
                name
            )))
        }
    };

    let mut options = ConfigTree::new();
    for (key, value) in instance.iter() {
        if !matches!(key, "name" | "level" | "encoder") {
            options.insert(key, value.clone());
        }
    }

    Ok(AppenderSpec {
        kind: kind.to_string(),
        name,
        level,
        encoder,
        options,
    })
}

fn parse_named_logger(entry: &ConfigTree) -> Result<LoggerSpec> {
    let name = entry
        .get_str("name")
        .filter(|n| !n.is_empty())
        .ok_or_else(|| invalid("logger entry is missing 'name'"))?;
    parse_logger(name, entry)
}

fn parse_logger(name: String, entry: &ConfigTree) -> Result<LoggerSpec> {
    let level = parse_level(entry, "level")?;

    let appender_refs = match entry.get_key("appender_refs") {
        None | Some(Value::Null) => None,
        Some(Value::List(items)) => Some(
            items
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| {
                    v.as_string()
                        .ok_or_else(|| invalid(format!("logger '{}' has a bad appender ref", name)))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        Some(scalar) => Some(
            scalar
                .as_string()
                .ok_or_else(|| invalid(format!("logger '{}' has a bad appender ref", name)))?
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
    };

    Ok(LoggerSpec {
        name,
        level,
        appender_refs,
    })
}

fn parse_level(tree: &ConfigTree, key: &str) -> Result<Option<Level>> {
    match tree.get_str(key) {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => raw.parse().map(Some),
    }
}
