use std::path::PathBuf;
use thiserror::Error;

/// Main error type for loghub
#[derive(Debug, Error)]
pub enum LoghubError {
    // Resolution errors
    #[error("Failed to load config file {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("Multiple config files found: {0:?}")]
    AmbiguousConfig(Vec<PathBuf>),

    // Parse and validation errors
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid config path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    // Plugin errors
    #[error("{kind} plugin not found: {name}")]
    PluginNotFound { kind: PluginKind, name: String },

    #[error("{kind} plugin already registered: {name}")]
    DuplicatePlugin { kind: PluginKind, name: String },

    #[error("Failed to build {kind} '{name}': {reason}")]
    PluginBuild {
        kind: PluginKind,
        name: String,
        reason: String,
    },

    // Manager lifecycle errors
    #[error("Log manager is closed")]
    Closed,

    #[error("Log manager was already initialized from config content")]
    AlreadyInitialized,

    #[error("Failed to redirect std log: {0}")]
    StdLogRedirect(String),

    #[error("Signal error: {0}")]
    SignalError(String),

    // Flush errors
    #[error("Failed to sync appender '{name}': {source}")]
    Sync {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which half of a pipeline a plugin builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Encoder,
    Appender,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginKind::Encoder => write!(f, "encoder"),
            PluginKind::Appender => write!(f, "appender"),
        }
    }
}

/// Result type alias for loghub operations
pub type Result<T> = std::result::Result<T, LoghubError>;
