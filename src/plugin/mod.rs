//! Encoder and appender plugins
//!
//! The registry maps plugin names to constructors. The host populates it
//! before building a [`crate::Manager`]; once handed over (as an `Arc`) it is
//! read-only and may be shared by several managers.

mod console;
mod encoder;
mod file;

pub use console::{ConsoleAppender, ConsoleTarget};
pub use encoder::{ConsoleEncoder, JsonEncoder};
pub use file::FileAppender;

use crate::config::{AppenderSpec, ConfigTree, EncoderSpec};
use crate::error::{LoghubError, PluginKind, Result};
use crate::logs::Record;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

/// Turns a record into bytes
pub trait Encoder: Send + Sync {
    fn encode(&self, record: &Record<'_>) -> Vec<u8>;
}

/// Delivers records to an output and flushes it on demand
pub trait Appender: Send + Sync {
    fn append(&self, record: &Record<'_>) -> io::Result<()>;

    /// Flush any buffered output
    fn sync(&self) -> io::Result<()>;
}

/// Builds an encoder from its options subtree
pub type EncoderConstructor = Arc<dyn Fn(&ConfigTree) -> Result<Box<dyn Encoder>> + Send + Sync>;

/// Builds an appender from its options subtree and its encoder
pub type AppenderConstructor =
    Arc<dyn Fn(&ConfigTree, Box<dyn Encoder>) -> Result<Arc<dyn Appender>> + Send + Sync>;

/// Append-only mapping from plugin name to constructor
#[derive(Clone, Default)]
pub struct PluginRegistry {
    encoders: HashMap<String, EncoderConstructor>,
    appenders: HashMap<String, AppenderConstructor>,
}

impl PluginRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `console`/`json` encoders and
    /// `console`/`file` appenders
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // A fresh registry cannot hold duplicates
        let _ = registry.register_builtins();
        registry
    }

    /// Register the built-in plugins into this registry
    pub fn register_builtins(&mut self) -> Result<()> {
        self.register_encoder("console", |options| {
            Ok(Box::new(ConsoleEncoder::from_options(options)?) as Box<dyn Encoder>)
        })?;
        self.register_encoder("json", |options| {
            Ok(Box::new(JsonEncoder::from_options(options)?) as Box<dyn Encoder>)
        })?;
        self.register_appender("console", |options, encoder| {
            Ok(Arc::new(ConsoleAppender::from_options(options, encoder)?) as Arc<dyn Appender>)
        })?;
        self.register_appender("file", |options, encoder| {
            Ok(Arc::new(FileAppender::from_options(options, encoder)?) as Arc<dyn Appender>)
        })?;
        Ok(())
    }

    /// Register an encoder constructor. Names cannot be re-registered.
    pub fn register_encoder<F>(&mut self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn(&ConfigTree) -> Result<Box<dyn Encoder>> + Send + Sync + 'static,
    {
        if self.encoders.contains_key(name) {
            return Err(LoghubError::DuplicatePlugin {
                kind: PluginKind::Encoder,
                name: name.to_string(),
            });
        }
        self.encoders.insert(name.to_string(), Arc::new(constructor));
        Ok(())
    }

    /// Register an appender constructor. Names cannot be re-registered.
    pub fn register_appender<F>(&mut self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn(&ConfigTree, Box<dyn Encoder>) -> Result<Arc<dyn Appender>> + Send + Sync + 'static,
    {
        if self.appenders.contains_key(name) {
            return Err(LoghubError::DuplicatePlugin {
                kind: PluginKind::Appender,
                name: name.to_string(),
            });
        }
        self.appenders.insert(name.to_string(), Arc::new(constructor));
        Ok(())
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains_key(name)
    }

    pub fn has_appender(&self, name: &str) -> bool {
        self.appenders.contains_key(name)
    }

    /// Check that every plugin `spec` names is registered, without building
    pub fn check(&self, spec: &AppenderSpec) -> Result<()> {
        if !self.has_appender(&spec.kind) {
            return Err(not_found(PluginKind::Appender, &spec.kind));
        }
        if !self.has_encoder(&spec.encoder.kind) {
            return Err(not_found(PluginKind::Encoder, &spec.encoder.kind));
        }
        Ok(())
    }

    pub fn build_encoder(&self, spec: &EncoderSpec) -> Result<Box<dyn Encoder>> {
        let constructor = self
            .encoders
            .get(&spec.kind)
            .ok_or_else(|| not_found(PluginKind::Encoder, &spec.kind))?;
        constructor(&spec.options)
    }

    /// Build an appender instance together with its encoder
    pub fn build_appender(&self, spec: &AppenderSpec) -> Result<Arc<dyn Appender>> {
        self.check(spec)?;
        let constructor = self
            .appenders
            .get(&spec.kind)
            .ok_or_else(|| not_found(PluginKind::Appender, &spec.kind))?;

        let encoder = self.build_encoder(&spec.encoder)?;
        constructor(&spec.options, encoder).map_err(|e| match e {
            e @ LoghubError::PluginBuild { .. } => e,
            other => LoghubError::PluginBuild {
                kind: PluginKind::Appender,
                name: spec.name.clone(),
                reason: other.to_string(),
            },
        })
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut encoders: Vec<&String> = self.encoders.keys().collect();
        let mut appenders: Vec<&String> = self.appenders.keys().collect();
        encoders.sort();
        appenders.sort();
        f.debug_struct("PluginRegistry")
            .field("encoders", &encoders)
            .field("appenders", &appenders)
            .finish()
    }
}

fn not_found(kind: PluginKind, name: &str) -> LoghubError {
    LoghubError::PluginNotFound {
        kind,
        name: name.to_string(),
    }
}

/// Shared option parsing for the built-in plugins
pub(crate) fn option_bool(options: &ConfigTree, key: &str, default: bool) -> Result<bool> {
    match options.get(key) {
        None | Some(crate::config::Value::Null) => Ok(default),
        Some(value) => value.as_bool().ok_or_else(|| {
            LoghubError::InvalidConfig(format!("option '{}' must be a boolean", key))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullAppender;

    impl Appender for NullAppender {
        fn append(&self, _record: &Record<'_>) -> io::Result<()> {
            Ok(())
        }

        fn sync(&self) -> io::Result<()> {
            Ok(())
        }
    }

    fn spec(kind: &str, encoder: &str) -> AppenderSpec {
        AppenderSpec {
            kind: kind.to_string(),
            name: "TEST".to_string(),
            level: None,
            encoder: EncoderSpec {
                kind: encoder.to_string(),
                options: ConfigTree::new(),
            },
            options: ConfigTree::new(),
        }
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.has_encoder("console"));
        assert!(registry.has_encoder("json"));
        assert!(registry.has_appender("console"));
        assert!(registry.has_appender("file"));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = PluginRegistry::with_builtins();
        let result = registry.register_appender("console", |_, _| {
            Ok(Arc::new(NullAppender) as Arc<dyn Appender>)
        });
        assert!(matches!(
            result,
            Err(LoghubError::DuplicatePlugin {
                kind: PluginKind::Appender,
                ..
            })
        ));
    }

    #[test]
    fn test_custom_appender_is_built() {
        let mut registry = PluginRegistry::new();
        registry
            .register_encoder("console", |options| {
                Ok(Box::new(ConsoleEncoder::from_options(options)?) as Box<dyn Encoder>)
            })
            .unwrap();
        registry
            .register_appender("null", |_, _| Ok(Arc::new(NullAppender) as Arc<dyn Appender>))
            .unwrap();

        assert!(registry.build_appender(&spec("null", "console")).is_ok());
    }

    #[test]
    fn test_unknown_plugins_are_reported() {
        let registry = PluginRegistry::with_builtins();

        match registry.build_appender(&spec("kafka", "console")) {
            Err(LoghubError::PluginNotFound { kind, name }) => {
                assert_eq!(kind, PluginKind::Appender);
                assert_eq!(name, "kafka");
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }

        match registry.build_appender(&spec("console", "gelf")) {
            Err(LoghubError::PluginNotFound { kind, name }) => {
                assert_eq!(kind, PluginKind::Encoder);
                assert_eq!(name, "gelf");
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }
}
