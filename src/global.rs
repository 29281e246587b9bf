//! Process-wide manager
//!
//! The first call to any function here resolves the configuration from the
//! environment and builds the shared [`Manager`]. Initialization runs once:
//! concurrent callers block on the init lock and then observe the result.
//! Hosts that need extra plugins call [`init`] with their registry before
//! anything else touches the global manager.

use crate::config::Resolver;
use crate::error::{LoghubError, Result};
use crate::level::Level;
use crate::logs::{Logger, Manager, ManagerOptions, Pipeline, StdLogRedirect};
use crate::plugin::PluginRegistry;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

static MANAGER: OnceLock<Arc<Manager>> = OnceLock::new();
static INIT_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Build the global manager with the built-in plugins, if not built yet
pub fn try_init() -> Result<Arc<Manager>> {
    if let Some(manager) = MANAGER.get() {
        return Ok(manager.clone());
    }
    let _guard = INIT_LOCK.lock();
    if let Some(manager) = MANAGER.get() {
        return Ok(manager.clone());
    }
    build(PluginRegistry::with_builtins())
}

/// Build the global manager with a host-populated registry
///
/// Fails with [`LoghubError::AlreadyInitialized`] if the global manager
/// already exists, since its registry can no longer change.
pub fn init(registry: PluginRegistry) -> Result<Arc<Manager>> {
    let _guard = INIT_LOCK.lock();
    if MANAGER.get().is_some() {
        return Err(LoghubError::AlreadyInitialized);
    }
    build(registry)
}

/// Resolve, construct and publish. Caller holds `INIT_LOCK`.
fn build(registry: PluginRegistry) -> Result<Arc<Manager>> {
    let resolver = Resolver::from_env();
    let resolved = resolver.resolve()?;
    let options = ManagerOptions {
        debug: resolver.debug(),
        ..ManagerOptions::default()
    };
    let manager = Arc::new(Manager::with_options(
        Arc::new(registry),
        resolved.tree,
        options,
    )?);

    // Another `log` backend may already own the facade
    if let Err(e) = manager.redirect_std_log() {
        tracing::debug!(error = %e, "Std log not redirected");
    }

    tracing::debug!(source = ?resolved.source, "Global log manager initialized");
    Ok(MANAGER.get_or_init(|| manager).clone())
}

/// The global manager
///
/// # Panics
///
/// Panics if the manager cannot be built: an unreadable
/// `LOGHUB_CONFIG_FILE`, ambiguous discovery files, or an invalid
/// configuration. Call [`try_init`] first to handle those as errors.
pub fn manager() -> Arc<Manager> {
    match try_init() {
        Ok(manager) => manager,
        Err(e) => panic!("loghub initialization failed: {}", e),
    }
}

/// Flush pending output, then return the logger bound to `name`
pub fn new(name: &str) -> Logger {
    let manager = manager();
    if let Err(e) = manager.sync() {
        tracing::debug!(error = %e, "Sync before logger lookup failed");
    }
    manager.new_logger(name)
}

/// Replace the configuration with a YAML document
pub fn init_with_config_content(content: &str) -> Result<()> {
    try_init()?.init_with_config_content(content)
}

pub fn set_level(name: &str, level: Level) {
    manager().set_level(name, level)
}

pub fn update_logger(name: &str, pipeline: Pipeline) {
    manager().update_logger(name, pipeline)
}

/// Flush every appender, ignoring failures
pub fn sync() {
    if let Some(manager) = MANAGER.get() {
        let _ = manager.sync();
    }
}

pub fn redirect_std_log() -> Result<StdLogRedirect> {
    try_init()?.redirect_std_log()
}

pub fn cancel_redirect_std_log() {
    if let Some(manager) = MANAGER.get() {
        manager.cancel_redirect_std_log();
    }
}

/// Close the global manager if it was ever built
pub fn close() -> Result<()> {
    match MANAGER.get() {
        Some(manager) => manager.close(),
        None => Ok(()),
    }
}
