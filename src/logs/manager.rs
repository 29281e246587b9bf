use super::logger::{Logger, LoggerSlot, Pipeline, Sink};
use super::stdlog::{self, StdLogRedirect, STD_LOG_LOGGER};
use crate::config::{AppenderSpec, ConfigTree, LogConfig, ResolvedConfig};
use crate::error::{LoghubError, Result};
use crate::level::Level;
use crate::plugin::{Appender, PluginRegistry};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Whether the manager still accepts configuration changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Closed,
}

/// How often [`Manager::init_with_config_content`] may succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentInitPolicy {
    /// Every call replaces the configuration
    #[default]
    Repeatable,
    /// Only the first successful call applies; later calls fail
    Once,
}

#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    pub content_init: ContentInitPolicy,
    /// Print configuration content to stderr as it is applied
    pub debug: bool,
}

/// A built appender kept next to the spec it was built from
#[derive(Clone)]
struct LiveAppender {
    spec: AppenderSpec,
    appender: Arc<dyn Appender>,
}

struct ManagerState {
    snapshot: Arc<ConfigTree>,
    config: Arc<LogConfig>,
    appenders: HashMap<String, LiveAppender>,
    loggers: HashMap<Arc<str>, Arc<LoggerSlot>>,
    /// Explicit levels, kept so they survive updates and apply to loggers
    /// created later
    levels: HashMap<String, Level>,
    phase: Phase,
}

/// LogManager owns the configuration snapshot and the name → logger
/// registry, and rebuilds pipelines when the configuration changes.
///
/// Lookups take a read lock; configuration updates are serialized and only
/// hold the write lock while swapping fully built state in.
pub struct Manager {
    registry: Arc<PluginRegistry>,
    options: ManagerOptions,
    state: RwLock<ManagerState>,
    /// Serializes updates
    update_lock: Mutex<()>,
    /// Set after the first successful content init
    content_initialized: Mutex<bool>,
}

impl Manager {
    /// Create a new Manager from a resolved configuration tree
    ///
    /// # Arguments
    /// * `registry` - Plugins available to build appenders and encoders
    /// * `tree` - The effective configuration
    ///
    /// # Returns
    /// * `Ok(Manager)` - Every configured appender was built
    /// * `Err(LoghubError)` - Invalid configuration or a plugin failed
    pub fn new(registry: Arc<PluginRegistry>, tree: ConfigTree) -> Result<Self> {
        Self::with_options(registry, tree, ManagerOptions::default())
    }

    pub fn with_options(
        registry: Arc<PluginRegistry>,
        tree: ConfigTree,
        options: ManagerOptions,
    ) -> Result<Self> {
        let config = LogConfig::from_tree(&tree)?;
        let appenders = build_appenders(&registry, &config, &HashMap::new())?;

        tracing::debug!(appenders = appenders.len(), "Log manager created");

        Ok(Self {
            registry,
            options,
            state: RwLock::new(ManagerState {
                snapshot: Arc::new(tree),
                config: Arc::new(config),
                appenders,
                loggers: HashMap::new(),
                levels: HashMap::new(),
                phase: Phase::Ready,
            }),
            update_lock: Mutex::new(()),
            content_initialized: Mutex::new(false),
        })
    }

    /// Create a Manager from the outcome of [`crate::config::Resolver::resolve`]
    pub fn from_resolved(registry: Arc<PluginRegistry>, resolved: ResolvedConfig) -> Result<Self> {
        Self::new(registry, resolved.tree)
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.state.read().phase
    }

    /// The configuration tree currently in effect
    pub fn snapshot(&self) -> Arc<ConfigTree> {
        self.state.read().snapshot.clone()
    }

    /// The typed view of [`Manager::snapshot`]
    pub fn config(&self) -> Arc<LogConfig> {
        self.state.read().config.clone()
    }

    /// Names of every logger handed out so far, sorted
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .read()
            .loggers
            .keys()
            .map(|name| name.to_string())
            .collect();
        names.sort();
        names
    }

    /// Get the logger bound to `name`, creating it on first use
    ///
    /// Never fails: a name without usable configuration gets the fallback
    /// pipeline. Repeated calls return facades sharing one slot, so a later
    /// update or [`Manager::set_level`] reaches all of them.
    pub fn new_logger(&self, name: &str) -> Logger {
        if let Some((key, slot)) = self.state.read().loggers.get_key_value(name) {
            return Logger::new(key.clone(), slot.clone());
        }

        let mut state = self.state.write();
        if let Some((key, slot)) = state.loggers.get_key_value(name) {
            return Logger::new(key.clone(), slot.clone());
        }

        let pipeline = build_pipeline(&state.config, &state.appenders, name);
        let slot = Arc::new(LoggerSlot::new(
            Arc::new(pipeline),
            state.levels.get(name).copied(),
        ));
        let key: Arc<str> = Arc::from(name);
        state.loggers.insert(key.clone(), slot.clone());

        tracing::trace!(logger = name, "Created logger");
        Logger::new(key, slot)
    }

    /// Replace the configuration and rebuild affected pipelines
    ///
    /// All appenders are built before anything is swapped in, so a failure
    /// leaves the previous configuration fully in effect. Appenders whose
    /// spec did not change are reused, and loggers whose effective settings
    /// did not change keep their pipeline. Loggers set through
    /// [`Manager::update_logger`] are left alone.
    ///
    /// # Returns
    /// * `Ok(())` - The new configuration is in effect
    /// * `Err(LoghubError)` - Nothing changed
    pub fn update(&self, tree: ConfigTree) -> Result<()> {
        let _serialized = self.update_lock.lock();

        let config = LogConfig::from_tree(&tree)?;

        let previous = {
            let state = self.state.read();
            if state.phase == Phase::Closed {
                return Err(LoghubError::Closed);
            }
            state.appenders.clone()
        };
        let appenders = build_appenders(&self.registry, &config, &previous)?;

        let mut state = self.state.write();
        if state.phase == Phase::Closed {
            return Err(LoghubError::Closed);
        }

        let mut rebuilt = 0usize;
        for (name, slot) in &state.loggers {
            if slot.is_external() {
                continue;
            }
            if !pipeline_changed(&state.config, &state.appenders, &config, &appenders, name) {
                continue;
            }
            slot.swap(Arc::new(build_pipeline(&config, &appenders, name)));
            rebuilt += 1;
        }

        let retired: Vec<(String, Arc<dyn Appender>)> = state
            .appenders
            .iter()
            .filter(|(name, old)| {
                appenders
                    .get(*name)
                    .map_or(true, |new| !Arc::ptr_eq(&old.appender, &new.appender))
            })
            .map(|(name, old)| (name.clone(), old.appender.clone()))
            .collect();

        state.snapshot = Arc::new(tree);
        state.config = Arc::new(config);
        state.appenders = appenders;
        drop(state);

        for (name, appender) in retired {
            if let Err(e) = appender.sync() {
                tracing::warn!(appender = %name, error = %e, "Failed to flush retired appender");
            }
        }

        tracing::debug!(rebuilt, "Applied log configuration");
        Ok(())
    }

    /// Parse YAML `content` and apply it through [`Manager::update`]
    ///
    /// Under [`ContentInitPolicy::Once`] only the first successful call
    /// applies; later calls return [`LoghubError::AlreadyInitialized`].
    pub fn init_with_config_content(&self, content: &str) -> Result<()> {
        let mut initialized = self.content_initialized.lock();
        if *initialized && self.options.content_init == ContentInitPolicy::Once {
            return Err(LoghubError::AlreadyInitialized);
        }

        if self.options.debug {
            eprintln!("loghub init with config content:\n{}", content);
        }

        let tree = ConfigTree::from_yaml_str(content)?;
        self.update(tree)?;
        *initialized = true;
        Ok(())
    }

    /// Override the level of one logger
    ///
    /// Touches no other logger, neither ancestors nor descendants. The level
    /// sticks across configuration updates and applies to a logger created
    /// after this call.
    pub fn set_level(&self, name: &str, level: Level) {
        let mut state = self.state.write();
        state.levels.insert(name.to_string(), level);
        if let Some(slot) = state.loggers.get(name) {
            slot.set_override(Some(level));
        }
    }

    /// Drop an override set by [`Manager::set_level`]
    pub fn clear_level(&self, name: &str) {
        let mut state = self.state.write();
        state.levels.remove(name);
        if let Some(slot) = state.loggers.get(name) {
            slot.set_override(None);
        }
    }

    /// The level `name` would log at right now
    pub fn effective_level(&self, name: &str) -> Level {
        let state = self.state.read();
        if let Some(slot) = state.loggers.get(name) {
            return slot
                .level_override()
                .unwrap_or_else(|| slot.pipeline().level());
        }
        state
            .levels
            .get(name)
            .copied()
            .unwrap_or_else(|| state.config.resolve(name).level)
    }

    /// Bind a caller-built pipeline to `name`
    ///
    /// Existing facades switch to it on their next record. Configuration
    /// updates no longer rebuild this logger.
    pub fn update_logger(&self, name: &str, pipeline: Pipeline) {
        let mut state = self.state.write();
        let pipeline = Arc::new(pipeline);

        if let Some(slot) = state.loggers.get(name) {
            slot.swap(pipeline);
            slot.mark_external();
            return;
        }

        let slot = Arc::new(LoggerSlot::new(pipeline, state.levels.get(name).copied()));
        slot.mark_external();
        state.loggers.insert(Arc::from(name), slot);
    }

    /// Flush every live appender
    ///
    /// Every appender is attempted even if some fail; the first failure is
    /// returned. Safe to call from several threads at once.
    pub fn sync(&self) -> Result<()> {
        let targets = self.live_appenders();

        let mut first_error = None;
        for (name, appender) in targets {
            if let Err(source) = appender.sync() {
                tracing::warn!(appender = %name, error = %source, "Failed to sync appender");
                first_error.get_or_insert(LoghubError::Sync { name, source });
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Flush once and stop accepting configuration changes
    ///
    /// Loggers keep working after close. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if state.phase == Phase::Closed {
                return Ok(());
            }
            state.phase = Phase::Closed;
        }
        tracing::debug!("Closing log manager");
        self.sync()
    }

    /// Route records from the `log` crate facade into the `stdlog` logger
    ///
    /// The returned handle cancels the redirection; dropping it does not.
    pub fn redirect_std_log(&self) -> Result<StdLogRedirect> {
        stdlog::redirect(self.new_logger(STD_LOG_LOGGER))
    }

    /// Undo [`Manager::redirect_std_log`]; a no-op if not redirected
    pub fn cancel_redirect_std_log(&self) {
        stdlog::cancel();
    }

    /// Distinct appenders reachable from config or from any logger,
    /// collected under the read lock so the flush itself runs unlocked
    fn live_appenders(&self) -> Vec<(String, Arc<dyn Appender>)> {
        let state = self.state.read();
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        let mut push = |name: &str, appender: &Arc<dyn Appender>| {
            if seen.insert(Arc::as_ptr(appender) as *const () as usize) {
                targets.push((name.to_string(), appender.clone()));
            }
        };

        for (name, live) in &state.appenders {
            push(name.as_str(), &live.appender);
        }
        for slot in state.loggers.values() {
            let pipeline = slot.pipeline();
            for sink in pipeline.sinks() {
                push(sink.name(), sink.appender());
            }
        }
        targets
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Manager")
            .field("phase", &state.phase)
            .field("appenders", &state.appenders.len())
            .field("loggers", &state.loggers.len())
            .field("options", &self.options)
            .finish()
    }
}

/// Build every configured appender, reusing `previous` instances whose spec
/// is unchanged. Registration is checked for all specs before any is built.
fn build_appenders(
    registry: &PluginRegistry,
    config: &LogConfig,
    previous: &HashMap<String, LiveAppender>,
) -> Result<HashMap<String, LiveAppender>> {
    for spec in &config.appenders {
        registry.check(spec)?;
    }

    let mut built = HashMap::with_capacity(config.appenders.len());
    for spec in &config.appenders {
        let live = match previous.get(&spec.name).filter(|live| live.spec == *spec) {
            Some(live) => live.clone(),
            None => LiveAppender {
                spec: spec.clone(),
                appender: registry.build_appender(spec)?,
            },
        };
        built.insert(spec.name.clone(), live);
    }
    Ok(built)
}

/// Wire the pipeline for `name` from already built appenders
fn build_pipeline(
    config: &LogConfig,
    appenders: &HashMap<String, LiveAppender>,
    name: &str,
) -> Pipeline {
    let resolved = config.resolve(name);

    let mut pipeline = Pipeline::new(resolved.level);
    for reference in &resolved.appender_refs {
        match appenders.get(reference) {
            Some(live) => {
                pipeline = pipeline.with_sink(Sink::new(
                    reference.clone(),
                    live.spec.level,
                    live.appender.clone(),
                ));
            }
            None => {
                tracing::warn!(logger = name, appender = %reference, "Appender not built, skipping");
            }
        }
    }

    if pipeline.sinks().is_empty() {
        return Pipeline::fallback(resolved.level);
    }
    pipeline
}

/// Whether `name` needs a new pipeline when moving between configurations
fn pipeline_changed(
    old_config: &LogConfig,
    old_appenders: &HashMap<String, LiveAppender>,
    new_config: &LogConfig,
    new_appenders: &HashMap<String, LiveAppender>,
    name: &str,
) -> bool {
    let old = old_config.resolve(name);
    let new = new_config.resolve(name);
    if old != new {
        return true;
    }

    new.appender_refs.iter().any(|reference| {
        match (old_appenders.get(reference), new_appenders.get(reference)) {
            (Some(a), Some(b)) => !Arc::ptr_eq(&a.appender, &b.appender) || a.spec.level != b.spec.level,
            (None, None) => false,
            _ => true,
        }
    })
}

#[cfg(test)]
mod tests;
