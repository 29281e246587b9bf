use super::*;
use crate::logs::Record;
use crate::plugin::option_bool;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const BASE: &str = r#"
appenders:
  memory:
    - name: MAIN
      tag: main
    - name: AUDIT
      tag: audit
loggers:
  root:
    level: info
    appender_refs: [MAIN]
  logger:
    - name: audit
      appender_refs: [AUDIT]
"#;

/// Everything written through `memory` appenders, shared across instances
#[derive(Default)]
struct Recorded {
    lines: Mutex<Vec<String>>,
    syncs: AtomicUsize,
}

impl Recorded {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

struct MemoryAppender {
    tag: String,
    fail_sync: bool,
    recorded: Arc<Recorded>,
}

impl Appender for MemoryAppender {
    fn append(&self, record: &Record<'_>) -> io::Result<()> {
        self.recorded.lines.lock().push(format!(
            "{}|{}|{}",
            self.tag, record.logger, record.message
        ));
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        self.recorded.syncs.fetch_add(1, Ordering::SeqCst);
        if self.fail_sync {
            return Err(io::Error::other("disk full"));
        }
        Ok(())
    }
}

fn create_test_registry(recorded: &Arc<Recorded>) -> Arc<PluginRegistry> {
    let mut registry = PluginRegistry::with_builtins();
    let recorded = recorded.clone();
    registry
        .register_appender("memory", move |options, _encoder| {
            Ok(Arc::new(MemoryAppender {
                tag: options.get_str("tag").unwrap_or_default(),
                fail_sync: option_bool(options, "fail_sync", false)?,
                recorded: recorded.clone(),
            }) as Arc<dyn Appender>)
        })
        .unwrap();
    Arc::new(registry)
}

fn create_test_manager(yaml: &str) -> (Manager, Arc<Recorded>) {
    let recorded = Arc::new(Recorded::default());
    let manager = Manager::new(
        create_test_registry(&recorded),
        ConfigTree::from_yaml_str(yaml).unwrap(),
    )
    .unwrap();
    (manager, recorded)
}

fn tree(yaml: &str) -> ConfigTree {
    ConfigTree::from_yaml_str(yaml).unwrap()
}

#[test]
fn test_manager_new() {
    let (manager, _) = create_test_manager(BASE);
    assert_eq!(manager.phase(), Phase::Ready);
    assert!(manager.logger_names().is_empty());
    assert_eq!(manager.config().appenders.len(), 2);
}

#[test]
fn test_manager_new_rejects_unknown_plugin() {
    let recorded = Arc::new(Recorded::default());
    let result = Manager::new(
        create_test_registry(&recorded),
        tree("appenders:\n  kafka:\n    - name: K\n"),
    );
    assert!(matches!(result, Err(LoghubError::PluginNotFound { .. })));
}

#[test]
fn test_new_logger_routes_by_hierarchy() {
    let (manager, recorded) = create_test_manager(BASE);

    manager.new_logger("app").info("to main");
    manager.new_logger("audit.login").info("to audit");

    assert_eq!(
        recorded.lines(),
        vec!["main|app|to main", "audit|audit.login|to audit"]
    );
}

#[test]
fn test_new_logger_shares_one_slot_per_name() {
    let (manager, _) = create_test_manager(BASE);

    let first = manager.new_logger("app");
    let second = manager.new_logger("app");

    assert!(Arc::ptr_eq(&first.pipeline(), &second.pipeline()));
    assert_eq!(manager.logger_names(), vec!["app"]);
}

#[test]
fn test_new_logger_without_refs_uses_fallback() {
    let (manager, _) = create_test_manager("loggers:\n  root:\n    level: warn\n");

    let logger = manager.new_logger("anything");
    assert!(logger.pipeline().is_fallback());
    assert_eq!(logger.level(), Level::Warn);
}

#[test]
fn test_update_swaps_existing_loggers() {
    let (manager, recorded) = create_test_manager(BASE);
    let logger = manager.new_logger("app");
    logger.debug("dropped");

    manager
        .update(tree(&BASE.replace("level: info", "level: debug")))
        .unwrap();
    logger.debug("kept");

    assert_eq!(recorded.lines(), vec!["main|app|kept"]);
    assert_eq!(
        manager.snapshot().get_str("loggers.root.level"),
        Some("debug".to_string())
    );
}

#[test]
fn test_update_keeps_unchanged_pipelines() {
    let (manager, recorded) = create_test_manager(BASE);
    let app = manager.new_logger("app");
    let audit = manager.new_logger("audit");
    let before = app.pipeline();
    let audit_before = audit.pipeline();

    let changed = BASE.replace("    - name: audit\n", "    - name: audit\n      level: error\n");
    manager.update(tree(&changed)).unwrap();

    assert!(Arc::ptr_eq(&before, &app.pipeline()));
    assert!(!Arc::ptr_eq(&audit_before, &audit.pipeline()));
    assert_eq!(audit.level(), Level::Error);
    // Reused appenders are not retired
    assert_eq!(recorded.syncs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_update_with_unregistered_plugin_changes_nothing() {
    let (manager, recorded) = create_test_manager(BASE);
    let logger = manager.new_logger("app");
    let snapshot = manager.snapshot();

    let result = manager.update(tree(
        "appenders:\n  kafka:\n    - name: K\nloggers:\n  root:\n    appender_refs: [K]\n",
    ));
    assert!(matches!(result, Err(LoghubError::PluginNotFound { .. })));

    logger.info("still here");
    assert_eq!(recorded.lines(), vec!["main|app|still here"]);
    assert_eq!(*manager.snapshot(), *snapshot);
}

#[test]
fn test_update_with_failing_build_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (manager, recorded) = create_test_manager(BASE);
    let logger = manager.new_logger("app");

    // The directory itself cannot be opened as a log file
    let broken = format!(
        r#"
appenders:
  memory:
    - name: MAIN
      tag: renamed
  file:
    - name: FILE
      path: {}
loggers:
  root:
    appender_refs: [MAIN, FILE]
"#,
        temp_dir.path().display()
    );
    let result = manager.update(tree(&broken));
    assert!(result.is_err());

    logger.info("old instance");
    assert_eq!(recorded.lines(), vec!["main|app|old instance"]);
}

#[test]
fn test_update_with_invalid_config_changes_nothing() {
    let (manager, _) = create_test_manager(BASE);
    let logger = manager.new_logger("app");

    let result = manager.update(tree("loggers:\n  root:\n    appender_refs: [NOPE]\n"));
    assert!(matches!(result, Err(LoghubError::InvalidConfig(_))));
    assert_eq!(logger.level(), Level::Info);
    assert_eq!(manager.config().appenders.len(), 2);
}

#[test]
fn test_update_flushes_retired_appenders() {
    let (manager, recorded) = create_test_manager(BASE);

    manager
        .update(tree(
            "appenders:\n  memory:\n    - name: MAIN\n      tag: main\nloggers:\n  root:\n    appender_refs: [MAIN]\n",
        ))
        .unwrap();

    // AUDIT was dropped, MAIN was reused
    assert_eq!(recorded.syncs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_set_level_touches_one_logger() {
    let (manager, _) = create_test_manager(BASE);
    let parent = manager.new_logger("a");
    let target = manager.new_logger("a.b");
    let child = manager.new_logger("a.b.c");

    manager.set_level("a.b", Level::Debug);

    assert_eq!(target.level(), Level::Debug);
    assert_eq!(parent.level(), Level::Info);
    assert_eq!(child.level(), Level::Info);
}

#[test]
fn test_set_level_survives_update_and_applies_to_new_loggers() {
    let (manager, _) = create_test_manager(BASE);
    manager.set_level("later", Level::Trace);
    manager.set_level("app", Level::Error);
    let app = manager.new_logger("app");

    manager
        .update(tree(&BASE.replace("level: info", "level: debug")))
        .unwrap();

    assert_eq!(app.level(), Level::Error);
    assert_eq!(manager.new_logger("later").level(), Level::Trace);
    assert_eq!(manager.effective_level("app"), Level::Error);
}

#[test]
fn test_clear_level() {
    let (manager, _) = create_test_manager(BASE);
    let logger = manager.new_logger("app");

    manager.set_level("app", Level::Off);
    assert!(!logger.enabled(Level::Error));

    manager.clear_level("app");
    assert_eq!(logger.level(), Level::Info);
    assert_eq!(manager.effective_level("never.created"), Level::Info);
}

#[test]
fn test_update_logger_is_not_rebuilt_by_config() {
    let (manager, recorded) = create_test_manager(BASE);
    let logger = manager.new_logger("custom");

    let registry = manager.registry().clone();
    let spec = manager.config().appender("AUDIT").cloned().unwrap();
    let audit = registry.build_appender(&spec).unwrap();
    manager.update_logger("custom", Pipeline::new(Level::Debug).with_appender("AUDIT", audit));

    manager
        .update(tree(&BASE.replace("level: info", "level: error")))
        .unwrap();
    logger.debug("external");

    assert_eq!(recorded.lines(), vec!["audit|custom|external"]);
}

#[test]
fn test_sync_attempts_every_appender() {
    let (manager, recorded) =
        create_test_manager(&BASE.replace("tag: main", "tag: main\n      fail_sync: true"));
    manager.new_logger("app").info("buffered");

    let result = manager.sync();

    assert!(matches!(result, Err(LoghubError::Sync { ref name, .. }) if name == "MAIN"));
    assert_eq!(recorded.syncs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_close_is_idempotent() {
    let (manager, recorded) = create_test_manager(BASE);
    let logger = manager.new_logger("app");

    manager.close().unwrap();
    manager.close().unwrap();
    assert_eq!(manager.phase(), Phase::Closed);
    assert_eq!(recorded.syncs.load(Ordering::SeqCst), 2);

    assert!(matches!(manager.update(tree(BASE)), Err(LoghubError::Closed)));
    assert!(matches!(
        manager.init_with_config_content(BASE),
        Err(LoghubError::Closed)
    ));

    logger.info("after close");
    assert_eq!(recorded.lines(), vec!["main|app|after close"]);
}

#[test]
fn test_init_with_config_content_repeatable() {
    let (manager, _) = create_test_manager(BASE);

    manager
        .init_with_config_content(&BASE.replace("level: info", "level: warn"))
        .unwrap();
    manager.init_with_config_content(BASE).unwrap();

    assert_eq!(manager.effective_level("app"), Level::Info);
}

#[test]
fn test_init_with_config_content_once() {
    let recorded = Arc::new(Recorded::default());
    let manager = Manager::with_options(
        create_test_registry(&recorded),
        tree(BASE),
        ManagerOptions {
            content_init: ContentInitPolicy::Once,
            debug: false,
        },
    )
    .unwrap();

    // A failed attempt does not use up the single init
    assert!(manager.init_with_config_content("appenders: [").is_err());
    manager
        .init_with_config_content(&BASE.replace("level: info", "level: warn"))
        .unwrap();

    assert!(matches!(
        manager.init_with_config_content(BASE),
        Err(LoghubError::AlreadyInitialized)
    ));
    assert_eq!(manager.effective_level("app"), Level::Warn);
}

#[test]
fn test_concurrent_lookups_and_updates() {
    let (manager, _) = create_test_manager(BASE);
    let debug = BASE.replace("level: info", "level: debug");

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for i in 0..50 {
                    let logger = manager.new_logger(&format!("worker.{}", i % 5));
                    logger.info("tick");
                }
            });
        }
        scope.spawn(|| {
            for i in 0..20 {
                let yaml = if i % 2 == 0 { debug.as_str() } else { BASE };
                manager.update(tree(yaml)).unwrap();
            }
        });
    });

    assert_eq!(manager.logger_names().len(), 5);
    // The last update applied BASE
    assert_eq!(manager.new_logger("worker.0").level(), Level::Info);
}
