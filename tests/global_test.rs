// The global manager is built once per process, so everything runs in one test

use loghub::config::{CONFIG_ENV, CONFIG_FILE_ENV};
use loghub::{global, Level, LoghubError, Phase, Pipeline};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_global_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("global.log");
    let config_path = temp_dir.path().join("custom.yaml");
    fs::write(
        &config_path,
        format!(
            "appenders:\n  file:\n    - name: FILE\n      path: {}\nloggers:\n  root:\n    level: warn\n    appender_refs: [FILE]\n",
            log_path.display()
        ),
    )
    .unwrap();
    std::env::set_var(CONFIG_FILE_ENV, &config_path);
    std::env::set_var(CONFIG_ENV, "loggers.root.level=info");

    let manager = global::try_init().unwrap();
    assert_eq!(manager.effective_level("app"), Level::Info);

    // Later init attempts observe the first manager
    assert!(std::sync::Arc::ptr_eq(&manager, &global::manager()));
    assert!(matches!(
        global::init(loghub::PluginRegistry::new()),
        Err(LoghubError::AlreadyInitialized)
    ));

    let logger = global::new("app");
    logger.info("through the global layer");
    global::set_level("app", Level::Error);
    logger.warn("suppressed");
    global::sync();

    let content = fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("through the global layer"));
    assert!(!content.contains("suppressed"));

    // Std log was redirected at init
    log::error!("via log crate");
    global::cancel_redirect_std_log();
    log::error!("not redirected");
    global::sync();
    let content = fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("via log crate"));
    assert!(!content.contains("not redirected"));

    global::update_logger("custom", Pipeline::new(Level::Trace));
    assert_eq!(global::new("custom").level(), Level::Trace);

    global::init_with_config_content("loggers:\n  root:\n    level: debug\n").unwrap();
    assert_eq!(global::new("other").level(), Level::Debug);
    // The explicit override outlives the new content
    assert_eq!(logger.level(), Level::Error);

    global::close().unwrap();
    assert_eq!(manager.phase(), Phase::Closed);
    assert!(global::init_with_config_content("loggers: {}\n").is_err());
}
