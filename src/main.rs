use anyhow::Context;
use loghub::config::{CONFIG_ENV, ROOT_LOGGER};
use loghub::{ConfigSource, Manager, PluginRegistry, Resolver};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Library diagnostics go to stderr, filtered by RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let resolver = Resolver::from_env();
    let resolved = resolver
        .resolve()
        .context("Failed to resolve log configuration")?;

    match &resolved.source {
        ConfigSource::EnvFile(path) => println!("# source: {} (env)", path.display()),
        ConfigSource::WorkDir(path) => println!("# source: {}", path.display()),
        ConfigSource::Default => println!("# source: built-in default"),
    }
    for err in &resolved.override_errors {
        println!("# skipped {} entry: {}", CONFIG_ENV, err);
    }
    print!("{}", resolved.tree.to_yaml_string());

    let manager = Manager::from_resolved(Arc::new(PluginRegistry::with_builtins()), resolved)
        .context("Failed to build log manager")?;

    let root = manager.new_logger(ROOT_LOGGER);
    root.info(format!("loghub ready at level {}", root.level()));

    manager.close().context("Failed to flush log output")?;
    Ok(())
}
