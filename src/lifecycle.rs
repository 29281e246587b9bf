//! Shutdown hooks
//!
//! Nothing here runs on its own. A host picks one of these and wires it in
//! during startup so buffered output reaches its sinks before the process
//! goes away.

use crate::error::{LoghubError, Result};
use crate::logs::Manager;
use std::sync::Arc;
use tokio::signal;

/// Resolve once SIGTERM or SIGINT arrives
#[cfg(unix)]
pub async fn shutdown_signal() -> Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| LoghubError::SignalError(format!("Failed to setup SIGTERM handler: {}", e)))?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| LoghubError::SignalError(format!("Failed to setup SIGINT handler: {}", e)))?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::debug!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::debug!("Received SIGINT");
        }
    }
    Ok(())
}

/// Resolve once Ctrl-C arrives
#[cfg(not(unix))]
pub async fn shutdown_signal() -> Result<()> {
    signal::ctrl_c()
        .await
        .map_err(|e| LoghubError::SignalError(format!("Failed to setup Ctrl-C handler: {}", e)))?;
    tracing::debug!("Received Ctrl-C");
    Ok(())
}

/// Wait for a termination signal, then close `manager`
///
/// Meant to be spawned as a task; the caller decides whether to exit.
pub async fn close_on_shutdown_signal(manager: Arc<Manager>) -> Result<()> {
    shutdown_signal().await?;
    manager.close()
}

/// A closure that closes `manager`, for hosts with their own shutdown path
pub fn shutdown_hook(manager: Arc<Manager>) -> impl FnOnce() + Send + 'static {
    move || close_logging_errors(&manager)
}

/// Close `manager`, reporting a failed flush through `tracing`
fn close_logging_errors(manager: &Manager) {
    if let Err(e) = manager.close() {
        tracing::error!("Failed to flush logs on shutdown: {}", e);
    }
}

/// Install a process-wide SIGINT/SIGTERM handler that closes `manager` and
/// exits with status 0
///
/// Only one such handler can exist per process.
pub fn install_termination_handler(manager: Arc<Manager>) -> Result<()> {
    ctrlc::set_handler(move || {
        close_logging_errors(&manager);
        std::process::exit(0);
    })
    .map_err(|e| LoghubError::SignalError(format!("Failed to install termination handler: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigTree, DEFAULT_CONFIG};
    use crate::logs::Phase;
    use crate::logs::Record;
    use crate::plugin::{Appender, PluginRegistry};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct BrokenAppender(Arc<AtomicUsize>);

    impl Appender for BrokenAppender {
        fn append(&self, _record: &Record<'_>) -> io::Result<()> {
            Ok(())
        }

        fn sync(&self) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::other("device gone"))
        }
    }

    fn create_test_manager() -> Arc<Manager> {
        Arc::new(
            Manager::new(
                Arc::new(PluginRegistry::with_builtins()),
                ConfigTree::from_yaml_str(DEFAULT_CONFIG).unwrap(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_shutdown_hook_closes_manager() {
        let manager = create_test_manager();
        let hook = shutdown_hook(manager.clone());

        hook();
        assert_eq!(manager.phase(), Phase::Closed);
    }

    #[test]
    fn test_failed_flush_on_shutdown_still_closes() {
        let syncs = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::with_builtins();
        let counter = syncs.clone();
        registry
            .register_appender("broken", move |_options, _encoder| {
                Ok(Arc::new(BrokenAppender(counter.clone())) as Arc<dyn Appender>)
            })
            .unwrap();
        let manager = Manager::new(
            Arc::new(registry),
            ConfigTree::from_yaml_str(
                "appenders:\n  broken:\n    name: B\nloggers:\n  root:\n    level: info\n    appender_refs: [B]\n",
            )
            .unwrap(),
        )
        .unwrap();

        close_logging_errors(&manager);

        assert_eq!(manager.phase(), Phase::Closed);
        assert_eq!(syncs.load(Ordering::SeqCst), 1);

        // Already closed, no second flush
        close_logging_errors(&manager);
        assert_eq!(syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_waits_for_signal() {
        let manager = create_test_manager();
        let task = tokio::spawn(close_on_shutdown_signal(manager.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.phase(), Phase::Ready);

        task.abort();
    }
}
