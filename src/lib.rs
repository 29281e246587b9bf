// Library exports for loghub, a configurable logging facade

pub mod config;
pub mod error;
pub mod global;
pub mod level;
pub mod lifecycle;
pub mod logs;
pub mod plugin;

pub use config::{ConfigSource, ConfigTree, Resolver};
pub use error::{LoghubError, Result};
pub use level::Level;
pub use logs::{ContentInitPolicy, Logger, Manager, ManagerOptions, Phase, Pipeline, Record, Sink};
pub use plugin::{Appender, Encoder, PluginRegistry};
