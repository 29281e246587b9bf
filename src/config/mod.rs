//! Configuration resolution
//!
//! # Data Flow
//! ```text
//! LOGHUB_CONFIG_FILE | ./loghub.yaml | ./loghub.yml | DEFAULT_CONFIG
//!     → source.rs (locate and load exactly one primary tree)
//!     → merge.rs (LOGHUB_CONFIG override, per-path precedence)
//!     → tree.rs (ConfigTree snapshot)
//!     → model.rs (typed LogConfig, validated)
//!     → Manager
//! ```

pub mod merge;
pub mod model;
pub mod source;
pub mod tree;

pub use merge::{merge_override, parse_override};
pub use model::{
    AppenderSpec, EncoderSpec, LogConfig, LoggerSpec, ResolvedLogger, DEFAULT_ENCODER, ROOT_LOGGER,
};
pub use source::{ConfigSource, ResolvedConfig, Resolver};
pub use tree::{ConfigTree, Value, MAX_LIST_GAP};

/// Names a config file that must load
pub const CONFIG_FILE_ENV: &str = "LOGHUB_CONFIG_FILE";

/// Boolean flag enabling diagnostic printing to stderr
pub const DEBUG_ENV: &str = "LOGHUB_DEBUG";

/// Inline `path=value;path=value` override
pub const CONFIG_ENV: &str = "LOGHUB_CONFIG";

/// File names looked up in the working directory
pub const DISCOVERY_FILES: [&str; 2] = ["loghub.yaml", "loghub.yml"];

/// Configuration used when no file is found
pub const DEFAULT_CONFIG: &str = r#"appenders:
  console:
    - name: CONSOLE
      target: stdout
      encoder:
        console:
          color: false
loggers:
  root:
    level: info
    appender_refs:
      - CONSOLE
"#;
