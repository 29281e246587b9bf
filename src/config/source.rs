//! Primary configuration source resolution
//!
//! Exactly one primary source is chosen, in order:
//! 1. the file named by `LOGHUB_CONFIG_FILE` (mandatory once set)
//! 2. a single `loghub.yaml` / `loghub.yml` in the working directory
//! 3. the compiled-in [`DEFAULT_CONFIG`]
//!
//! The inline `LOGHUB_CONFIG` override is merged afterwards by
//! [`crate::config::merge`]; it never acts as a primary source.

use super::merge::parse_override;
use super::tree::{parse_bool, ConfigTree};
use super::{CONFIG_ENV, CONFIG_FILE_ENV, DEBUG_ENV, DEFAULT_CONFIG, DISCOVERY_FILES};
use crate::error::{LoghubError, Result};
use std::path::{Path, PathBuf};

/// Where the primary configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path taken from `LOGHUB_CONFIG_FILE`
    EnvFile(PathBuf),
    /// File discovered in the working directory
    WorkDir(PathBuf),
    /// Compiled-in default literal
    Default,
}

/// Outcome of resolving and merging the configuration
#[derive(Debug)]
pub struct ResolvedConfig {
    pub source: ConfigSource,
    pub tree: ConfigTree,
    /// Override assignments that could not be applied
    pub override_errors: Vec<LoghubError>,
}

/// Locates the primary source and applies the inline override.
///
/// Environment values are captured once by [`Resolver::from_env`]; tests and
/// embedders can build a resolver with explicit values instead.
#[derive(Debug, Clone)]
pub struct Resolver {
    config_file: Option<String>,
    inline_config: Option<String>,
    work_dir: PathBuf,
    debug: bool,
}

impl Resolver {
    /// Resolver rooted at `work_dir` with no environment input
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Self {
        Self {
            config_file: None,
            inline_config: None,
            work_dir: work_dir.as_ref().to_path_buf(),
            debug: false,
        }
    }

    /// Capture the process environment and current directory
    pub fn from_env() -> Self {
        let work_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let debug = std::env::var(DEBUG_ENV)
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);

        Self {
            config_file: non_empty_var(CONFIG_FILE_ENV),
            inline_config: non_empty_var(CONFIG_ENV),
            work_dir,
            debug,
        }
    }

    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_inline_config(mut self, content: impl Into<String>) -> Self {
        self.inline_config = Some(content.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Decide which primary source applies without loading it
    pub fn locate(&self) -> Result<ConfigSource> {
        if let Some(file) = &self.config_file {
            let path = PathBuf::from(file);
            let path = if path.is_relative() {
                self.work_dir.join(path)
            } else {
                path
            };
            return Ok(ConfigSource::EnvFile(path));
        }

        let matches: Vec<PathBuf> = DISCOVERY_FILES
            .iter()
            .map(|name| self.work_dir.join(name))
            .filter(|path| path.is_file())
            .collect();

        match matches.len() {
            0 => Ok(ConfigSource::Default),
            1 => Ok(ConfigSource::WorkDir(matches[0].clone())),
            _ => Err(LoghubError::AmbiguousConfig(matches)),
        }
    }

    /// Load the primary tree. A located file that fails to load is an error,
    /// never a silent fallback to the default.
    pub fn load_primary(&self) -> Result<(ConfigSource, ConfigTree)> {
        let source = self.locate()?;

        let tree = match &source {
            ConfigSource::EnvFile(path) | ConfigSource::WorkDir(path) => {
                let tree = ConfigTree::from_file(path).map_err(|e| LoghubError::ConfigLoad {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                if self.debug {
                    eprintln!("loghub using config file: {}", path.display());
                    eprintln!("{}", tree.to_yaml_string());
                }
                tree
            }
            ConfigSource::Default => {
                if self.debug {
                    eprintln!("loghub using default config:\n{}", DEFAULT_CONFIG);
                }
                ConfigTree::from_yaml_str(DEFAULT_CONFIG)?
            }
        };

        tracing::debug!(source = ?source, "Resolved primary log configuration");
        Ok((source, tree))
    }

    /// Load the primary tree and merge the inline override over it
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let (source, mut tree) = self.load_primary()?;

        let mut override_errors = Vec::new();
        if let Some(inline) = &self.inline_config {
            let (overlay, mut errors) = parse_override(inline);
            errors.extend(tree.merge(&overlay));
            for err in &errors {
                tracing::debug!(error = %err, "Skipping inline config assignment");
                if self.debug {
                    eprintln!("loghub loading config from {} err: {}", CONFIG_ENV, err);
                }
            }
            override_errors = errors;

            if self.debug {
                eprintln!("loghub merged config:\n{}", tree.to_yaml_string());
            }
        }

        Ok(ResolvedConfig {
            source,
            tree,
            override_errors,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
