use super::{Appender, Encoder};
use crate::config::ConfigTree;
use crate::error::{LoghubError, Result};
use crate::logs::Record;
use chrono::Local;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default maximum log file size before rotation (10MB)
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// FileAppender writes encoded records to a file in append mode
/// with automatic rotation based on file size
pub struct FileAppender {
    /// Path to the active log file
    path: PathBuf,
    /// Maximum size in bytes before rotation, 0 disables rotation
    max_size: u64,
    encoder: Box<dyn Encoder>,
    state: Mutex<FileState>,
}

struct FileState {
    writer: BufWriter<File>,
    /// Current size of the active file, including buffered bytes
    size: u64,
}

impl FileAppender {
    /// Create a new FileAppender
    ///
    /// # Arguments
    /// * `path` - Log file, created along with its directory if missing
    /// * `max_size` - Maximum size in bytes before rotation (0 disables)
    /// * `encoder` - Encoder applied to each record
    pub fn new<P: AsRef<Path>>(path: P, max_size: u64, encoder: Box<dyn Encoder>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LoghubError::InvalidConfig(format!("Failed to create log directory: {}", e))
            })?;
        }

        let file = open_append(&path)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path,
            max_size,
            encoder,
            state: Mutex::new(FileState {
                writer: BufWriter::new(file),
                size,
            }),
        })
    }

    /// Options: `path` (required, alias `file_name`), `max_size` (bytes)
    pub fn from_options(options: &ConfigTree, encoder: Box<dyn Encoder>) -> Result<Self> {
        let path = options
            .get_str("path")
            .or_else(|| options.get_str("file_name"))
            .filter(|p| !p.is_empty())
            .ok_or_else(|| LoghubError::InvalidConfig("file appender needs a 'path'".to_string()))?;

        let max_size = match options.get("max_size") {
            None => DEFAULT_MAX_SIZE,
            Some(value) if value.is_null() => DEFAULT_MAX_SIZE,
            Some(value) => value.as_u64().ok_or_else(|| {
                LoghubError::InvalidConfig("max_size must be a non-negative integer".to_string())
            })?,
        };

        Self::new(path, max_size, encoder)
    }

    /// Get the path to the active log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the maximum log file size before rotation
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Get the current size of the active file
    pub fn size(&self) -> u64 {
        self.state.lock().size
    }

    /// Rotate the active file by renaming it with a timestamp
    fn rotate(&self, state: &mut FileState) -> io::Result<()> {
        state.writer.flush()?;

        let timestamp = Local::now().format("%Y%m%d-%H%M%S%.3f").to_string();
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("log");
        let rotated_name = match self.path.extension().and_then(|s| s.to_str()) {
            Some(ext) => format!("{}-{}.{}", stem, timestamp, ext),
            None => format!("{}-{}", stem, timestamp),
        };
        let rotated_path = self.path.with_file_name(rotated_name);

        std::fs::rename(&self.path, &rotated_path)?;

        // Reopen the file after rotation
        state.writer = BufWriter::new(open_append(&self.path).map_err(io::Error::other)?);
        state.size = 0;
        Ok(())
    }
}

impl Appender for FileAppender {
    fn append(&self, record: &Record<'_>) -> io::Result<()> {
        let bytes = self.encoder.encode(record);
        let mut state = self.state.lock();

        // Check if rotation is needed before writing
        if self.max_size > 0 && state.size > 0 && state.size + bytes.len() as u64 > self.max_size {
            self.rotate(&mut state)?;
        }

        state.writer.write_all(&bytes)?;
        state.size += bytes.len() as u64;
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        state.writer.flush()?;
        state.writer.get_ref().sync_data()
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoghubError::InvalidConfig(format!(
                "Failed to open log file {}: {}",
                path.display(),
                e
            ))
        })
}
