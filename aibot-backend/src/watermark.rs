//! Last-processed watermark and its persistence.
//!
//! The watermark is read once at startup and only ever moves forward. It is
//! stored as a single ISO-8601 timestamp; a missing store is a cold start.

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::BotError;

/// Backing storage for the watermark.
pub trait WatermarkStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<DateTime<Utc>>, BotError>;
    fn write(&self, at: DateTime<Utc>) -> Result<(), BotError>;
}

/// Stores the watermark as the sole line of a text file.
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn read(&self) -> Result<Option<DateTime<Utc>>, BotError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BotError::Persistence(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| {
                BotError::Persistence(format!(
                    "Invalid timestamp {:?} in {}: {}",
                    trimmed,
                    self.path.display(),
                    e
                ))
            })
    }

    /// Write to a sibling temp file and rename over the target, so a crash
    /// leaves either the old or the new value.
    fn write(&self, at: DateTime<Utc>) -> Result<(), BotError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    BotError::Persistence(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let tmp = self.temp_path();
        fs::write(&tmp, at.to_rfc3339())
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| BotError::Persistence(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}

/// The process-wide cursor.
pub struct Watermark {
    store: Box<dyn WatermarkStore>,
    current: Option<DateTime<Utc>>,
}

impl Watermark {
    /// Read the stored value once. An unreadable store is logged and
    /// treated as a cold start.
    pub fn load(store: Box<dyn WatermarkStore>) -> Self {
        let current = match store.read() {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Watermark: {} - starting without a watermark", e);
                None
            }
        };
        log::info!("Watermark: loaded {:?}", current.map(|t| t.to_rfc3339()));
        Self { store, current }
    }

    pub fn current(&self) -> Option<DateTime<Utc>> {
        self.current
    }

    /// Move the watermark to `at` and persist it.
    ///
    /// Earlier values are ignored. The in-memory value advances even when
    /// the write fails; the error is returned so the caller can log the
    /// durability risk.
    pub fn advance(&mut self, at: DateTime<Utc>) -> Result<(), BotError> {
        if let Some(current) = self.current {
            if at <= current {
                log::debug!("Watermark: ignoring non-advancing value {}", at.to_rfc3339());
                return Ok(());
            }
        }
        self.current = Some(at);
        self.store.write(at)
    }
}
