//! Persistent, append-only record of applied transformations.
//!
//! The log is the only bridge between an apply run and a later, independent
//! reverse run. It is created implicitly by the first append and deleted in
//! full once a reverse run completes.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{Error, Result};
use crate::models::HistoryEntry;

#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Record `message` for transformation `id`, stamped with the local time.
    pub fn append(&self, message: &str, id: &str) -> Result<HistoryEntry> {
        let entry = HistoryEntry::new(Local::now().naive_local(), message, id);
        self.append_entry(&entry)?;
        Ok(entry)
    }

    fn append_entry(&self, entry: &HistoryEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;
        writeln!(file, "{}", entry.to_line()).map_err(|e| Error::io(&self.path, e))
    }

    /// All well-formed entries, oldest first.
    ///
    /// Fails with [`Error::NothingToReverse`] when the log doesn't exist.
    /// Blank lines are ignored; lines without a `": "` separator are skipped
    /// with a warning rather than aborting the caller.
    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NothingToReverse {
                    path: self.path.clone(),
                })
            }
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match HistoryEntry::parse(line) {
                Some(entry) => entries.push(entry),
                None => tracing::warn!(
                    "Skipping malformed history line {} in {}: {:?}",
                    number + 1,
                    self.path.display(),
                    line
                ),
            }
        }
        Ok(entries)
    }

    /// Delete the log. A log that is already gone is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }
}
