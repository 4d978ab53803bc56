//! Per-directory JSON log of rename operations, used for restoring original names.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};

use crate::rules::files::rename_with_temp_file;

/// Log file name inside each processed directory.
pub const RENAME_LOG_NAME: &str = "rename_log.json";

/// Outcome recorded for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameStatus {
    #[serde(alias = "成功")]
    Success,
    #[serde(alias = "失败")]
    Failure,
    #[serde(alias = "跳过")]
    Skipped,
}

/// One record in the rename log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub old_name: String,
    pub new_name: String,
    #[serde(default)]
    pub rule_name: Option<String>,
    #[serde(default)]
    pub directory: String,
    pub status: RenameStatus,
    #[serde(default)]
    pub reason: String,
}

/// Rename log of one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameLog {
    directory: PathBuf,
    path: PathBuf,
}

/// Result of restoring one log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreDetail {
    pub old_name: String,
    pub new_name: String,
    pub ok: bool,
    pub reason: String,
}

/// Result of restoring every successful rename in a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: usize,
    pub failed: usize,
    pub details: Vec<RestoreDetail>,
}

impl RenameStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
        }
    }

    #[must_use]
    pub fn colored(self) -> ColoredString {
        match self {
            Self::Success => self.as_str().green(),
            Self::Failure => self.as_str().red(),
            Self::Skipped => self.as_str().yellow(),
        }
    }
}

impl fmt::Display for RenameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl LogEntry {
    /// Create an entry timestamped with the current local time.
    #[must_use]
    pub fn new(
        directory: &Path,
        old_name: &str,
        new_name: &str,
        rule_name: Option<&str>,
        status: RenameStatus,
        reason: &str,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            rule_name: rule_name.map(ToString::to_string),
            directory: crate::path_to_string(directory),
            status,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} -> {}",
            self.timestamp, self.status, self.old_name, self.new_name
        )?;
        if let Some(rule) = &self.rule_name {
            write!(f, " ({rule})")?;
        }
        if !self.reason.is_empty() {
            write!(f, " | {}", self.reason)?;
        }
        Ok(())
    }
}

impl RenameLog {
    #[must_use]
    pub fn new(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
            path: directory.join(RENAME_LOG_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Read all entries, oldest first. A missing log file gives no entries.
    ///
    /// # Errors
    /// Returns an error if the log file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Vec<LogEntry>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse rename log {}", self.path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error).with_context(|| format!("Failed to read rename log {}", self.path.display())),
        }
    }

    /// Append an entry to the log file.
    ///
    /// # Errors
    /// Returns an error if the existing log cannot be read or the file cannot be written.
    pub fn append(&self, entry: LogEntry) -> Result<()> {
        let mut entries = self.load()?;
        entries.push(entry);
        self.write(&entries)
    }

    /// Record a rename attempt.
    ///
    /// # Errors
    /// Returns an error if the log file cannot be updated.
    pub fn log_rename(
        &self,
        old_name: &str,
        new_name: &str,
        rule_name: Option<&str>,
        status: RenameStatus,
        reason: &str,
    ) -> Result<()> {
        self.append(LogEntry::new(
            &self.directory,
            old_name,
            new_name,
            rule_name,
            status,
            reason,
        ))
    }

    /// Delete the log file. Returns false if there was nothing to delete.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove rename log {}", self.path.display()))?;
        Ok(true)
    }

    /// Rename files back to their original names.
    ///
    /// Only successful renames are restored, newest first,
    /// so that chained renames of the same file unwind in order.
    ///
    /// # Errors
    /// Returns an error if the log cannot be read. Individual restore failures are reported in the summary.
    pub fn restore_all(&self) -> Result<RestoreSummary> {
        let entries = self.load()?;
        let mut summary = RestoreSummary::default();
        for entry in entries
            .iter()
            .rev()
            .filter(|entry| entry.status == RenameStatus::Success)
        {
            let detail = self.restore_entry(entry);
            if detail.ok {
                summary.restored += 1;
            } else {
                summary.failed += 1;
            }
            summary.details.push(detail);
        }
        Ok(summary)
    }

    fn restore_entry(&self, entry: &LogEntry) -> RestoreDetail {
        let detail = |ok: bool, reason: String| RestoreDetail {
            old_name: entry.old_name.clone(),
            new_name: entry.new_name.clone(),
            ok,
            reason,
        };

        if entry.old_name.is_empty() || entry.new_name.is_empty() {
            return detail(false, "log entry is missing a file name".to_string());
        }

        let old_path = self.directory.join(&entry.old_name);
        let new_path = self.directory.join(&entry.new_name);
        if !new_path.exists() {
            return detail(false, "renamed file does not exist".to_string());
        }
        // On case-insensitive file systems the original name of a case-only rename
        // resolves to the renamed file, so only an exact name match counts as existing
        let capitalization_change_only = entry.old_name.to_lowercase() == entry.new_name.to_lowercase();
        let original_exists = if capitalization_change_only {
            self.contains_exact_name(&entry.old_name)
        } else {
            old_path.exists()
        };
        if original_exists {
            return detail(false, "original file already exists".to_string());
        }

        let result = if capitalization_change_only {
            rename_with_temp_file(&new_path, &old_path)
        } else {
            fs::rename(&new_path, &old_path)
        };
        match result {
            Ok(()) => detail(true, "restored".to_string()),
            Err(error) => detail(false, format!("rename failed: {error}")),
        }
    }

    fn contains_exact_name(&self, name: &str) -> bool {
        fs::read_dir(&self.directory).is_ok_and(|entries| {
            entries
                .filter_map(std::result::Result::ok)
                .any(|entry| entry.file_name() == name)
        })
    }

    fn write(&self, entries: &[LogEntry]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).context("Failed to serialize rename log")?;
        fs::write(&self.path, json + "\n")
            .with_context(|| format!("Failed to write rename log {}", self.path.display()))
    }
}

impl fmt::Display for RestoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Restored: {}, failed: {}",
            self.restored.to_string().green(),
            if self.failed > 0 {
                self.failed.to_string().red()
            } else {
                "0".normal()
            }
        )
    }
}
