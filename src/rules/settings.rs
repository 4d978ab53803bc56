//! User settings stored in the `[mrename]` section of the config file.
//!
//! # Example config file section
//!
//! ```toml
//! [mrename]
//! recurse = false
//! top_n = 3
//!
//! [mrename.parent_folder_recognition]
//! enabled = true
//! enable_series_recognition = true
//! enable_season_recognition = true
//! enable_custom_season = true
//! default_season = "01"
//! use_default_season = false
//! season_patterns = ['S(\d+)', 'Season\s*(\d+)', '第(\d+)季']
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::colorize_bool;
use crate::rules::folder::{DEFAULT_SEASON_PATTERNS, FolderContext, RE_DEFAULT_SEASON_PATTERNS};

/// Config file section name.
pub const SECTION: &str = "mrename";

pub const DEFAULT_TOP_N: usize = 3;

/// Typed view of the `[mrename]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRenameConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub dryrun: bool,
    #[serde(default)]
    pub parent_folder_recognition: FolderRecognitionSection,
    #[serde(default)]
    pub recurse: bool,
    #[serde(default)]
    pub rules_dir: Option<PathBuf>,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub verbose: bool,
}

/// The `[mrename.parent_folder_recognition]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecognitionSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub enable_series_recognition: bool,
    #[serde(default = "default_true")]
    pub enable_season_recognition: bool,
    #[serde(default = "default_true")]
    pub enable_custom_season: bool,
    #[serde(default = "default_season")]
    pub default_season: String,
    #[serde(default)]
    pub use_default_season: bool,
    #[serde(default = "default_season_patterns")]
    pub season_patterns: Vec<String>,
}

/// Immutable snapshot of the folder recognition settings with compiled patterns.
///
/// Changing settings means building a new snapshot.
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    pub enabled: bool,
    pub enable_series_recognition: bool,
    pub enable_season_recognition: bool,
    pub enable_custom_season: bool,
    pub default_season: String,
    pub use_default_season: bool,
    pub season_patterns: Vec<Regex>,
}

/// Key-path addressable settings store.
///
/// Keys are relative to the `[mrename]` section,
/// for example `parent_folder_recognition.enabled`.
/// Other sections of the config file are kept as-is when saving.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    document: Table,
    path: Option<PathBuf>,
}

impl Default for FolderRecognitionSection {
    fn default() -> Self {
        Self {
            enabled: true,
            enable_series_recognition: true,
            enable_season_recognition: true,
            enable_custom_season: true,
            default_season: default_season(),
            use_default_season: false,
            season_patterns: default_season_patterns(),
        }
    }
}

impl RecognitionConfig {
    /// Compile the recognition section.
    ///
    /// # Errors
    /// Returns an error if a season pattern is not a valid regex.
    pub fn from_section(section: &FolderRecognitionSection) -> Result<Self> {
        let season_patterns = section
            .season_patterns
            .iter()
            .map(|pattern| Regex::new(pattern).with_context(|| format!("Invalid season pattern: '{pattern}'")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            enabled: section.enabled,
            enable_series_recognition: section.enable_series_recognition,
            enable_season_recognition: section.enable_season_recognition,
            enable_custom_season: section.enable_custom_season,
            default_season: section.default_season.clone(),
            use_default_season: section.use_default_season,
            season_patterns,
        })
    }

    /// Folder context for the path with the recognition switches applied.
    #[must_use]
    pub fn folder_context(&self, path: &Path) -> FolderContext {
        if !self.enabled {
            return FolderContext::default();
        }
        let mut context = FolderContext::from_path(path, &self.season_patterns);
        if !self.enable_series_recognition {
            context.series_name = None;
        }
        if !self.enable_season_recognition {
            context.season = None;
        }
        context
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        let section = FolderRecognitionSection::default();
        Self {
            enabled: section.enabled,
            enable_series_recognition: section.enable_series_recognition,
            enable_season_recognition: section.enable_season_recognition,
            enable_custom_season: section.enable_custom_season,
            default_season: section.default_season,
            use_default_season: section.use_default_season,
            season_patterns: RE_DEFAULT_SEASON_PATTERNS.clone(),
        }
    }
}

impl fmt::Display for RecognitionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  enabled:            {}", colorize_bool(self.enabled))?;
        writeln!(f, "  series:             {}", colorize_bool(self.enable_series_recognition))?;
        writeln!(f, "  season:             {}", colorize_bool(self.enable_season_recognition))?;
        writeln!(f, "  custom season:      {}", colorize_bool(self.enable_custom_season))?;
        writeln!(f, "  use default season: {}", colorize_bool(self.use_default_season))?;
        writeln!(f, "  default season:     {}", self.default_season)?;
        write!(
            f,
            "  season patterns:    {}",
            self.season_patterns
                .iter()
                .map(Regex::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Settings {
    /// Read settings from the user config file.
    ///
    /// A missing file gives default settings that will be saved to the same location.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let Some(path) = crate::config::CONFIG_PATH.as_deref() else {
            return Ok(Self::default());
        };
        Self::load_from(path)
    }

    /// Read settings from the given file. A missing file gives default settings.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = match fs::read_to_string(path) {
            Ok(content) => {
                Self::from_toml_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(error) => return Err(anyhow!("Failed to read config file {}: {error}", path.display())),
        };
        settings.path = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Parse settings from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML is invalid or the `[mrename]` section has the wrong types.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let document: Table = toml::from_str(toml_str).context("Failed to parse config TOML")?;
        if let Some(section) = document.get(SECTION)
            && !section.is_table()
        {
            bail!("Config key '{SECTION}' must be a table");
        }
        let settings = Self { document, path: None };
        settings.user_config()?;
        Ok(settings)
    }

    /// Value at the dotted key path inside the section.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut current = self.document.get(SECTION)?;
        for part in key.split('.') {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Value at the key path, falling back to the built-in default.
    #[must_use]
    pub fn get_or_default(&self, key: &str) -> Option<Value> {
        self.get(key).cloned().or_else(|| {
            let defaults = Value::try_from(MediaRenameConfig::default()).ok()?;
            let mut current = &defaults;
            for part in key.split('.') {
                current = current.as_table()?.get(part)?;
            }
            Some(current.clone())
        })
    }

    /// Boolean at the key path, or `default` if unset or not a boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Set the value at the dotted key path, creating intermediate tables.
    ///
    /// # Errors
    /// Returns an error if the key is empty, a parent key holds a non-table value,
    /// or the resulting section no longer parses.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let parts: Vec<&str> = key.split('.').map(str::trim).collect();
        if parts.iter().any(|part| part.is_empty()) {
            bail!("Invalid config key: '{key}'");
        }

        let mut updated = self.document.clone();
        let mut table = updated
            .entry(SECTION)
            .or_insert_with(|| Value::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow!("Config key '{SECTION}' must be a table"))?;

        let (last, parents) = parts.split_last().ok_or_else(|| anyhow!("Invalid config key: '{key}'"))?;
        for part in parents {
            table = table
                .entry((*part).to_string())
                .or_insert_with(|| Value::Table(Table::new()))
                .as_table_mut()
                .ok_or_else(|| anyhow!("Config key '{part}' is not a table in '{key}'"))?;
        }
        table.insert((*last).to_string(), value);

        let candidate = Self {
            document: updated,
            path: self.path.clone(),
        };
        candidate
            .user_config()
            .with_context(|| format!("Invalid value for config key '{key}'"))?;
        *self = candidate;
        Ok(())
    }

    /// Set a value given as text: a TOML literal such as `true`, `3` or `["a", "b"]`,
    /// otherwise the text is stored as a string.
    ///
    /// A literal that does not fit a string key, such as `2` for `default_season`,
    /// is stored as the text itself.
    ///
    /// # Errors
    /// Returns an error if the key is invalid or the value has the wrong type for the key.
    pub fn set_from_str(&mut self, key: &str, raw: &str) -> Result<()> {
        let text = Value::String(raw.to_string());
        let value = toml::from_str::<Table>(&format!("value = {raw}"))
            .ok()
            .and_then(|mut table| table.remove("value"))
            .unwrap_or_else(|| text.clone());
        if value.is_str() {
            return self.set(key, value);
        }
        self.set(key, value).or_else(|error| self.set(key, text).map_err(|_| error))
    }

    /// Typed view of the section.
    ///
    /// # Errors
    /// Returns an error if a value has the wrong type.
    pub fn user_config(&self) -> Result<MediaRenameConfig> {
        match self.document.get(SECTION) {
            Some(section) => section
                .clone()
                .try_into::<MediaRenameConfig>()
                .with_context(|| format!("Invalid [{SECTION}] config section")),
            None => Ok(MediaRenameConfig::default()),
        }
    }

    /// Compiled folder recognition snapshot.
    ///
    /// # Errors
    /// Returns an error if the section is invalid or a season pattern does not compile.
    pub fn recognition(&self) -> Result<RecognitionConfig> {
        RecognitionConfig::from_section(&self.user_config()?.parent_folder_recognition)
    }

    /// Where the settings were loaded from and will be saved to.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Serialize the whole config document.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(&self.document).context("Failed to serialize config")
    }

    /// Write the settings back to the file they were loaded from.
    ///
    /// # Errors
    /// Returns an error if there is no known config path or writing fails.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .or(crate::config::CONFIG_PATH.as_deref())
            .context("Failed to determine config file path")?;
        self.save_to(path)
    }

    /// Write the settings to the given file, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }
}

const fn default_true() -> bool {
    true
}

fn default_season() -> String {
    "01".to_string()
}

fn default_season_patterns() -> Vec<String> {
    DEFAULT_SEASON_PATTERNS.iter().map(ToString::to_string).collect()
}
