//! Rule definitions persisted as one JSON file per rule.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::rules::field::Field;
use crate::rules::rule::{Rule, RuleDefinition};
use crate::rules::sanitize::sanitize_filename;

const RULE_FILE_EXTENSION: &str = "json";

/// Directory of rule files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStore {
    dir: PathBuf,
}

/// Result of loading every rule file.
///
/// Files that fail to parse or compile are reported in `failures` and do not stop loading.
#[derive(Debug, Default)]
pub struct LoadedRules {
    pub rules: Vec<Rule>,
    pub failures: Vec<(PathBuf, anyhow::Error)>,
}

impl RuleStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the default rules directory.
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined.
    pub fn default_location() -> Result<Self> {
        crate::config::RULES_DIR
            .as_deref()
            .map(Self::new)
            .context("Failed to determine rules directory")
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for the given rule name.
    #[must_use]
    pub fn rule_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{RULE_FILE_EXTENSION}", sanitize_filename(name)))
    }

    /// Load every `*.json` file in the directory, sorted by filename.
    ///
    /// A missing directory gives no rules.
    ///
    /// # Errors
    /// Returns an error only if the directory exists but cannot be listed.
    pub fn load_all(&self) -> Result<LoadedRules> {
        if !self.dir.is_dir() {
            return Ok(LoadedRules::default());
        }

        let files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read rules directory {}", self.dir.display()))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|extension| extension.eq_ignore_ascii_case(RULE_FILE_EXTENSION))
            })
            .sorted_by_key(|path| crate::path_to_filename_string(path))
            .collect();

        let mut loaded = LoadedRules::default();
        for path in files {
            match Self::load_file(&path) {
                Ok(rule) => loaded.rules.push(rule),
                Err(error) => loaded.failures.push((path, error)),
            }
        }
        Ok(loaded)
    }

    /// Load and compile a single rule file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not a valid rule, or does not compile.
    pub fn load_file(path: &Path) -> Result<Rule> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read rule file {}", path.display()))?;
        Rule::from_json(&content).with_context(|| format!("Failed to load rule file {}", path.display()))
    }

    /// Write the rule to `<name>.json`, replacing an existing file.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the file cannot be written.
    pub fn save_rule(&self, definition: &RuleDefinition) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create rules directory {}", self.dir.display()))?;
        let path = self.rule_path(&definition.name);
        fs::write(&path, definition.to_json()? + "\n")
            .with_context(|| format!("Failed to write rule file {}", path.display()))?;
        Ok(path)
    }

    /// Remove the rule file. Returns false if there was no such file.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn delete_rule(&self, name: &str) -> Result<bool> {
        let path = self.rule_path(name);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to remove rule file {}", path.display()))?;
        Ok(true)
    }

    /// Write the built-in rules to the directory.
    ///
    /// # Errors
    /// Returns an error if any file cannot be written.
    pub fn create_default_rules(&self) -> Result<Vec<PathBuf>> {
        default_rules().iter().map(|definition| self.save_rule(definition)).collect()
    }
}

/// Built-in rules for common fansub, movie and documentary naming.
#[must_use]
pub fn default_rules() -> Vec<RuleDefinition> {
    vec![
        RuleDefinition::new(
            "Standard Episode",
            r"\[([^\]]+)\]\s*(\d+)\s*(.+?)(?:\s*\[|\s*\(|$)",
            &[(Field::Series, 1), (Field::Episode, 2), (Field::Title, 3)],
            "{series} S01E{episode:0>2} - {title}",
        ),
        RuleDefinition::new(
            "Movie",
            r"(.+?)\s*\((\d{4})\)(?:\s*-\s*(.+?))?(?:\s*\[|\s*\(|$)",
            &[(Field::Title, 1), (Field::Year, 2), (Field::Quality, 3)],
            "{title} ({year}) - {quality}",
        ),
        RuleDefinition::new(
            "Documentary",
            r"(.+?)\s*-\s*第(\d+)集\s*(.+?)(?:\s*\[|\s*\(|$)",
            &[(Field::Series, 1), (Field::Episode, 2), (Field::Title, 3)],
            "{series} S01E{episode:0>2} - {title}",
        ),
        RuleDefinition::new(
            "Simple Number",
            r"(.+?)\s*(\d+)(?:\s*-\s*(.+?))?(?:\s*\[|\s*\(|$)",
            &[(Field::Series, 1), (Field::Episode, 2), (Field::Title, 3)],
            "{series} S01E{episode:0>2} - {title}",
        ),
        RuleDefinition::new(
            "Season Episode",
            r"\[([^\]]+)\]\s*S(\d+)E(\d+)\s*(.+?)(?:\s*\[|\s*\(|$)",
            &[(Field::Series, 1), (Field::Season, 2), (Field::Episode, 3), (Field::Title, 4)],
            "{series} S{season:0>2}E{episode:0>2} - {title}",
        ),
    ]
}

/// Compile the built-in rules.
///
/// # Errors
/// Returns an error if a built-in rule does not compile.
pub fn compile_default_rules() -> Result<Vec<Rule>> {
    default_rules().into_iter().map(Rule::new).collect()
}
