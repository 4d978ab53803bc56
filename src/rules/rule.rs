//! Regex rename rules.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::rules::field::{Field, MatchResult};
use crate::rules::matcher::RuleFamily;
use crate::rules::template::Template;

/// Persisted form of a rule, one JSON document per rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    pub pattern: String,
    /// Field name to 1-based capture group index.
    pub groups: BTreeMap<Field, usize>,
    pub output_format: String,
    #[serde(default, skip_serializing_if = "SpecialHandling::is_empty")]
    pub special_handling: SpecialHandling,
    /// Explicit score weight, takes precedence over the built-in weight table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// Explicit feature bonus family, takes precedence over detection from the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<RuleFamily>,
}

/// Per-rule directives that alter field processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialHandling {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uppercase_fields: Vec<Field>,
    /// Target field to ordered sources: a field name to copy from, or a literal default.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fallback_fields: BTreeMap<Field, Vec<String>>,
    /// Regex that identifies a year captured in place of an episode number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_pattern: Option<String>,
    /// Episode numbers above this are treated as years.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_episode: Option<u64>,
    /// Append the captured `extension` field instead of the file extension.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub preserve_full_extension: bool,
}

/// A compiled rename rule.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    pattern: Regex,
    groups: BTreeMap<Field, usize>,
    template: Template,
    special_handling: SpecialHandling,
    year_pattern: Option<Regex>,
    priority: Option<u32>,
    family: Option<RuleFamily>,
}

impl SpecialHandling {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl RuleDefinition {
    /// Create a definition without special handling.
    #[must_use]
    pub fn new(name: &str, pattern: &str, groups: &[(Field, usize)], output_format: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            groups: groups.iter().copied().collect(),
            output_format: output_format.to_string(),
            special_handling: SpecialHandling::default(),
            priority: None,
            family: None,
        }
    }

    #[must_use]
    pub fn with_special_handling(mut self, special_handling: SpecialHandling) -> Self {
        self.special_handling = special_handling;
        self
    }

    /// Parse a definition from JSON.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or does not describe a rule.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse rule JSON")
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize rule")
    }
}

impl Rule {
    /// Compile a rule from its definition.
    ///
    /// # Errors
    /// Returns an error if the pattern or year pattern is not a valid regex,
    /// or if the output format is malformed.
    pub fn new(definition: RuleDefinition) -> Result<Self> {
        let pattern = Regex::new(&definition.pattern)
            .with_context(|| format!("Invalid regex for rule '{}'", definition.name))?;
        let template = Template::parse(&definition.output_format)
            .with_context(|| format!("Invalid output format for rule '{}'", definition.name))?;
        let year_pattern = definition
            .special_handling
            .year_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("Invalid year pattern for rule '{}'", definition.name))?;

        Ok(Self {
            name: definition.name,
            pattern,
            groups: definition.groups,
            template,
            special_handling: definition.special_handling,
            year_pattern,
            priority: definition.priority,
            family: definition.family,
        })
    }

    /// Parse and compile a rule from JSON.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the rule does not compile.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(RuleDefinition::from_json(json)?)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    #[must_use]
    pub const fn groups(&self) -> &BTreeMap<Field, usize> {
        &self.groups
    }

    #[must_use]
    pub const fn template(&self) -> &Template {
        &self.template
    }

    #[must_use]
    pub const fn special_handling(&self) -> &SpecialHandling {
        &self.special_handling
    }

    #[must_use]
    pub const fn year_pattern(&self) -> Option<&Regex> {
        self.year_pattern.as_ref()
    }

    #[must_use]
    pub const fn priority(&self) -> Option<u32> {
        self.priority
    }

    #[must_use]
    pub const fn family(&self) -> Option<RuleFamily> {
        self.family
    }

    /// Search the filename with the rule pattern.
    ///
    /// The pattern may match anywhere in the name.
    /// Declared groups that did not participate, or whose index is beyond
    /// the number of groups in the pattern, are set to an empty string.
    #[must_use]
    pub fn match_filename(&self, filename: &str) -> Option<MatchResult> {
        let captures = self.pattern.captures(filename)?;
        let group_count = captures.len().saturating_sub(1);
        Some(
            self.groups
                .iter()
                .map(|(field, &index)| {
                    let value = if index <= group_count {
                        captures.get(index).map_or("", |m| m.as_str())
                    } else {
                        ""
                    };
                    (*field, value.to_string())
                })
                .collect(),
        )
    }

    /// Convert back to the persisted form.
    #[must_use]
    pub fn to_definition(&self) -> RuleDefinition {
        RuleDefinition {
            name: self.name.clone(),
            pattern: self.pattern.as_str().to_string(),
            groups: self.groups.clone(),
            output_format: self.template.as_str().to_string(),
            special_handling: self.special_handling.clone(),
            priority: self.priority,
            family: self.family,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  pattern: {}", self.pattern.as_str())?;
        writeln!(
            f,
            "  groups:  {}",
            self.groups
                .iter()
                .map(|(field, index)| format!("{field}={index}"))
                .collect::<Vec<_>>()
                .join(", ")
        )?;
        write!(f, "  format:  {}", self.template)
    }
}
