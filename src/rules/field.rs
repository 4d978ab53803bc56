//! Closed set of named fields a rule can capture and a template can reference.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A named value slot extracted from a filename or derived from folder context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Series,
    Season,
    Episode,
    Title,
    Year,
    Quality,
    Group,
    Resolution,
    TechInfo,
    Suffix,
    Extension,
}

impl Field {
    pub const ALL: [Self; 11] = [
        Self::Series,
        Self::Season,
        Self::Episode,
        Self::Title,
        Self::Year,
        Self::Quality,
        Self::Group,
        Self::Resolution,
        Self::TechInfo,
        Self::Suffix,
        Self::Extension,
    ];

    /// Field name as used in rule definitions and output templates.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Series => "series",
            Self::Season => "season",
            Self::Episode => "episode",
            Self::Title => "title",
            Self::Year => "year",
            Self::Quality => "quality",
            Self::Group => "group",
            Self::Resolution => "resolution",
            Self::TechInfo => "tech_info",
            Self::Suffix => "suffix",
            Self::Extension => "extension",
        }
    }
}

impl FromStr for Field {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown field name: '{s}'"))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field values produced by a single rule match.
///
/// Every declared group is present, with an empty string when the group did not participate.
/// A field that is absent was never declared, which matters for template rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    values: BTreeMap<Field, String>,
}

impl MatchResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for the field, or an empty string when absent.
    #[must_use]
    pub fn get(&self, field: Field) -> &str {
        self.values.get(&field).map_or("", String::as_str)
    }

    /// Value for the field only if it has been set.
    #[must_use]
    pub fn value(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    /// True when the field is absent or holds only whitespace.
    #[must_use]
    pub fn is_blank(&self, field: Field) -> bool {
        self.get(field).trim().is_empty()
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.values.iter().map(|(field, value)| (*field, value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of fields with a non-blank value.
    #[must_use]
    pub fn filled_count(&self) -> usize {
        self.values.values().filter(|value| !value.trim().is_empty()).count()
    }

    /// Apply `f` to the stored value in place.
    pub fn update(&mut self, field: Field, f: impl FnOnce(&str) -> String) {
        if let Some(value) = self.values.get_mut(&field) {
            *value = f(value);
        }
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.values
                .iter()
                .map(|(field, value)| format!("{field}=\"{value}\""))
                .join(", ")
        )
    }
}

impl FromIterator<(Field, String)> for MatchResult {
    fn from_iter<T: IntoIterator<Item = (Field, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
