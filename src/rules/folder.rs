//! Series and season inference from the directories containing a file.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Default season folder patterns, tried in order against each directory name.
pub const DEFAULT_SEASON_PATTERNS: [&str; 3] = [r"S(\d+)", r"Season\s*(\d+)", r"第(\d+)季"];

pub static RE_DEFAULT_SEASON_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEFAULT_SEASON_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern).expect("Failed to compile default season pattern"))
        .collect()
});

/// Metadata inferred from the directory names above a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderContext {
    /// Name of the directory directly above the season directory.
    pub series_name: Option<String>,
    /// Zero-padded season number.
    pub season: Option<String>,
}

impl FolderContext {
    /// Infer series and season from the directories of the given file path.
    ///
    /// Directory names are checked from the one closest to the file towards the root.
    /// The first directory matching any season pattern gives the season,
    /// and its parent directory gives the series name.
    #[must_use]
    pub fn from_path(path: &Path, season_patterns: &[Regex]) -> Self {
        let segments = directory_segments(path);
        for (index, segment) in segments.iter().enumerate().rev() {
            if let Some(season) = season_from_segment(segment, season_patterns) {
                let series_name = index
                    .checked_sub(1)
                    .and_then(|parent| segments.get(parent))
                    .map(ToString::to_string);
                return Self {
                    series_name,
                    season: Some(season),
                };
            }
        }
        Self::default()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.series_name.is_none() && self.season.is_none()
    }
}

impl fmt::Display for FolderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.series_name, &self.season) {
            (Some(series), Some(season)) => write!(f, "{series} (season {season})"),
            (None, Some(season)) => write!(f, "season {season}"),
            (Some(series), None) => write!(f, "{series}"),
            (None, None) => write!(f, "-"),
        }
    }
}

/// Left-pad a number string with zeros to at least two digits.
#[must_use]
pub fn pad_season(value: &str) -> String {
    format!("{value:0>2}")
}

/// Directory names of the path, excluding the file name itself.
///
/// Both `/` and `\` separate segments so that paths recorded on another platform still work.
fn directory_segments(path: &Path) -> Vec<String> {
    let path = crate::path_to_string(path);
    let mut segments: Vec<String> = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(ToString::to_string)
        .collect();
    segments.pop();
    segments
}

fn season_from_segment(segment: &str, season_patterns: &[Regex]) -> Option<String> {
    season_patterns.iter().find_map(|pattern| {
        pattern
            .captures(segment)
            .and_then(|captures| captures.get(1))
            .map(|number| pad_season(number.as_str()))
    })
}
