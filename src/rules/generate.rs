//! Output filename generation for a matched rule.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::{Captures, Regex};

use crate::rules::field::{Field, MatchResult};
use crate::rules::folder::pad_season;
use crate::rules::rule::Rule;
use crate::rules::settings::RecognitionConfig;

/// Season number of an `S##E##` token that does not start inside a word.
static RE_SEASON_EPISODE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9])S(\d+)E").expect("Failed to compile season episode number regex")
});

/// Season number of a standalone `S##` token.
static RE_SEASON_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9])S(\d+)(?:[^A-Za-z0-9]|$)").expect("Failed to compile season number regex")
});

static RE_SEASON_EPISODE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"S(\d+)E[A-Za-z0-9]+").expect("Failed to compile season episode regex"));

static RE_TECH_INFO_BRACKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(S\d+E\d+)(\[)").expect("Failed to compile tech info bracket regex"));

/// Episode values containing any of these are kept as-is.
const SPECIAL_EPISODE_MARKERS: [&str; 4] = ["OVA", "SP", "SPECIAL", "END"];

/// Episode values displayed without the `E` marker.
const SPECIAL_EPISODES: [&str; 3] = ["OVA", "SP", "SPECIAL"];

const DEFAULT_EPISODE: &str = "01";

/// Inputs for [`Rule::generate`] besides the matched fields.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions<'a> {
    /// Appended to the generated name as-is, for example `.mkv`.
    pub extension: &'a str,
    /// Full path of the source file, used for folder context.
    pub path: Option<&'a Path>,
    pub custom_season: Option<&'a str>,
    /// Replaces the series name and disables the folder series override.
    pub custom_title: Option<&'a str>,
    /// Apply the folder context to the output.
    /// When false the folder context is never consulted.
    pub apply_folder_info: bool,
    pub recognition: &'a RecognitionConfig,
}

impl<'a> GenerateOptions<'a> {
    /// Options with only an extension: no folder context and no overrides.
    #[must_use]
    pub const fn new(extension: &'a str, recognition: &'a RecognitionConfig) -> Self {
        Self {
            extension,
            path: None,
            custom_season: None,
            custom_title: None,
            apply_folder_info: false,
            recognition,
        }
    }

    #[must_use]
    pub const fn with_path(mut self, path: &'a Path, apply_folder_info: bool) -> Self {
        self.path = Some(path);
        self.apply_folder_info = apply_folder_info;
        self
    }

    #[must_use]
    pub const fn with_custom_season(mut self, season: Option<&'a str>) -> Self {
        self.custom_season = season;
        self
    }

    #[must_use]
    pub const fn with_custom_title(mut self, title: Option<&'a str>) -> Self {
        self.custom_title = title;
        self
    }
}

impl Rule {
    /// Generate the new filename from matched fields.
    ///
    /// The result is not sanitized.
    ///
    /// # Errors
    /// Returns `format error: missing '<field>'` if the output format references a field
    /// that was neither captured nor derived.
    pub fn generate(&self, match_result: &MatchResult, options: &GenerateOptions) -> Result<String> {
        let mut fields: MatchResult = match_result
            .iter()
            .map(|(field, value)| {
                let value = if value.trim().is_empty() { "" } else { value };
                (field, value.to_string())
            })
            .collect();

        let custom_title = options.custom_title.map(str::trim).filter(|title| !title.is_empty());
        if let Some(title) = custom_title {
            fields.set(Field::Series, title);
        }

        let mut parent_season = None;
        if options.apply_folder_info
            && let Some(path) = options.path
        {
            let context = options.recognition.folder_context(path);
            if custom_title.is_none()
                && let Some(series) = context.series_name
            {
                fields.set(Field::Series, series);
            }
            parent_season = context.season;
        }

        for field in &self.special_handling().uppercase_fields {
            fields.update(*field, str::to_uppercase);
        }

        self.apply_fallbacks(&mut fields);
        self.normalize_episode(&mut fields);

        let mut output = self.template().render(&fields)?;

        if let Some(season) = resolve_season(options, parent_season) {
            output = replace_season(&output, &season);
        }

        let episode = fields.get(Field::Episode);
        let episode_upper = episode.to_uppercase();
        if SPECIAL_EPISODES.contains(&episode_upper.as_str()) {
            output = RE_SEASON_EPISODE_TOKEN
                .replace_all(&output, |captures: &Captures| format!("S{} {episode}", &captures[1]))
                .into_owned();
        }

        let mut output = clean_up(&output);

        let suffix = fields.get(Field::Suffix);
        if self.groups().contains_key(&Field::Suffix) && !suffix.is_empty() {
            output.push('.');
            output.push_str(suffix);
        } else if self.special_handling().preserve_full_extension {
            output.push('.');
            output.push_str(fields.get(Field::Extension));
        } else {
            output.push_str(options.extension);
        }

        Ok(output)
    }

    /// Fill empty fields from other fields or literal defaults.
    fn apply_fallbacks(&self, fields: &mut MatchResult) {
        for (target, sources) in &self.special_handling().fallback_fields {
            if !fields.is_blank(*target) {
                continue;
            }
            let replacement = sources.iter().find_map(|source| match source.parse::<Field>() {
                Ok(field) => Some(fields.get(field)).filter(|value| !value.is_empty()).map(ToString::to_string),
                Err(_) => Some(source.clone()),
            });
            if let Some(value) = replacement {
                fields.set(*target, value);
            }
        }
    }

    /// Default an empty episode and reinterpret years captured as episode numbers.
    fn normalize_episode(&self, fields: &mut MatchResult) {
        let Some(episode) = fields.value(Field::Episode).map(ToString::to_string) else {
            return;
        };
        if episode.is_empty() {
            fields.set(Field::Episode, DEFAULT_EPISODE);
            return;
        }

        let upper = episode.to_uppercase();
        if SPECIAL_EPISODE_MARKERS.iter().any(|marker| upper.contains(marker)) {
            return;
        }
        if !episode.chars().all(|c| c.is_ascii_digit()) {
            return;
        }

        let is_year = self.year_pattern().is_some_and(|pattern| pattern.is_match(&episode))
            || self
                .special_handling()
                .max_episode
                .is_some_and(|max| episode.parse::<u64>().map_or(true, |number| number > max));

        if is_year {
            fields.set(Field::Episode, DEFAULT_EPISODE);
            if fields.is_blank(Field::Title) {
                fields.set(Field::Title, format!("({episode})"));
            }
        }
    }
}

/// Custom season, then folder season, then the configured default.
fn resolve_season(options: &GenerateOptions, parent_season: Option<String>) -> Option<String> {
    let recognition = options.recognition;
    let custom = options
        .custom_season
        .map(str::trim)
        .filter(|season| recognition.enable_custom_season && !season.is_empty())
        .map(|season| {
            if season.chars().all(|c| c.is_ascii_digit()) {
                pad_season(season)
            } else {
                season.to_string()
            }
        });

    custom.or(parent_season).or_else(|| {
        recognition
            .use_default_season
            .then(|| pad_season(&recognition.default_season))
    })
}

/// Replace the number of the first season token, preferring an `S##E##` token over a bare `S##`.
///
/// An ASCII letter or digit directly before the `S` means it is part of a word such as `DS9`.
fn replace_season(output: &str, season: &str) -> String {
    let number = RE_SEASON_EPISODE_NUMBER
        .captures(output)
        .or_else(|| RE_SEASON_NUMBER.captures(output))
        .and_then(|captures| captures.get(1));

    match number {
        Some(number) => format!("{}{season}{}", &output[..number.start()], &output[number.end()..]),
        None => output.to_string(),
    }
}

/// Remove separator artifacts left by empty fields.
fn clean_up(output: &str) -> String {
    let mut result = output.to_string();
    loop {
        let mut cleaned = result
            .replace(" - None", "")
            .replace(" -  - ", " - ")
            .replace(" -  ", "");
        while let Some(stripped) = cleaned.strip_suffix(" - ") {
            cleaned = stripped.to_string();
        }
        if cleaned == result {
            break;
        }
        result = cleaned;
    }
    RE_TECH_INFO_BRACKET.replace_all(&result, "$1 $2").into_owned()
}
