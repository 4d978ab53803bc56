//! Filesystem-safe filenames.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum filename length in characters.
pub const MAX_FILENAME_LENGTH: usize = 200;

/// Used when nothing is left of the name.
pub const EMPTY_NAME_PLACEHOLDER: &str = "unnamed";

/// Windows device names that cannot be used as a file stem.
pub const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9", "LPT1", "LPT2",
    "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Characters that are never allowed in a filename.
pub const ILLEGAL_CHARACTERS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const TRIM_CHARACTERS: [char; 3] = [' ', '.', '-'];

static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

static RE_DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.+").expect("Failed to compile dots regex"));

static RE_DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("Failed to compile dashes regex"));

/// Convert a generated name into a legal filename.
///
/// Applying this to its own output returns the same string.
///
/// ```rust
/// use media_rename::rules::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Show: Part 1/2?.mkv"), "Show- Part 1-2.mkv");
/// assert_eq!(sanitize_filename("CON.mkv"), "_CON.mkv");
/// assert_eq!(sanitize_filename("  ...  "), "unnamed");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let substituted: String = name
        .chars()
        .filter_map(|c| match c {
            ':' | '/' | '\\' => Some('-'),
            '<' | '>' | '|' | '?' | '*' => None,
            '"' => Some('\''),
            _ => Some(c),
        })
        .collect();

    let collapsed = RE_WHITESPACE.replace_all(&substituted, " ");
    let collapsed = RE_DOTS.replace_all(&collapsed, ".");
    let collapsed = RE_DASHES.replace_all(&collapsed, "-");

    let mut result = collapsed.trim_matches(TRIM_CHARACTERS.as_slice()).to_string();
    if result.is_empty() {
        result = EMPTY_NAME_PLACEHOLDER.to_string();
    }

    if result.chars().count() > MAX_FILENAME_LENGTH {
        result = truncate(&result);
    }

    if is_reserved_name(&result) {
        result.insert(0, '_');
        if result.chars().count() > MAX_FILENAME_LENGTH {
            result.pop();
            result = result.trim_end_matches(TRIM_CHARACTERS.as_slice()).to_string();
        }
    }

    result
}

/// True if the stem of the filename is a reserved device name.
#[must_use]
pub fn is_reserved_name(filename: &str) -> bool {
    let (stem, _) = split_extension(filename);
    let stem = stem.to_uppercase();
    RESERVED_NAMES.contains(&stem.as_str())
}

/// True if the name contains any character that is illegal in a filename.
#[must_use]
pub fn contains_illegal_characters(filename: &str) -> bool {
    filename.contains(ILLEGAL_CHARACTERS.as_slice())
}

/// Split into stem and extension, where the extension includes the leading dot.
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(index) if index > 0 => filename.split_at(index),
        _ => (filename, ""),
    }
}

/// Shorten the stem so the whole name fits, keeping the extension.
fn truncate(name: &str) -> String {
    let (stem, extension) = split_extension(name);
    let extension_length = extension.chars().count();
    if extension_length >= MAX_FILENAME_LENGTH {
        let truncated: String = name.chars().take(MAX_FILENAME_LENGTH).collect();
        return truncated.trim_end_matches(TRIM_CHARACTERS.as_slice()).to_string();
    }

    let stem: String = stem.chars().take(MAX_FILENAME_LENGTH - extension_length).collect();
    let stem = stem.trim_end_matches(TRIM_CHARACTERS.as_slice());
    if stem.is_empty() {
        return EMPTY_NAME_PLACEHOLDER.to_string();
    }
    format!("{stem}{extension}")
}
