//! Media file discovery and validated renames.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::rules::sanitize::{ILLEGAL_CHARACTERS, RESERVED_NAMES};

pub const VIDEO_EXTENSIONS: [&str; 14] = [
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "3gp", "ogv", "ts", "m2ts",
];

pub const SUBTITLE_EXTENSIONS: [&str; 10] = ["srt", "ass", "ssa", "sub", "idx", "vtt", "ttml", "dfxp", "smi", "sami"];

/// Operating system limit for a single filename.
pub const MAX_RENAME_LENGTH: usize = 255;

/// Result of a single rename attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub ok: bool,
    pub reason: String,
}

impl RenameOutcome {
    #[must_use]
    pub fn success(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RenameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

/// True if the file has a supported video or subtitle extension, ignoring case.
#[must_use]
pub fn is_media_file(path: &Path) -> bool {
    let extension = crate::path_to_file_extension_string(path);
    VIDEO_EXTENSIONS.contains(&extension.as_str()) || SUBTITLE_EXTENSIONS.contains(&extension.as_str())
}

/// List media files in the directory, sorted case-insensitively.
///
/// Hidden files and directories are skipped.
/// A directory that does not exist gives an empty list.
#[must_use]
pub fn scan_media_files(directory: &Path, recurse: bool) -> Vec<PathBuf> {
    if !directory.is_dir() {
        return Vec::new();
    }

    let max_depth = if recurse { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !crate::is_hidden(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_media_file(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();

    files.sort_by_cached_key(|path| crate::path_to_string(path).to_lowercase());
    files
}

/// Rename a file within its directory after validating the new name.
///
/// Never returns an error: every problem is reported as a failed outcome with a reason.
#[must_use]
pub fn rename_file(path: &Path, new_name: &str) -> RenameOutcome {
    if new_name.trim().is_empty() {
        return RenameOutcome::failure("file name is empty");
    }

    let length = new_name.chars().count();
    if length > MAX_RENAME_LENGTH {
        return RenameOutcome::failure(format!("file name too long ({length} > {MAX_RENAME_LENGTH})"));
    }

    if let Some(illegal) = new_name.chars().find(|c| ILLEGAL_CHARACTERS.contains(c)) {
        return RenameOutcome::failure(format!("file name contains illegal character: '{illegal}'"));
    }

    let stem = crate::path_to_file_stem_string(Path::new(new_name)).to_uppercase();
    if RESERVED_NAMES.contains(&stem.as_str()) {
        return RenameOutcome::failure(format!("file name uses reserved name: {stem}"));
    }

    let old_name = crate::path_to_filename_string(path);
    if old_name == new_name {
        return RenameOutcome::success("name unchanged");
    }

    let new_path = path.with_file_name(new_name);
    let capitalization_change_only = old_name.to_lowercase() == new_name.to_lowercase();
    if !capitalization_change_only && new_path.exists() {
        return RenameOutcome::failure("target file already exists");
    }

    if let Err(error) = fs::OpenOptions::new().read(true).write(true).open(path) {
        return match error.kind() {
            ErrorKind::PermissionDenied => RenameOutcome::failure("file is locked or not writable"),
            ErrorKind::NotFound => RenameOutcome::failure("source file does not exist"),
            _ => RenameOutcome::failure(format!("file access error: {error}")),
        };
    }

    let result = if capitalization_change_only {
        // Case-insensitive file systems need an intermediate name
        rename_with_temp_file(path, &new_path)
    } else {
        fs::rename(path, &new_path)
    };

    match result {
        Ok(()) => RenameOutcome::success("renamed"),
        Err(error) if error.kind() == ErrorKind::PermissionDenied => {
            RenameOutcome::failure(format!("permission denied: {error}"))
        }
        Err(error) => RenameOutcome::failure(format!("rename failed: {error}")),
    }
}

/// Rename through an intermediate name so that case-only changes work on case-insensitive file systems.
pub(crate) fn rename_with_temp_file(path: &Path, new_path: &Path) -> std::io::Result<()> {
    let temp_file = crate::append_extension_to_path(new_path.to_path_buf(), "tmp");
    fs::rename(path, &temp_file)?;
    fs::rename(&temp_file, new_path)
}

#[cfg(test)]
mod files_tests {
    use super::*;

    use std::fs::File;

    use tempfile::tempdir;

    #[test]
    fn media_extensions_ignore_case() {
        assert!(is_media_file(Path::new("a.MKV")));
        assert!(is_media_file(Path::new("a.tc.ass")));
        assert!(is_media_file(Path::new("dir/a.m2ts")));
        assert!(!is_media_file(Path::new("a.txt")));
        assert!(!is_media_file(Path::new("mkv")));
    }

    #[test]
    fn scan_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        assert!(scan_media_files(&dir.path().join("missing"), false).is_empty());
    }

    #[test]
    fn scan_filters_sorts_and_skips_hidden() {
        let dir = tempdir().unwrap();
        for name in ["b.mkv", "A.srt", "c.txt", ".hidden.mkv", "C.MP4"] {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub").join("d.mkv")).unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        File::create(dir.path().join(".cache").join("e.mkv")).unwrap();

        let names: Vec<String> = scan_media_files(dir.path(), false)
            .iter()
            .map(|path| crate::path_to_filename_string(path))
            .collect();
        assert_eq!(names, vec!["A.srt", "b.mkv", "C.MP4"]);

        let recursive = scan_media_files(dir.path(), true);
        assert_eq!(recursive.len(), 4);
        assert!(recursive.iter().any(|path| path.ends_with("sub/d.mkv")));
    }

    #[test]
    fn rename_succeeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.mkv");
        File::create(&path).unwrap();
        let outcome = rename_file(&path, "new.mkv");
        assert!(outcome.ok, "{outcome}");
        assert!(dir.path().join("new.mkv").exists());
        assert!(!path.exists());
    }

    #[test]
    fn rename_rejects_invalid_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.mkv");
        File::create(&path).unwrap();

        assert_eq!(rename_file(&path, "  ").reason, "file name is empty");
        assert!(rename_file(&path, &"a".repeat(256)).reason.starts_with("file name too long"));
        assert_eq!(
            rename_file(&path, "a?b.mkv").reason,
            "file name contains illegal character: '?'"
        );
        assert_eq!(rename_file(&path, "nul.mkv").reason, "file name uses reserved name: NUL");
        assert!(path.exists());
    }

    #[test]
    fn rename_refuses_existing_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.mkv");
        File::create(&path).unwrap();
        fs::write(dir.path().join("taken.mkv"), "keep").unwrap();

        let outcome = rename_file(&path, "taken.mkv");
        assert!(!outcome.ok);
        assert_eq!(outcome.reason, "target file already exists");
        assert_eq!(fs::read_to_string(dir.path().join("taken.mkv")).unwrap(), "keep");
    }

    #[test]
    fn rename_missing_source_fails() {
        let dir = tempdir().unwrap();
        let outcome = rename_file(&dir.path().join("gone.mkv"), "new.mkv");
        assert!(!outcome.ok);
        assert_eq!(outcome.reason, "source file does not exist");
    }

    #[test]
    fn capitalization_change_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("show.mkv");
        File::create(&path).unwrap();
        let outcome = rename_file(&path, "Show.mkv");
        assert!(outcome.ok, "{outcome}");
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Show.mkv"]);
    }

    #[test]
    fn unchanged_name_is_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("same.mkv");
        File::create(&path).unwrap();
        let outcome = rename_file(&path, "same.mkv");
        assert!(outcome.ok);
        assert!(path.exists());
    }
}
