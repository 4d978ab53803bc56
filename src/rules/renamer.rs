//! Rename planning, preview and batch execution.

use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;

use crate::rules::field::MatchResult;
use crate::rules::files::rename_file;
use crate::rules::folder::FolderContext;
use crate::rules::generate::GenerateOptions;
use crate::rules::log::{RenameLog, RenameStatus};
use crate::rules::matcher::{calculate_score, find_best_rule};
use crate::rules::rule::Rule;
use crate::rules::sanitize::sanitize_filename;
use crate::rules::settings::RecognitionConfig;

/// Subtitle extension that is kept whole instead of only the last part.
const COMPOUND_SUBTITLE_EXTENSION: &str = ".tc.ass";

const STATUS_PROCESSING: &str = "processing";
const REASON_RENAMED: &str = "renamed";
const REASON_NO_RULE: &str = "no matching rule";
const REASON_NO_MATCH: &str = "rule did not match";
const REASON_TARGET_EXISTS: &str = "target file already exists";
const REASON_UNCHANGED: &str = "name unchanged";
const REASON_CANCELLED: &str = "cancelled";

/// User overrides and folder handling shared by every file in a batch.
#[derive(Debug, Clone, Copy)]
pub struct RenameOptions<'a> {
    pub custom_title: Option<&'a str>,
    pub custom_season: Option<&'a str>,
    /// Apply series and season found in parent folder names to the new name.
    pub apply_folder_info: bool,
    pub recognition: &'a RecognitionConfig,
}

/// Which rule is used for each file.
#[derive(Debug, Clone, Copy)]
pub enum RuleAssignment<'a> {
    /// Best scoring rule per file.
    Auto(&'a [Rule]),
    /// The same rule for every file.
    Manual(&'a Rule),
}

/// New name for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedName {
    pub new_name: String,
    pub match_result: MatchResult,
}

/// Preview of what renaming one file would do.
#[derive(Debug, Clone)]
pub struct PreviewEntry {
    pub path: PathBuf,
    pub original_name: String,
    /// Same as the original name when planning failed.
    pub new_name: String,
    pub success: bool,
    pub rule_name: Option<String>,
    pub score: f64,
    /// Matched fields on success, otherwise the failure reason.
    pub match_info: String,
    /// Folder information for display. Only used in the new name if folder info is applied.
    pub folder_context: FolderContext,
    /// Another file in the preview would get the same path.
    pub is_duplicate: bool,
}

/// Progress report for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress<'a> {
    /// Starts from 1.
    pub index: usize,
    pub total: usize,
    pub filename: &'a str,
    pub status: String,
}

/// Final state of one file in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub path: PathBuf,
    pub original_name: String,
    pub new_name: String,
    pub rule_name: Option<String>,
    pub status: RenameStatus,
    pub reason: String,
}

/// Counts and per-file details of a batch rename.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub details: Vec<FileResult>,
    /// Audit log writes that failed. These do not change the file results.
    pub log_errors: Vec<String>,
}

impl<'a> RenameOptions<'a> {
    #[must_use]
    pub const fn new(recognition: &'a RecognitionConfig) -> Self {
        Self {
            custom_title: None,
            custom_season: None,
            apply_folder_info: false,
            recognition,
        }
    }

    fn generate_options(&self, extension: &'a str, path: &'a Path) -> GenerateOptions<'a> {
        GenerateOptions::new(extension, self.recognition)
            .with_path(path, self.apply_folder_info)
            .with_custom_season(self.custom_season)
            .with_custom_title(self.custom_title)
    }
}

impl<'a> RuleAssignment<'a> {
    /// Use the named rule for every file.
    ///
    /// # Errors
    /// Returns an error if no rule has the given name.
    pub fn manual(rules: &'a [Rule], name: &str) -> Result<Self> {
        rules
            .iter()
            .find(|rule| rule.name() == name)
            .map(Self::Manual)
            .with_context(|| format!("Rule not found: {name}"))
    }

    /// Rule to use for the filename with its score.
    ///
    /// A manual rule is always returned, even if it does not match.
    #[must_use]
    pub fn select(&self, filename: &str) -> Option<(&'a Rule, f64)> {
        match *self {
            Self::Auto(rules) => {
                let best = find_best_rule(filename, rules);
                best.rule.map(|rule| (rule, best.score))
            }
            Self::Manual(rule) => Some((rule, calculate_score(rule, filename))),
        }
    }
}

impl BatchSummary {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.success + self.failure + self.skipped
    }

    fn record(&mut self, result: FileResult) {
        match result.status {
            RenameStatus::Success => self.success += 1,
            RenameStatus::Failure => self.failure += 1,
            RenameStatus::Skipped => self.skipped += 1,
        }
        self.details.push(result);
    }
}

impl FileResult {
    fn new(path: &Path, original_name: &str, status: RenameStatus, reason: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            original_name: original_name.to_string(),
            new_name: original_name.to_string(),
            rule_name: None,
            status,
            reason: reason.to_string(),
        }
    }

    /// Status text for progress reporting.
    #[must_use]
    pub fn progress_status(&self) -> String {
        match self.status {
            RenameStatus::Success => self.status.to_string(),
            _ => format!("{} - {}", self.status, self.reason),
        }
    }
}

impl fmt::Display for Progress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}: {}", self.index, self.total, self.filename, self.status)
    }
}

impl fmt::Display for FileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({})",
            self.status, self.original_name, self.new_name, self.reason
        )
    }
}

/// Extension passed to name generation, including the leading dot.
///
/// `.tc.ass` subtitles keep the full compound extension.
#[must_use]
pub fn compound_extension(filename: &str) -> String {
    if filename.ends_with(COMPOUND_SUBTITLE_EXTENSION) {
        return COMPOUND_SUBTITLE_EXTENSION.to_string();
    }
    Path::new(filename)
        .extension()
        .map(|extension| format!(".{}", extension.to_string_lossy()))
        .unwrap_or_default()
}

/// Generate the sanitized new name for the file with the given rule.
///
/// # Errors
/// Returns `rule did not match` if the rule does not match the filename,
/// or a format error if the output format cannot be rendered.
pub fn plan_rename(path: &Path, rule: &Rule, options: &RenameOptions) -> Result<PlannedName> {
    let filename = crate::path_to_normalized_filename(path);
    let match_result = rule.match_filename(&filename).ok_or_else(|| anyhow!(REASON_NO_MATCH))?;
    let extension = compound_extension(&filename);
    let generated = rule.generate(&match_result, &options.generate_options(&extension, path))?;
    Ok(PlannedName {
        new_name: sanitize_filename(&generated),
        match_result,
    })
}

/// Plan every file without touching the filesystem.
#[must_use]
pub fn preview<P: AsRef<Path>>(
    files: &[P],
    assignment: &RuleAssignment,
    options: &RenameOptions,
) -> Vec<PreviewEntry> {
    let mut entries: Vec<PreviewEntry> = files
        .iter()
        .map(|path| preview_file(path.as_ref(), assignment, options))
        .collect();

    let counts = entries.iter().map(target_path).counts();
    for entry in &mut entries {
        entry.is_duplicate = counts.get(&target_path(entry)).is_some_and(|count| *count > 1);
    }
    entries
}

/// Rename files one at a time and record every outcome in the directory's audit log.
///
/// The callback is called before and after each file.
/// Returning [`ControlFlow::Break`] stops the batch and every remaining file is skipped.
pub fn execute<P, F>(
    files: &[P],
    assignment: &RuleAssignment,
    options: &RenameOptions,
    mut progress: F,
) -> BatchSummary
where
    P: AsRef<Path>,
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    let total = files.len();
    let mut summary = BatchSummary::default();
    let mut cancelled = false;

    for (index, path) in files.iter().enumerate() {
        let path = path.as_ref();
        let filename = crate::path_to_filename_string(path);

        if !cancelled {
            cancelled = progress(&Progress {
                index: index + 1,
                total,
                filename: &filename,
                status: STATUS_PROCESSING.to_string(),
            })
            .is_break();
        }

        let result = if cancelled {
            FileResult::new(path, &filename, RenameStatus::Skipped, REASON_CANCELLED)
        } else {
            rename_single(path, &filename, assignment, options)
        };

        if let Err(error) = write_log(&result) {
            summary.log_errors.push(format!("{error:#}"));
        }

        if !cancelled {
            cancelled = progress(&Progress {
                index: index + 1,
                total,
                filename: &filename,
                status: result.progress_status(),
            })
            .is_break();
        }

        summary.record(result);
    }

    summary
}

fn preview_file(path: &Path, assignment: &RuleAssignment, options: &RenameOptions) -> PreviewEntry {
    let original_name = crate::path_to_filename_string(path);
    let mut entry = PreviewEntry {
        path: path.to_path_buf(),
        new_name: original_name.clone(),
        success: false,
        rule_name: None,
        score: 0.0,
        match_info: REASON_NO_RULE.to_string(),
        folder_context: options.recognition.folder_context(path),
        is_duplicate: false,
        original_name,
    };

    let Some((rule, score)) = assignment.select(&crate::path_to_normalized_filename(path)) else {
        return entry;
    };
    entry.rule_name = Some(rule.name().to_string());
    entry.score = score;

    match plan_rename(path, rule, options) {
        Ok(planned) => {
            entry.new_name = planned.new_name;
            entry.success = true;
            entry.match_info = planned.match_result.to_string();
        }
        Err(error) => entry.match_info = error.to_string(),
    }
    entry
}

fn rename_single(path: &Path, filename: &str, assignment: &RuleAssignment, options: &RenameOptions) -> FileResult {
    let Some((rule, _)) = assignment.select(&crate::path_to_normalized_filename(path)) else {
        return FileResult::new(path, filename, RenameStatus::Failure, REASON_NO_RULE);
    };

    let mut result = FileResult::new(path, filename, RenameStatus::Failure, "");
    result.rule_name = Some(rule.name().to_string());

    let planned = match plan_rename(path, rule, options) {
        Ok(planned) => planned,
        Err(error) => {
            result.reason = error.to_string();
            return result;
        }
    };
    result.new_name = planned.new_name;

    if result.new_name == filename {
        result.status = RenameStatus::Skipped;
        REASON_UNCHANGED.clone_into(&mut result.reason);
        return result;
    }

    let capitalization_change_only = result.new_name.to_lowercase() == filename.to_lowercase();
    if !capitalization_change_only && path.with_file_name(&result.new_name).exists() {
        result.status = RenameStatus::Skipped;
        REASON_TARGET_EXISTS.clone_into(&mut result.reason);
        return result;
    }

    let outcome = rename_file(path, &result.new_name);
    if outcome.ok {
        result.status = RenameStatus::Success;
        REASON_RENAMED.clone_into(&mut result.reason);
    } else {
        result.reason = outcome.reason;
    }
    result
}

fn write_log(result: &FileResult) -> Result<()> {
    let directory = result.path.parent().unwrap_or_else(|| Path::new("."));
    RenameLog::new(directory).log_rename(
        &result.original_name,
        &result.new_name,
        result.rule_name.as_deref(),
        result.status,
        &result.reason,
    )
}

fn target_path(entry: &PreviewEntry) -> PathBuf {
    entry.path.with_file_name(&entry.new_name)
}

#[cfg(test)]
mod renamer_tests {
    use super::*;

    use std::fs::{self, File};

    use tempfile::tempdir;

    use crate::rules::field::Field;
    use crate::rules::log::RENAME_LOG_NAME;
    use crate::rules::rule::RuleDefinition;
    use crate::rules::store::compile_default_rules;

    fn standard_rule() -> Rule {
        Rule::new(RuleDefinition::new(
            "Standard Episode",
            r"\[([^\]]+)\]\s*(\d+)\s*(.+?)(?:\s*\[|\s*\(|$)",
            &[(Field::Series, 1), (Field::Episode, 2), (Field::Title, 3)],
            "{series} S01E{episode:0>2} - {title}",
        ))
        .unwrap()
    }

    fn create_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                File::create(&path).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn compound_extensions() {
        assert_eq!(compound_extension("show.tc.ass"), ".tc.ass");
        assert_eq!(compound_extension("show.sc.ass"), ".ass");
        assert_eq!(compound_extension("show.mkv"), ".mkv");
        assert_eq!(compound_extension("show"), "");
    }

    #[test]
    fn plan_keeps_compound_subtitle_extension() {
        let recognition = RecognitionConfig::default();
        let options = RenameOptions::new(&recognition);
        let planned = plan_rename(
            Path::new("/media/[Group] 03 Name [720p].tc.ass"),
            &standard_rule(),
            &options,
        )
        .unwrap();
        assert_eq!(planned.new_name, "Group S01E03 - Name.tc.ass");
    }

    #[test]
    fn plan_sanitizes_and_applies_custom_title() {
        let recognition = RecognitionConfig::default();
        let options = RenameOptions {
            custom_title: Some("Who: Are You?"),
            ..RenameOptions::new(&recognition)
        };
        let planned = plan_rename(Path::new("[Group] 01 Pilot [1080p].mkv"), &standard_rule(), &options).unwrap();
        assert_eq!(planned.new_name, "Who- Are You S01E01 - Pilot.mkv");
        assert_eq!(planned.match_result.get(Field::Series), "Group");
    }

    #[test]
    fn plan_reports_mismatch() {
        let recognition = RecognitionConfig::default();
        let error = plan_rename(Path::new("plain.mkv"), &standard_rule(), &RenameOptions::new(&recognition)).unwrap_err();
        assert_eq!(error.to_string(), REASON_NO_MATCH);
    }

    #[test]
    fn manual_assignment_requires_known_rule() {
        let rules = compile_default_rules().unwrap();
        assert!(RuleAssignment::manual(&rules, "Movie").is_ok());
        let error = RuleAssignment::manual(&rules, "Nope").unwrap_err();
        assert_eq!(error.to_string(), "Rule not found: Nope");
    }

    #[test]
    fn preview_marks_duplicates_and_failures() {
        let recognition = RecognitionConfig::default();
        let rules = vec![standard_rule()];
        let files = [
            PathBuf::from("/media/[Group] 01 Pilot [1080p].mkv"),
            PathBuf::from("/media/[Group] 01 Pilot [720p].mkv"),
            PathBuf::from("/media/[Group] 02 Next [720p].mkv"),
            PathBuf::from("/media/notes.srt"),
        ];
        let entries = preview(&files, &RuleAssignment::Auto(&rules), &RenameOptions::new(&recognition));
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].new_name, "Group S01E01 - Pilot.mkv");
        assert!(entries[0].is_duplicate);
        assert!(entries[1].is_duplicate);
        assert!(!entries[2].is_duplicate);
        assert!(entries[2].success);
        assert_eq!(entries[2].rule_name.as_deref(), Some("Standard Episode"));
        assert!(!entries[3].success);
        assert_eq!(entries[3].new_name, "notes.srt");
        assert_eq!(entries[3].match_info, REASON_NO_RULE);
    }

    #[test]
    fn preview_shows_folder_context_without_applying_it() {
        let recognition = RecognitionConfig::default();
        let rule = standard_rule();
        let files = [PathBuf::from("/media/MySeries/S02/[Group] 05 Name [1080p].mkv")];

        let entries = preview(&files, &RuleAssignment::Manual(&rule), &RenameOptions::new(&recognition));
        assert_eq!(entries[0].folder_context.series_name.as_deref(), Some("MySeries"));
        assert_eq!(entries[0].folder_context.season.as_deref(), Some("02"));
        assert_eq!(entries[0].new_name, "Group S01E05 - Name.mkv");

        let applied = RenameOptions {
            apply_folder_info: true,
            ..RenameOptions::new(&recognition)
        };
        let entries = preview(&files, &RuleAssignment::Manual(&rule), &applied);
        assert_eq!(entries[0].new_name, "MySeries S02E05 - Name.mkv");
    }

    #[test]
    fn execute_renames_and_logs() {
        let dir = tempdir().unwrap();
        let files = create_files(dir.path(), &["[Group] 01 Pilot [1080p].mkv", "notes.srt"]);
        let recognition = RecognitionConfig::default();
        let rules = vec![standard_rule()];

        let mut reports = Vec::new();
        let summary = execute(
            &files,
            &RuleAssignment::Auto(&rules),
            &RenameOptions::new(&recognition),
            |progress| {
                reports.push(progress.to_string());
                ControlFlow::Continue(())
            },
        );

        assert_eq!(summary.success, 1);
        assert_eq!(summary.failure, 1);
        assert_eq!(summary.total(), 2);
        assert!(summary.log_errors.is_empty());
        assert!(dir.path().join("Group S01E01 - Pilot.mkv").exists());
        assert_eq!(
            reports,
            vec![
                "[1/2] [Group] 01 Pilot [1080p].mkv: processing",
                "[1/2] [Group] 01 Pilot [1080p].mkv: success",
                "[2/2] notes.srt: processing",
                "[2/2] notes.srt: failure - no matching rule",
            ]
        );

        let entries = RenameLog::new(dir.path()).load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].new_name, "Group S01E01 - Pilot.mkv");
        assert_eq!(entries[0].rule_name.as_deref(), Some("Standard Episode"));
        assert_eq!(entries[1].status, RenameStatus::Failure);
    }

    #[test]
    fn execute_skips_existing_target() {
        let dir = tempdir().unwrap();
        let files = create_files(dir.path(), &["[Group] 01 Pilot [1080p].mkv"]);
        fs::write(dir.path().join("Group S01E01 - Pilot.mkv"), "keep").unwrap();
        let recognition = RecognitionConfig::default();
        let rule = standard_rule();

        let summary = execute(
            &files,
            &RuleAssignment::Manual(&rule),
            &RenameOptions::new(&recognition),
            |_| ControlFlow::Continue(()),
        );
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.details[0].reason, REASON_TARGET_EXISTS);
        assert!(files[0].exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("Group S01E01 - Pilot.mkv")).unwrap(),
            "keep"
        );
    }

    #[test]
    fn execute_manual_rule_mismatch_is_failure() {
        let dir = tempdir().unwrap();
        let files = create_files(dir.path(), &["plain.mkv"]);
        let recognition = RecognitionConfig::default();
        let rule = standard_rule();

        let summary = execute(
            &files,
            &RuleAssignment::Manual(&rule),
            &RenameOptions::new(&recognition),
            |_| ControlFlow::Continue(()),
        );
        assert_eq!(summary.failure, 1);
        assert_eq!(summary.details[0].reason, REASON_NO_MATCH);
        assert_eq!(summary.details[0].rule_name.as_deref(), Some("Standard Episode"));
        assert!(files[0].exists());
    }

    #[test]
    fn execute_format_error_does_not_stop_batch() {
        let dir = tempdir().unwrap();
        let files = create_files(dir.path(), &["01 a.mkv", "[Group] 02 b [x].mkv"]);
        let recognition = RecognitionConfig::default();
        let broken = Rule::new(RuleDefinition::new(
            "Broken",
            r"(\d+)",
            &[(Field::Episode, 1)],
            "{series} {episode}",
        ))
        .unwrap();

        let summary = execute(
            &files,
            &RuleAssignment::Manual(&broken),
            &RenameOptions::new(&recognition),
            |_| ControlFlow::Continue(()),
        );
        assert_eq!(summary.failure, 2);
        assert_eq!(summary.details[0].reason, "format error: missing 'series'");
        assert_eq!(summary.details.len(), 2);
    }

    #[test]
    fn execute_stops_when_cancelled() {
        let dir = tempdir().unwrap();
        let files = create_files(
            dir.path(),
            &["[A] 01 x [1].mkv", "[A] 02 y [1].mkv", "[A] 03 z [1].mkv"],
        );
        let recognition = RecognitionConfig::default();
        let rule = standard_rule();

        let mut calls = 0;
        let summary = execute(
            &files,
            &RuleAssignment::Manual(&rule),
            &RenameOptions::new(&recognition),
            |progress| {
                calls += 1;
                if progress.index == 1 && progress.status != STATUS_PROCESSING {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        );

        assert_eq!(calls, 2);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.skipped, 2);
        assert!(summary.details[1..].iter().all(|result| result.reason == REASON_CANCELLED));
        assert!(files[1].exists());
        assert!(files[2].exists());
        assert_eq!(RenameLog::new(dir.path()).load().unwrap().len(), 3);
        assert!(dir.path().join(RENAME_LOG_NAME).exists());
    }

    #[test]
    fn executed_batch_can_be_restored() {
        let dir = tempdir().unwrap();
        let files = create_files(dir.path(), &["[Group] 01 Pilot [1080p].mkv", "[Group] 02 Next [1080p].mkv"]);
        let recognition = RecognitionConfig::default();
        let rule = standard_rule();

        let summary = execute(
            &files,
            &RuleAssignment::Manual(&rule),
            &RenameOptions::new(&recognition),
            |_| ControlFlow::Continue(()),
        );
        assert_eq!(summary.success, 2);
        assert!(!files[0].exists());

        let restored = RenameLog::new(dir.path()).restore_all().unwrap();
        assert_eq!(restored.restored, 2);
        assert!(files.iter().all(|path| path.exists()));
    }
}
