//! Rule based media file renaming.
//!
//! A [`Rule`] matches a filename with a regex and renders a new name from the captured fields.
//! The matcher picks the best rule for each file,
//! and the renamer turns matches into sanitized names, renames files and records an audit log.

pub mod field;
pub mod files;
pub mod folder;
pub mod generate;
pub mod log;
pub mod matcher;
pub mod renamer;
pub mod rule;
pub mod sanitize;
pub mod settings;
pub mod store;
pub mod template;

pub use field::{Field, MatchResult};
pub use files::{RenameOutcome, is_media_file, rename_file, scan_media_files};
pub use folder::FolderContext;
pub use generate::GenerateOptions;
pub use log::{LogEntry, RenameLog, RenameStatus, RestoreSummary};
pub use matcher::{BestMatch, RuleFamily, Suggestion, calculate_score, find_best_rule, suggestions};
pub use renamer::{BatchSummary, PreviewEntry, Progress, RenameOptions, RuleAssignment, execute, plan_rename, preview};
pub use rule::{Rule, RuleDefinition, SpecialHandling};
pub use sanitize::sanitize_filename;
pub use settings::{MediaRenameConfig, RecognitionConfig, Settings};
pub use store::{LoadedRules, RuleStore};
pub use template::Template;
