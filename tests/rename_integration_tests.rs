//! Integration tests for scanning, renaming and restoring files in a temporary directory.

use std::fs::{self, File};
use std::ops::ControlFlow;
use std::path::Path;

use media_rename::rules::log::RENAME_LOG_NAME;
use media_rename::rules::store::compile_default_rules;
use media_rename::rules::{
    Field, RecognitionConfig, RenameLog, RenameOptions, RenameStatus, Rule, RuleAssignment, RuleDefinition,
    RuleStore, SpecialHandling, execute, find_best_rule, plan_rename, preview, sanitize_filename, scan_media_files,
};
use tempfile::tempdir;

const FANSUB_FILE: &str = "[Fansub] 05 Episode Title [1080p].mkv";

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dir");
    }
    File::create(path).expect("create file");
}

#[test]
fn scan_rename_and_restore_directory() {
    let dir = tempdir().expect("temp dir");
    touch(&dir.path().join(FANSUB_FILE));
    touch(&dir.path().join("[Fansub] 06 Next One [1080p].ass"));
    touch(&dir.path().join("notes.txt"));
    touch(&dir.path().join("extras").join("[Fansub] 07 Bonus.mkv"));

    let files = scan_media_files(dir.path(), false);
    assert_eq!(files.len(), 2);

    let rules = compile_default_rules().expect("built-in rules");
    let recognition = RecognitionConfig::default();
    let options = RenameOptions::new(&recognition);
    let summary = execute(&files, &RuleAssignment::Auto(&rules), &options, |_| ControlFlow::Continue(()));

    assert_eq!(summary.success, 2);
    assert_eq!(summary.failure, 0);
    assert!(summary.log_errors.is_empty());
    assert!(dir.path().join("Fansub S01E05 - Episode Title.mkv").exists());
    assert!(dir.path().join("Fansub S01E06 - Next One.ass").exists());
    assert!(dir.path().join("extras").join("[Fansub] 07 Bonus.mkv").exists());

    let log = RenameLog::new(dir.path());
    assert_eq!(log.path(), dir.path().join(RENAME_LOG_NAME));
    let entries = log.load().expect("log");
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|entry| entry.status == RenameStatus::Success));
    assert_eq!(entries[0].rule_name.as_deref(), Some("Standard Episode"));

    let restored = log.restore_all().expect("restore");
    assert_eq!(restored.restored, 2);
    assert_eq!(restored.failed, 0);
    assert!(dir.path().join(FANSUB_FILE).exists());
    assert!(dir.path().join("[Fansub] 06 Next One [1080p].ass").exists());
    assert!(!dir.path().join("Fansub S01E05 - Episode Title.mkv").exists());
}

#[test]
fn recursive_scan_logs_per_directory() {
    let dir = tempdir().expect("temp dir");
    touch(&dir.path().join("a").join(FANSUB_FILE));
    touch(&dir.path().join("b").join("[Group] 01 Pilot.mkv"));
    touch(&dir.path().join(".hidden").join("[Group] 02 Hidden.mkv"));

    let files = scan_media_files(dir.path(), true);
    assert_eq!(files.len(), 2);

    let rules = compile_default_rules().expect("built-in rules");
    let recognition = RecognitionConfig::default();
    let summary = execute(
        &files,
        &RuleAssignment::Auto(&rules),
        &RenameOptions::new(&recognition),
        |_| ControlFlow::Continue(()),
    );
    assert_eq!(summary.success, 2);

    for sub in ["a", "b"] {
        let entries = RenameLog::new(&dir.path().join(sub)).load().expect("log");
        assert_eq!(entries.len(), 1, "Expected one log entry in {sub}");
    }
    assert!(!dir.path().join(RENAME_LOG_NAME).exists());
}

#[test]
fn folder_context_and_custom_season() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("MySeries").join("S02").join(FANSUB_FILE);
    touch(&path);

    let rules = compile_default_rules().expect("built-in rules");
    let rule = RuleAssignment::manual(&rules, "Standard Episode").expect("rule exists");
    let RuleAssignment::Manual(rule) = rule else {
        panic!("Expected a manual assignment");
    };

    let recognition = RecognitionConfig::default();
    let mut options = RenameOptions::new(&recognition);
    let planned = plan_rename(&path, rule, &options).expect("should plan");
    assert_eq!(planned.new_name, "Fansub S01E05 - Episode Title.mkv");

    options.apply_folder_info = true;
    let planned = plan_rename(&path, rule, &options).expect("should plan");
    assert_eq!(planned.new_name, "MySeries S02E05 - Episode Title.mkv");

    options.custom_season = Some("3");
    let planned = plan_rename(&path, rule, &options).expect("should plan");
    assert_eq!(planned.new_name, "MySeries S03E05 - Episode Title.mkv");
}

#[test]
fn preview_does_not_touch_files() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join(FANSUB_FILE);
    touch(&path);
    touch(&dir.path().join("random.mkv"));

    let files = scan_media_files(dir.path(), false);
    let rules = compile_default_rules().expect("built-in rules");
    let recognition = RecognitionConfig::default();
    let entries = preview(&files, &RuleAssignment::Auto(&rules), &RenameOptions::new(&recognition));

    assert_eq!(entries.len(), 2);
    let fansub = entries
        .iter()
        .find(|entry| entry.original_name == FANSUB_FILE)
        .expect("fansub entry");
    assert!(fansub.success);
    assert_eq!(fansub.new_name, "Fansub S01E05 - Episode Title.mkv");

    let random = entries
        .iter()
        .find(|entry| entry.original_name == "random.mkv")
        .expect("random entry");
    assert!(!random.success);
    assert_eq!(random.new_name, "random.mkv");

    assert!(path.exists());
    assert!(!dir.path().join(RENAME_LOG_NAME).exists());
}

#[test]
fn rules_from_store_with_broken_file() {
    let dir = tempdir().expect("temp dir");
    let store = RuleStore::new(dir.path().join("rules"));

    let year_rule = RuleDefinition::new(
        "Dated Release",
        r"\[([^\]]+)\]\s*(\d+)(?:\s+([^\[.]+?))?(?:\s*\[|\.)",
        &[(Field::Series, 1), (Field::Episode, 2), (Field::Title, 3)],
        "{series} S01E{episode:0>2} - {title}",
    )
    .with_special_handling(SpecialHandling {
        year_pattern: Some(r"^(19|20)\d{2}$".to_string()),
        ..SpecialHandling::default()
    });
    store.save_rule(&year_rule).expect("save rule");
    fs::write(store.dir().join("broken.json"), "{ not json").expect("write broken rule");

    let loaded = store.load_all().expect("load rules");
    assert_eq!(loaded.rules.len(), 1);
    assert_eq!(loaded.failures.len(), 1);

    let rule = &loaded.rules[0];
    let recognition = RecognitionConfig::default();
    let options = RenameOptions::new(&recognition);
    let planned = plan_rename(Path::new("/media/[Film] 2020 [1080p].mkv"), rule, &options).expect("should plan");
    assert_eq!(planned.new_name, "Film S01E01 - (2020).mkv");

    let planned = plan_rename(Path::new("/media/[Film] 7.mkv"), rule, &options).expect("should plan");
    assert_eq!(planned.new_name, "Film S01E07.mkv");

    assert!(store.delete_rule("Dated Release").expect("delete"));
    assert!(!store.delete_rule("Dated Release").expect("delete"));
}

#[test]
fn default_rules_round_trip_through_store() {
    let dir = tempdir().expect("temp dir");
    let store = RuleStore::new(dir.path());
    let written = store.create_default_rules().expect("write rules");
    assert_eq!(written.len(), 5);

    let loaded = store.load_all().expect("load rules");
    assert!(loaded.failures.is_empty());
    let names: Vec<&str> = loaded.rules.iter().map(Rule::name).collect();
    assert_eq!(
        names,
        ["Documentary", "Movie", "Season Episode", "Simple Number", "Standard Episode"]
    );
}

#[test]
fn no_rules_means_no_match() {
    let best = find_best_rule(FANSUB_FILE, &[]);
    assert!(best.rule.is_none());
    assert!(best.match_result.is_empty());
}

#[test]
fn sanitized_names_are_safe_and_stable() {
    let long_name = "x".repeat(400);
    let inputs = [
        "Show: Part 1/2 <final>?.mkv",
        "  ...  ",
        "CON.mkv",
        "a  -  -  b....mkv",
        "\"quoted\" *name*|",
        long_name.as_str(),
    ];
    for input in inputs {
        let once = sanitize_filename(input);
        assert!(!once.is_empty(), "Empty result for {input:?}");
        assert!(once.chars().count() <= 200, "Too long for {input:?}");
        assert!(
            !once.contains(['<', '>', ':', '"', '/', '\\', '|', '?', '*']),
            "Illegal characters in {once:?}"
        );
        assert_eq!(sanitize_filename(&once), once, "Not idempotent for {input:?}");
    }
}

#[test]
fn restore_refuses_to_overwrite_existing_original() {
    let dir = tempdir().expect("temp dir");
    touch(&dir.path().join(FANSUB_FILE));

    let files = scan_media_files(dir.path(), false);
    let rules = compile_default_rules().expect("built-in rules");
    let recognition = RecognitionConfig::default();
    let summary = execute(
        &files,
        &RuleAssignment::Auto(&rules),
        &RenameOptions::new(&recognition),
        |_| ControlFlow::Continue(()),
    );
    assert_eq!(summary.success, 1);

    touch(&dir.path().join(FANSUB_FILE));
    let restored = RenameLog::new(dir.path()).restore_all().expect("restore");
    assert_eq!(restored.restored, 0);
    assert_eq!(restored.failed, 1);
    assert!(dir.path().join("Fansub S01E05 - Episode Title.mkv").exists());
}
