use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use media_rename::rules::renamer::FileResult;
use media_rename::rules::store::compile_default_rules;
use media_rename::rules::{
    BatchSummary, PreviewEntry, RenameLog, RenameOptions, RenameStatus, Rule, RuleAssignment, RuleStore, Settings,
    execute, plan_rename, preview, scan_media_files, suggestions,
};
use media_rename::{print_error, print_warning};

use crate::config::Config;
use crate::{Args, Command, ConfigCommand, RulesCommand};

const PROGRESS_BAR_CHARS: &str = "=>-";
const PROGRESS_BAR_TEMPLATE: &str = "[{elapsed_precise}] {bar:80.magenta/blue} {pos}/{len} {percent}%";

/// Media file renamer CLI.
pub struct MediaRename {
    command: Option<Command>,
    path: Option<PathBuf>,
    config: Config,
    settings: Settings,
    store: RuleStore,
}

impl MediaRename {
    /// Init new instance with CLI args.
    pub fn new(args: Args) -> Result<Self> {
        let settings = Settings::load().unwrap_or_else(|error| {
            print_error!("{error:#}");
            Settings::default()
        });
        let config = Config::from_args(&args, &settings)?;
        let store = RuleStore::new(config.rules_dir.clone());
        Ok(Self {
            command: args.command,
            path: args.path,
            config,
            settings,
            store,
        })
    }

    /// Run with given args.
    #[inline]
    pub fn run_with_args(args: Args) -> Result<()> {
        Self::new(args)?.run()
    }

    /// Run the selected command.
    pub fn run(&self) -> Result<()> {
        if self.config.debug {
            println!("{self}");
        }
        match self.command.clone() {
            None | Some(Command::Rename { .. } | Command::Preview { .. }) => self.rename(),
            Some(Command::Match { filename, .. }) => self.print_suggestions(&filename),
            Some(Command::Restore { .. }) => self.restore(),
            Some(Command::Log { clear, .. }) => self.show_log(clear),
            Some(Command::Rules(command)) => self.manage_rules(&command),
            Some(Command::Config(command)) => self.manage_config(&command),
        }
    }

    fn rename(&self) -> Result<()> {
        let root = media_rename::resolve_input_path(self.path.as_deref())?;
        let files = self.gather_files(&root);
        if files.is_empty() {
            println!("No media files found");
            return Ok(());
        }
        if self.config.verbose {
            println!("Found {} media file(s)", files.len());
        }

        let rules = self.load_rules()?;
        let assignment = self.assignment(&rules)?;
        let options = self.rename_options();

        if self.config.dryrun {
            let entries = preview(&files, &assignment, &options);
            self.print_preview(&entries, &root);
            return Ok(());
        }

        let summary = self.execute_with_progress(&files, &assignment, &options)?;
        self.print_results(&summary, &root);
        print_summary(&summary);
        Ok(())
    }

    fn execute_with_progress(
        &self,
        files: &[PathBuf],
        assignment: &RuleAssignment,
        options: &RenameOptions,
    ) -> Result<BatchSummary> {
        let abort_flag = Arc::new(AtomicBool::new(false));
        let abort_flag_handler = Arc::clone(&abort_flag);

        ctrlc::set_handler(move || {
            if abort_flag_handler.load(Ordering::SeqCst) {
                // Second Ctrl+C exits immediately
                std::process::exit(130);
            }
            println!("\n{}", "Received Ctrl+C, finishing current file...".yellow().bold());
            abort_flag_handler.store(true, Ordering::SeqCst);
        })
        .context("Failed to set Ctrl+C handler")?;

        let progress_bar = ProgressBar::new(files.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template(PROGRESS_BAR_TEMPLATE)
                .context("Failed to set progress bar template")?
                .progress_chars(PROGRESS_BAR_CHARS),
        );

        let verbose = self.config.verbose;
        let summary = execute(files, assignment, options, |progress| {
            if progress.status != "processing" {
                progress_bar.inc(1);
                if verbose {
                    progress_bar.println(progress.to_string());
                }
            }
            if abort_flag.load(Ordering::SeqCst) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        progress_bar.finish_and_clear();

        if abort_flag.load(Ordering::SeqCst) {
            println!("\n{}", "Aborted by user".bold().red());
        }
        for error in &summary.log_errors {
            print_warning!("Failed to write rename log: {error}");
        }
        Ok(summary)
    }

    fn print_suggestions(&self, filename: &str) -> Result<()> {
        let rules = self.load_rules()?;
        let top = suggestions(filename, &rules, self.config.top_n);
        if top.is_empty() {
            println!("{}", format!("No matching rules for: {filename}").yellow());
            return Ok(());
        }

        println!("{}", filename.bold());
        let options = self.rename_options();
        for (index, suggestion) in top.iter().enumerate() {
            let new_name = plan_rename(Path::new(filename), suggestion.rule, &options)
                .map_or_else(|error| error.to_string().red().to_string(), |planned| planned.new_name);
            let line = format!("{}. {suggestion}", index + 1);
            if index == 0 {
                println!("{}", line.green());
            } else {
                println!("{line}");
            }
            println!("   {new_name}");
            if self.config.verbose {
                println!("{}", suggestion.rule);
            }
        }
        Ok(())
    }

    fn restore(&self) -> Result<()> {
        let log = RenameLog::new(&self.log_directory()?);
        let entries = log.load()?;
        if entries.is_empty() {
            println!("No rename log found in {}", log.directory().display());
            return Ok(());
        }

        if self.config.dryrun {
            for entry in entries.iter().rev().filter(|entry| entry.status == RenameStatus::Success) {
                println!("{}", "Dryrun restore:".bold().cyan());
                media_rename::show_diff(&entry.new_name, &entry.old_name);
            }
            return Ok(());
        }

        let summary = log.restore_all()?;
        for detail in &summary.details {
            if detail.ok {
                println!("{}", "Restored:".bold().magenta());
                media_rename::show_diff(&detail.new_name, &detail.old_name);
            } else {
                print_error!("{} -> {}: {}", detail.new_name, detail.old_name, detail.reason);
            }
        }
        println!("\n{}", "--- Restore Summary ---".bold().magenta());
        println!("{summary}");
        Ok(())
    }

    fn show_log(&self, clear: bool) -> Result<()> {
        let log = RenameLog::new(&self.log_directory()?);
        if clear {
            if log.clear()? {
                println!("{}", format!("Deleted {}", log.path().display()).green());
            } else {
                println!("No rename log found in {}", log.directory().display());
            }
            return Ok(());
        }

        let entries = log.load()?;
        if entries.is_empty() {
            println!("No rename log found in {}", log.directory().display());
        }
        for entry in &entries {
            println!("{} {} -> {}", entry.status.colored(), entry.old_name, entry.new_name);
            if self.config.verbose {
                println!("  {entry}");
            }
        }
        Ok(())
    }

    fn manage_rules(&self, command: &RulesCommand) -> Result<()> {
        match command {
            RulesCommand::List => {
                let rules = self.load_rules()?;
                for rule in &rules {
                    println!("{rule}");
                    if self.config.verbose {
                        println!(
                            "  priority: {}, family: {}",
                            media_rename::rules::matcher::rule_priority(rule),
                            media_rename::rules::matcher::rule_family(rule)
                        );
                    }
                }
                println!("{} rule(s) from {}", rules.len(), self.store.dir().display());
            }
            RulesCommand::Init => {
                for path in self.store.create_default_rules()? {
                    println!("{}", format!("Created {}", path.display()).green());
                }
            }
            RulesCommand::Delete { name } => {
                if self.store.delete_rule(name)? {
                    println!("{}", format!("Deleted rule: {name}").green());
                } else {
                    print_warning!("Rule file not found: {}", self.store.rule_path(name).display());
                }
            }
        }
        Ok(())
    }

    fn manage_config(&self, command: &ConfigCommand) -> Result<()> {
        match command {
            ConfigCommand::Show => {
                match self.settings.path() {
                    Some(path) => println!("{}", path.display().to_string().bold()),
                    None => println!("{}", "No config file".bold()),
                }
                println!("{}", self.settings.to_toml_string()?);
                println!("{}", self.config);
            }
            ConfigCommand::Set { key, value } => {
                // Reload so that an unreadable config file is never overwritten with defaults
                let mut settings = Settings::load()?;
                settings.set_from_str(key, value)?;
                settings.save()?;
                let value = settings.get(key).map_or_else(String::new, ToString::to_string);
                println!("{key} = {}", value.green());
            }
        }
        Ok(())
    }

    /// Load rules from the rules directory, or the built-in rules if there are none.
    fn load_rules(&self) -> Result<Vec<Rule>> {
        let loaded = self.store.load_all()?;
        for (path, error) in &loaded.failures {
            print_warning!("Skipping rule file {}: {error:#}", path.display());
        }
        if loaded.rules.is_empty() {
            if self.config.verbose {
                println!("No rules in {}, using built-in rules", self.store.dir().display());
            }
            return compile_default_rules();
        }
        Ok(loaded.rules)
    }

    fn assignment<'a>(&self, rules: &'a [Rule]) -> Result<RuleAssignment<'a>> {
        match &self.config.rule_name {
            Some(name) => RuleAssignment::manual(rules, name),
            None => Ok(RuleAssignment::Auto(rules)),
        }
    }

    fn rename_options(&self) -> RenameOptions<'_> {
        RenameOptions {
            custom_title: self.config.custom_title.as_deref(),
            custom_season: self.config.custom_season.as_deref(),
            apply_folder_info: self.config.apply_folder_info,
            recognition: &self.config.recognition,
        }
    }

    fn gather_files(&self, root: &Path) -> Vec<PathBuf> {
        if root.is_file() {
            return if media_rename::rules::is_media_file(root) {
                vec![root.to_path_buf()]
            } else {
                Vec::new()
            };
        }
        scan_media_files(root, self.config.recurse)
    }

    fn log_directory(&self) -> Result<PathBuf> {
        let root = media_rename::resolve_input_path(self.path.as_deref())?;
        if root.is_file() {
            return root
                .parent()
                .map(Path::to_path_buf)
                .context("Failed to get parent directory");
        }
        Ok(root)
    }

    fn print_preview(&self, entries: &[PreviewEntry], root: &Path) {
        let max_items = entries.len();
        let max_chars = max_items.checked_ilog10().map_or(1, |d| d as usize + 1);
        let mut num_renamed: usize = 0;
        for (index, entry) in entries.iter().enumerate() {
            let number = format!("{:>max_chars$} / {max_items}", index + 1);
            let old_str = media_rename::get_relative_path_or_filename(&entry.path, root);
            if !entry.success {
                println!("{}", format!("Skip {number}: {old_str}").bold().yellow());
                println!("  {}", entry.match_info.red());
                continue;
            }

            let new_path = entry.path.with_file_name(&entry.new_name);
            let new_str = media_rename::get_relative_path_or_filename(&new_path, root);
            println!("{}", format!("Dryrun {number}:").bold().cyan());
            media_rename::show_diff(&old_str, &new_str);
            if entry.is_duplicate {
                print_warning!("  Duplicate target name");
            }
            if self.config.verbose {
                println!(
                    "  rule: {} ({:.1})",
                    entry.rule_name.as_deref().unwrap_or_default(),
                    entry.score
                );
                if !entry.folder_context.is_empty() {
                    println!("  folder: {}", entry.folder_context);
                }
            }
            if self.config.debug {
                println!("  {}", entry.match_info);
            }
            if entry.new_name != entry.original_name {
                num_renamed += 1;
            }
        }

        let duplicates = entries.iter().filter(|entry| entry.is_duplicate).count();
        println!("Dryrun: would have renamed {num_renamed} of {max_items} file(s)");
        if duplicates > 0 {
            print_warning!("{duplicates} file(s) share a target name");
        }
    }

    fn print_results(&self, summary: &BatchSummary, root: &Path) {
        for result in &summary.details {
            let old_str = media_rename::get_relative_path_or_filename(&result.path, root);
            match result.status {
                RenameStatus::Success => {
                    let new_str =
                        media_rename::get_relative_path_or_filename(&result.path.with_file_name(&result.new_name), root);
                    println!("{}", "Renamed:".bold().magenta());
                    media_rename::show_diff(&old_str, &new_str);
                }
                RenameStatus::Skipped if !self.config.verbose && is_quiet_skip(result) => {}
                RenameStatus::Skipped => println!("{}", format!("Skipped {old_str}: {}", result.reason).yellow()),
                RenameStatus::Failure => print_error!("{old_str}: {}", result.reason),
            }
        }
    }
}

/// Unchanged names and cancelled files are only listed in verbose mode.
fn is_quiet_skip(result: &FileResult) -> bool {
    result.reason == "name unchanged" || result.reason == "cancelled"
}

fn print_summary(summary: &BatchSummary) {
    println!("\n{}", "--- Rename Summary ---".bold().magenta());
    println!("Total:    {}", summary.total());
    println!("Renamed:  {}", summary.success.to_string().green());
    if summary.skipped > 0 {
        println!("Skipped:  {}", summary.skipped.to_string().yellow());
    }
    if summary.failure > 0 {
        println!("Failed:   {}", summary.failure.to_string().red());
    }
}

impl fmt::Display for MediaRename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {:?}", self.command)?;
        writeln!(
            f,
            "Path: {}",
            self.path
                .as_deref()
                .map_or_else(|| ".".to_string(), media_rename::path_to_string)
        )?;
        write!(f, "{}", self.config)
    }
}
