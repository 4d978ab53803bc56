use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};

use media_rename::colorize_bool;
use media_rename::rules::settings::DEFAULT_TOP_N;
use media_rename::rules::{RecognitionConfig, Settings};

use crate::Args;

/// Final config created from CLI arguments and user config file.
#[derive(Debug)]
pub struct Config {
    pub(crate) apply_folder_info: bool,
    pub(crate) custom_season: Option<String>,
    pub(crate) custom_title: Option<String>,
    pub(crate) debug: bool,
    pub(crate) dryrun: bool,
    pub(crate) recognition: RecognitionConfig,
    pub(crate) recurse: bool,
    pub(crate) rule_name: Option<String>,
    pub(crate) rules_dir: PathBuf,
    pub(crate) top_n: usize,
    pub(crate) verbose: bool,
}

impl Config {
    /// Create config from given command line args and user settings.
    pub fn from_args(args: &Args, settings: &Settings) -> Result<Self> {
        let user_config = settings.user_config()?;
        let recognition = settings.recognition()?;

        let rules_dir = args
            .rules_dir
            .clone()
            .or(user_config.rules_dir)
            .or_else(|| media_rename::config::RULES_DIR.clone())
            .context("Failed to determine rules directory")?;

        let top_n = match &args.command {
            Some(crate::Command::Match { top: Some(top), .. }) => *top,
            _ => user_config.top_n.unwrap_or(DEFAULT_TOP_N),
        };

        Ok(Self {
            apply_folder_info: args.folder,
            custom_season: non_empty(args.season.as_deref()),
            custom_title: non_empty(args.title.as_deref()),
            debug: args.debug || user_config.debug,
            dryrun: args.print || user_config.dryrun,
            recognition,
            recurse: args.recurse || user_config.recurse,
            rule_name: non_empty(args.rule.as_deref()),
            rules_dir,
            top_n: top_n.max(1),
            verbose: args.verbose || user_config.verbose,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(ToString::to_string)
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Config:")?;
        writeln!(f, "  debug:        {}", colorize_bool(self.debug))?;
        writeln!(f, "  dryrun:       {}", colorize_bool(self.dryrun))?;
        writeln!(f, "  recurse:      {}", colorize_bool(self.recurse))?;
        writeln!(f, "  verbose:      {}", colorize_bool(self.verbose))?;
        writeln!(f, "  folder info:  {}", colorize_bool(self.apply_folder_info))?;
        writeln!(f, "  rule:         \"{}\"", self.rule_name.as_deref().unwrap_or_default())?;
        writeln!(f, "  title:        \"{}\"", self.custom_title.as_deref().unwrap_or_default())?;
        writeln!(f, "  season:       \"{}\"", self.custom_season.as_deref().unwrap_or_default())?;
        writeln!(f, "  rules dir:    {}", self.rules_dir.display())?;
        writeln!(f, "  top n:        {}", self.top_n)?;
        writeln!(f, "Folder recognition:")?;
        write!(f, "{}", self.recognition)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    use clap::Parser;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).expect("should parse")
    }

    #[test]
    fn cli_flags_override_user_config() {
        let settings = Settings::from_toml_str(
            r#"
            [mrename]
            rules_dir = "/config/rules"
            top_n = 7
            "#,
        )
        .expect("valid config");
        let config = Config::from_args(&parse(&["mrename", "-p", "-v", "--rules-dir", "/cli/rules"]), &settings)
            .expect("config");
        assert!(config.dryrun);
        assert!(config.verbose);
        assert!(!config.recurse);
        assert_eq!(config.rules_dir, PathBuf::from("/cli/rules"));
        assert_eq!(config.top_n, 7);
    }

    #[test]
    fn user_config_enables_flags() {
        let settings = Settings::from_toml_str(
            r#"
            [mrename]
            recurse = true
            dryrun = true
            rules_dir = "/config/rules"

            [mrename.parent_folder_recognition]
            enable_custom_season = false
            "#,
        )
        .expect("valid config");
        let config = Config::from_args(&parse(&["mrename"]), &settings).expect("config");
        assert!(config.recurse);
        assert!(config.dryrun);
        assert_eq!(config.rules_dir, PathBuf::from("/config/rules"));
        assert!(!config.recognition.enable_custom_season);
        assert_eq!(config.top_n, DEFAULT_TOP_N);
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let settings = Settings::default();
        let config = Config::from_args(
            &parse(&["mrename", "--title", "  ", "--season", "2", "--rules-dir", "/rules"]),
            &settings,
        )
        .expect("config");
        assert!(config.custom_title.is_none());
        assert_eq!(config.custom_season.as_deref(), Some("2"));
    }

    #[test]
    fn match_top_overrides_config() {
        let settings = Settings::default();
        let config = Config::from_args(
            &parse(&["mrename", "match", "file.mkv", "-n", "10", "--rules-dir", "/rules"]),
            &settings,
        )
        .expect("config");
        assert_eq!(config.top_n, 10);
    }
}
