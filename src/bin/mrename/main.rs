mod config;
mod mrename;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::mrename::MediaRename;

#[derive(Parser)]
#[command(author, version, name = env!("CARGO_BIN_NAME"), about = "Rename video and subtitle files with regex rules")]
pub(crate) struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Optional input directory or file
    #[arg(value_hint = clap::ValueHint::AnyPath)]
    path: Option<PathBuf>,

    /// Use the named rule for every file instead of picking the best rule per file
    #[arg(short = 'u', long, value_name = "NAME", global = true)]
    rule: Option<String>,

    /// Custom series title
    #[arg(short = 't', long, global = true)]
    title: Option<String>,

    /// Custom season number
    #[arg(short = 's', long, global = true)]
    season: Option<String>,

    /// Use series and season from parent folder names in the new name
    #[arg(short = 'f', long, global = true)]
    folder: bool,

    /// Directory containing rule files
    #[arg(short = 'd', long, value_hint = clap::ValueHint::DirPath, global = true)]
    rules_dir: Option<PathBuf>,

    /// Enable debug prints
    #[arg(short = 'D', long, global = true)]
    debug: bool,

    /// Only print changes without renaming files
    #[arg(short = 'p', long, global = true)]
    print: bool,

    /// Recurse into subdirectories
    #[arg(short = 'r', long, global = true)]
    recurse: bool,

    /// Create shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,

    /// Print verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Show new names without renaming anything
    #[command(name = "preview")]
    Preview {
        /// Input directory or file
        #[arg(value_hint = clap::ValueHint::AnyPath)]
        path: Option<PathBuf>,
    },

    /// Rename files (default)
    #[command(name = "rename")]
    Rename {
        /// Input directory or file
        #[arg(value_hint = clap::ValueHint::AnyPath)]
        path: Option<PathBuf>,
    },

    /// Show the best matching rules for a filename
    #[command(name = "match")]
    Match {
        /// Filename to match
        filename: String,

        /// Number of suggestions to show
        #[arg(short = 'n', long)]
        top: Option<usize>,
    },

    /// Rename files back to their original names using the rename log
    #[command(name = "restore")]
    Restore {
        /// Directory containing the rename log
        #[arg(value_hint = clap::ValueHint::DirPath)]
        path: Option<PathBuf>,
    },

    /// Show or clear the rename log
    #[command(name = "log")]
    Log {
        /// Directory containing the rename log
        #[arg(value_hint = clap::ValueHint::DirPath)]
        path: Option<PathBuf>,

        /// Delete the rename log
        #[arg(short = 'c', long)]
        clear: bool,
    },

    /// Manage rule files
    #[command(name = "rules", subcommand)]
    Rules(RulesCommand),

    /// Show or change the user config
    #[command(name = "config", subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum RulesCommand {
    /// List loaded rules
    List,
    /// Write the built-in rules to the rules directory
    Init,
    /// Delete a rule file
    Delete {
        /// Rule name
        name: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum ConfigCommand {
    /// Print the current settings
    Show,
    /// Set a value, for example `parent_folder_recognition.enabled false`
    Set {
        /// Dotted key path under the [mrename] section
        key: String,
        /// New value, parsed as TOML if possible
        value: String,
    },
}

impl Args {
    /// Apply the subcommand path to the main args.
    fn apply_subcommand(&mut self) {
        match &self.command {
            Some(
                Command::Preview { path } | Command::Rename { path } | Command::Restore { path } | Command::Log { path, .. },
            ) => {
                if path.is_some() {
                    self.path.clone_from(path);
                }
                if matches!(self.command, Some(Command::Preview { .. })) {
                    self.print = true;
                }
            }
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    let mut args = Args::parse();
    if let Some(ref shell) = args.completion {
        media_rename::generate_shell_completion(*shell, Args::command(), true, env!("CARGO_BIN_NAME"))
    } else {
        args.apply_subcommand();
        MediaRename::run_with_args(args)
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn parses_default_rename() {
        let args = Args::try_parse_from(["mrename", "media", "-p", "-r"]).expect("should parse");
        assert!(args.command.is_none());
        assert_eq!(args.path, Some(PathBuf::from("media")));
        assert!(args.print);
        assert!(args.recurse);
    }

    #[test]
    fn preview_subcommand_sets_path_and_dryrun() {
        let mut args = Args::try_parse_from(["mrename", "preview", "shows", "--title", "Show"]).expect("should parse");
        args.apply_subcommand();
        assert_eq!(args.path, Some(PathBuf::from("shows")));
        assert_eq!(args.title.as_deref(), Some("Show"));
        assert!(args.print);
    }

    #[test]
    fn match_subcommand() {
        let args = Args::try_parse_from(["mrename", "match", "[Group] 01 Pilot.mkv", "-n", "5"]).expect("should parse");
        match args.command {
            Some(Command::Match { filename, top }) => {
                assert_eq!(filename, "[Group] 01 Pilot.mkv");
                assert_eq!(top, Some(5));
            }
            other => panic!("Unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_set_subcommand() {
        let args = Args::try_parse_from(["mrename", "config", "set", "top_n", "5"]).expect("should parse");
        assert!(matches!(
            args.command,
            Some(Command::Config(ConfigCommand::Set { ref key, ref value })) if key == "top_n" && value == "5"
        ));
    }

    #[test]
    fn rules_delete_subcommand() {
        let args = Args::try_parse_from(["mrename", "rules", "delete", "Movie"]).expect("should parse");
        assert!(matches!(
            args.command,
            Some(Command::Rules(RulesCommand::Delete { ref name })) if name == "Movie"
        ));
    }
}
