//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - `-v` is a shorthand for `--log-level info`, `-vv` for `--log-level debug`.
//! - Global flags may appear before or after the subcommand.

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::config::{Config, LogLevel};

/// Flatten self-nested directories (`X/X/...`) safely, with a rollback journal.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Flatten self-nested directories safely")]
pub struct Args {
    /// Raise verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Read configuration from this file instead of the default location.
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print the config file location and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Write a commented config template and exit.
    #[arg(long)]
    pub init_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List nesting candidates, planned moves and every risk found. Read-only.
    Analyze {
        #[arg(value_hint = ValueHint::DirPath)]
        path: PathBuf,
    },
    /// Flatten every candidate under PATH and journal the moves.
    Apply {
        #[arg(value_hint = ValueHint::DirPath)]
        path: PathBuf,
        /// Plan the moves without touching the filesystem.
        #[arg(long)]
        dry_run: bool,
    },
    /// Reverse the latest journaled run under PATH.
    Rollback {
        #[arg(value_hint = ValueHint::DirPath)]
        path: PathBuf,
    },
    /// Render the analysis as text or JSON.
    Report {
        #[arg(value_hint = ValueHint::DirPath)]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List the journaled runs under PATH.
    History {
        #[arg(value_hint = ValueHint::DirPath)]
        path: PathBuf,
    },
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: -v/-vv > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        match self.verbose {
            0 => self.log_level.as_deref().and_then(LogLevel::parse),
            1 => Some(LogLevel::Info),
            _ => Some(LogLevel::Debug),
        }
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(file) = &self.log_file {
            cfg.log_file = Some(file.clone());
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::parse_from(["fs-cleaner", "apply", "/t", "--dry-run", "-vv"]);
        assert_eq!(
            args.command,
            Some(Command::Apply {
                path: PathBuf::from("/t"),
                dry_run: true
            })
        );
        assert_eq!(args.effective_log_level(), Some(LogLevel::Debug));
    }

    #[test]
    fn unknown_log_level_is_ignored() {
        let args = Args::parse_from(["fs-cleaner", "--log-level", "loud", "history", "/t"]);
        assert_eq!(args.effective_log_level(), None);
    }
}
