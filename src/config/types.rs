//! Core configuration types.
//! - Config holds runtime settings with defaults that work without any file.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::fs_ops::CopyOptions;
use crate::ignore::DEFAULT_IGNORE_FILE;
use crate::pipeline::PipelineOptions;
use crate::scanner::{ScanOptions, DEFAULT_MAX_SCAN_BYTES, DEFAULT_SCRIPT_EXTENSIONS};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Warnings and errors (default)
    #[default]
    Normal,
    /// Every move and decision
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common names (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" | "warn" => Some(LogLevel::Normal),
            "info" | "verbose" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        })
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    /// Optional log file; stderr logging stays on regardless.
    pub log_file: Option<PathBuf>,
    /// Name of the ignore file looked up in each target root.
    pub ignore_file: String,
    /// Extensions treated as scripts/config by the hardcoded-path scan.
    pub script_extensions: Vec<String>,
    /// Per-file read cap for the hardcoded-path scan.
    pub max_scan_bytes: u64,
    /// Copy fallback keeps uid/gid (best-effort, on by default).
    pub preserve_ownership: bool,
    /// Read-only scan workers; 0 = one per CPU.
    pub scan_threads: usize,
    /// Always copy + verify + delete instead of renaming.
    pub force_copy: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Normal,
            log_file: None,
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
            script_extensions: DEFAULT_SCRIPT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_scan_bytes: DEFAULT_MAX_SCAN_BYTES,
            preserve_ownership: true,
            scan_threads: 0,
            force_copy: false,
        }
    }
}

impl Config {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            ignore_file: self.ignore_file.clone(),
            scan: ScanOptions {
                script_extensions: self.script_extensions.clone(),
                max_scan_bytes: self.max_scan_bytes,
            },
            copy: CopyOptions {
                preserve_ownership: self.preserve_ownership,
                force_copy: self.force_copy,
            },
            scan_threads: self.scan_threads,
        }
    }
}
