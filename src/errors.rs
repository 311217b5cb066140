//! Typed error definitions for fs_cleaner.
//! Every failure carries the path(s) involved so a caller can reconstruct what was attempted.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::MoveRecord;

/// Shared `Result` alias for the library.
pub type Result<T> = std::result::Result<T, FlattenError>;

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("I/O failure: {context} '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("collision: '{}' already exists at the destination", dest.display())]
    CollisionDetected { dest: PathBuf },

    #[error("symlink may break after flattening: '{}' ({reason})", path.display())]
    SymlinkBreakRisk { path: PathBuf, reason: String },

    #[error("permission denied: no write access to '{}'", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("checksum mismatch copying '{}' -> '{}'; source left untouched", origin.display(), dest.display())]
    CrossDeviceChecksumMismatch { origin: PathBuf, dest: PathBuf },

    #[error("journal is corrupt: '{}': {details}", path.display())]
    JournalCorrupt { path: PathBuf, details: String },

    #[error("rollback incomplete: {} record(s) still outstanding: {cause}", remaining.len())]
    RollbackIncomplete {
        remaining: Vec<MoveRecord>,
        cause: String,
    },

    #[error("unsupported entry type (not a file, directory or symlink): '{}'", path.display())]
    UnsupportedEntryType { path: PathBuf },

    #[error("nested directory '{}' is not empty after relocation; stopping", path.display())]
    NestedNotEmpty { path: PathBuf },

    #[error("not a directory: '{}'", path.display())]
    NotADirectory { path: PathBuf },

    #[error("invalid ignore pattern {pattern:?}: {details}")]
    InvalidIgnorePattern { pattern: String, details: String },

    #[error("scan report does not belong to candidate '{}'; rescan before flattening", root.display())]
    StaleReport { root: PathBuf },

    #[error("cannot render report: {details}")]
    Render { details: String },

    #[error("operation interrupted by user")]
    Interrupted,
}

impl FlattenError {
    /// Stable machine-readable code, used in structured logs and JSON reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io_failure",
            Self::CollisionDetected { .. } => "collision",
            Self::SymlinkBreakRisk { .. } => "symlink_risk",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::CrossDeviceChecksumMismatch { .. } => "checksum_mismatch",
            Self::JournalCorrupt { .. } => "journal_corrupt",
            Self::RollbackIncomplete { .. } => "rollback_incomplete",
            Self::UnsupportedEntryType { .. } => "unsupported_entry",
            Self::NestedNotEmpty { .. } => "nested_not_empty",
            Self::NotADirectory { .. } => "not_a_directory",
            Self::InvalidIgnorePattern { .. } => "invalid_ignore_pattern",
            Self::StaleReport { .. } => "stale_report",
            Self::Render { .. } => "render_failed",
            Self::Interrupted => "interrupted",
        }
    }

    /// Process exit code for the CLI.
    ///
    /// `2` covers every aborted apply, `3` an unfinished rollback; anything
    /// that never reached a mutation exits `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CollisionDetected { .. }
            | Self::PermissionDenied { .. }
            | Self::CrossDeviceChecksumMismatch { .. }
            | Self::NestedNotEmpty { .. }
            | Self::Interrupted => 2,
            Self::RollbackIncomplete { .. } | Self::JournalCorrupt { .. } => 3,
            _ => 1,
        }
    }

    /// Build an `Io` variant; the hint derived from the OS error code is folded into `context`.
    pub fn io(op: &str, path: &Path, source: io::Error) -> Self {
        let context = match crate::fs_ops::io_hint(&source) {
            Some(hint) => format!("{op} ({hint})"),
            None => op.to_string(),
        };
        Self::Io {
            path: path.to_path_buf(),
            context,
            source,
        }
    }
}

/// Adapter for `.map_err(...)`: wraps an `io::Error` with the operation and path.
pub(crate) fn io_err<'a>(op: &'a str, path: &'a Path) -> impl FnOnce(io::Error) -> FlattenError + 'a {
    move |e| FlattenError::io(op, path, e)
}
