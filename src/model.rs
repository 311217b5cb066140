//! Value types flowing through the pipeline.
//! Analyzer and scanner produce them; the mover and journal consume them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::errors::FlattenError;

/// A directory `root` that contains a child directory with its own name.
///
/// `entries` are the names inside `root/child_name`, sorted byte-wise; that
/// order is the order the mover relocates them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestingCandidate {
    root: PathBuf,
    child_name: OsString,
    entries: Vec<OsString>,
}

impl NestingCandidate {
    pub(crate) fn new(root: PathBuf, child_name: OsString, mut entries: Vec<OsString>) -> Self {
        entries.sort();
        Self {
            root,
            child_name,
            entries,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn child_name(&self) -> &OsStr {
        &self.child_name
    }

    /// `root/child_name`, the directory being emptied.
    pub fn nested_path(&self) -> PathBuf {
        self.root.join(&self.child_name)
    }

    pub fn entries(&self) -> &[OsString] {
        &self.entries
    }

    /// Source and destination for every entry, in move order.
    pub fn planned_moves(&self) -> Vec<(PathBuf, PathBuf)> {
        let nested = self.nested_path();
        self.entries
            .iter()
            .map(|name| (nested.join(name), self.root.join(name)))
            .collect()
    }

    /// Number of path components; used for depth ordering.
    pub fn depth(&self) -> usize {
        self.root.components().count()
    }
}

/// An advisory finding about a symlink under the nested directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SymlinkRisk {
    pub path: PathBuf,
    pub reason: String,
}

impl SymlinkRisk {
    pub fn to_error(&self) -> FlattenError {
        FlattenError::SymlinkBreakRisk {
            path: self.path.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// A script or config file that mentions the nested path literally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PathWarning {
    pub file: PathBuf,
    pub literal: String,
}

/// Outcome of scanning one candidate. `safe` is derived, see [`ScanReport::safe`].
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub candidate: NestingCandidate,
    pub collisions: BTreeSet<OsString>,
    pub symlink_risks: BTreeSet<SymlinkRisk>,
    pub path_warnings: BTreeSet<PathWarning>,
    /// Paths that failed the write-access check; empty means permission is ok.
    pub permission_denied: Vec<PathBuf>,
}

impl ScanReport {
    pub fn permission_ok(&self) -> bool {
        self.permission_denied.is_empty()
    }

    pub fn safe(&self) -> bool {
        self.collisions.is_empty() && self.permission_ok()
    }

    /// True when any finding (blocking or advisory) was recorded.
    pub fn has_risks(&self) -> bool {
        !self.safe() || !self.symlink_risks.is_empty() || !self.path_warnings.is_empty()
    }

    /// The error that blocks this candidate, if any. Collisions win over permissions.
    pub fn blocking_error(&self) -> Option<FlattenError> {
        if let Some(name) = self.collisions.iter().next() {
            return Some(FlattenError::CollisionDetected {
                dest: self.candidate.root().join(name),
            });
        }
        self.permission_denied
            .first()
            .map(|path| FlattenError::PermissionDenied { path: path.clone() })
    }
}

/// How an entry got to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Rename,
    CopyVerifyDelete,
}

/// One completed (or, for dry runs, planned) relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
}

impl MoveRecord {
    pub fn completed(source: PathBuf, dest: PathBuf, strategy: Strategy, checksum: Option<String>) -> Self {
        Self {
            source,
            dest,
            strategy,
            checksum,
            timestamp: Utc::now(),
            simulated: false,
        }
    }

    pub fn planned(source: PathBuf, dest: PathBuf) -> Self {
        Self {
            source,
            dest,
            strategy: Strategy::Rename,
            checksum: None,
            timestamp: Utc::now(),
            simulated: true,
        }
    }
}

/// Mode and timestamps of a directory, captured before flattening changes it.
/// Used both for nested directories that get removed and for candidate roots
/// whose times the moves bump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedDir {
    pub path: PathBuf,
    pub mode: u32,
    pub atime: (i64, u32),
    pub mtime: (i64, u32),
}

/// Everything one `flatten`/`apply` invocation did (or would do).
#[derive(Debug, Default)]
pub struct MoveResult {
    pub records: Vec<MoveRecord>,
    pub removed_dirs: Vec<RemovedDir>,
    /// Candidate roots as they were before their first move.
    pub touched_dirs: Vec<RemovedDir>,
    pub skipped: Vec<PathBuf>,
    pub aborted: bool,
    pub abort_reason: Option<FlattenError>,
}

impl MoveResult {
    pub(crate) fn abort(&mut self, reason: FlattenError) {
        self.aborted = true;
        self.abort_reason = Some(reason);
    }

    /// Fold another candidate's result into this one, keeping order.
    /// A directory touched twice keeps its earliest snapshot.
    pub(crate) fn absorb(&mut self, other: MoveResult) {
        self.records.extend(other.records);
        self.removed_dirs.extend(other.removed_dirs);
        for dir in other.touched_dirs {
            if !self.touched_dirs.iter().any(|d| d.path == dir.path) {
                self.touched_dirs.push(dir);
            }
        }
        self.skipped.extend(other.skipped);
        if other.aborted {
            self.aborted = true;
            self.abort_reason = other.abort_reason;
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.records.iter().any(|r| r.simulated)
    }
}
