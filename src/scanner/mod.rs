//! Read-only risk scan of one nesting candidate.
//!
//! All four checks always run; a blocking finding never hides an advisory one.
//! Nothing here writes to the filesystem.

mod hardcoded;
mod symlinks;

pub use hardcoded::DEFAULT_SCRIPT_EXTENSIONS;
pub use symlinks::normalize_lexically;

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::fs_ops::file_identity;
use crate::model::{NestingCandidate, ScanReport};
use crate::platform::has_write_access;

/// Default per-file read cap for the hardcoded-path scan.
pub const DEFAULT_MAX_SCAN_BYTES: u64 = 256 * 1024;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lower-case extensions (without the dot) treated as scripts or config.
    pub script_extensions: Vec<String>,
    pub max_scan_bytes: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            script_extensions: DEFAULT_SCRIPT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_scan_bytes: DEFAULT_MAX_SCAN_BYTES,
        }
    }
}

/// Scan with default options.
pub fn scan(candidate: &NestingCandidate) -> ScanReport {
    scan_with(candidate, &ScanOptions::default())
}

pub fn scan_with(candidate: &NestingCandidate, opts: &ScanOptions) -> ScanReport {
    let report = ScanReport {
        candidate: candidate.clone(),
        collisions: detect_collisions(candidate),
        symlink_risks: symlinks::detect(candidate),
        path_warnings: hardcoded::detect(candidate, opts),
        permission_denied: check_permissions(candidate),
    };
    debug!(
        root = %candidate.root().display(),
        collisions = report.collisions.len(),
        symlink_risks = report.symlink_risks.len(),
        path_warnings = report.path_warnings.len(),
        permission_ok = report.permission_ok(),
        "scanned candidate"
    );
    report
}

/// Names whose destination `root/name` is occupied by a different inode.
///
/// The self-named entry (`X/X/X`) counts: its destination is the nested
/// directory itself. Callers that flatten a deeper level first account for that.
fn detect_collisions(candidate: &NestingCandidate) -> BTreeSet<OsString> {
    let nested = candidate.nested_path();
    let mut out = BTreeSet::new();
    for name in candidate.entries() {
        let dest = candidate.root().join(name);
        let dest_id = match file_identity(&dest) {
            Ok(id) => id,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(dest = %dest.display(), error = %e, "cannot stat destination; treating as collision");
                out.insert(name.clone());
                continue;
            }
        };
        let same = file_identity(&nested.join(name)).is_ok_and(|src| src == dest_id);
        if !same {
            out.insert(name.clone());
        }
    }
    out
}

/// Directories where `access(W_OK|X_OK)` fails: the root, the nested
/// directory, and any directory entry being moved (renaming a directory to a
/// new parent rewrites its `..` link).
fn check_permissions(candidate: &NestingCandidate) -> Vec<PathBuf> {
    let nested = candidate.nested_path();
    let mut dirs = vec![candidate.root().to_path_buf(), nested.clone()];
    for name in candidate.entries() {
        let p = nested.join(name);
        if fs::symlink_metadata(&p).is_ok_and(|m| m.is_dir()) {
            dirs.push(p);
        }
    }
    dirs.into_iter().filter(|d| !has_write_access(d)).collect()
}
