//! Flattening of a single candidate.
//!
//! Entries move one at a time in the candidate's order. A record is appended
//! only once its entry sits at the destination, so the result always describes
//! what actually happened, including on a mid-run abort.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::errors::{io_err, FlattenError, Result};
use crate::fs_ops::{relocate, snapshot_dir, CopyOptions, MoveBackend, OsBackend};
use crate::model::{MoveRecord, MoveResult, NestingCandidate, ScanReport};
use crate::shutdown;

/// Flatten `candidate` using real filesystem calls.
pub fn flatten(candidate: &NestingCandidate, report: &ScanReport, dry_run: bool) -> Result<MoveResult> {
    flatten_with(&OsBackend, candidate, report, dry_run, &CopyOptions::default())
}

/// Flatten through `backend`.
///
/// Returns `Err` only when nothing was touched (unsafe report, stale report,
/// unreadable nested directory). Once the first entry may have moved, failures
/// come back as `Ok` with `aborted` set, so the caller can journal the records.
pub fn flatten_with<B: MoveBackend + ?Sized>(
    backend: &B,
    candidate: &NestingCandidate,
    report: &ScanReport,
    dry_run: bool,
    opts: &CopyOptions,
) -> Result<MoveResult> {
    if report.candidate != *candidate {
        return Err(FlattenError::StaleReport {
            root: candidate.root().to_path_buf(),
        });
    }
    if let Some(err) = report.blocking_error() {
        warn!(root = %candidate.root().display(), code = err.code(), error = %err, "refusing to flatten");
        return Err(err);
    }
    for risk in &report.symlink_risks {
        let advisory = risk.to_error();
        warn!(code = advisory.code(), error = %advisory, "symlink may break");
    }
    for w in &report.path_warnings {
        warn!(file = %w.file.display(), literal = %w.literal, "file mentions the nested path");
    }

    let mut result = MoveResult::default();
    if dry_run {
        result.records = candidate
            .planned_moves()
            .into_iter()
            .map(|(src, dest)| MoveRecord::planned(src, dest))
            .collect();
        debug!(root = %candidate.root().display(), planned = result.records.len(), "dry run");
        return Ok(result);
    }

    let nested = candidate.nested_path();
    // Taken before any move so the times are the original ones.
    let snapshot = snapshot_dir(&nested).map_err(io_err("stat nested directory", &nested))?;
    let root_snapshot = snapshot_dir(candidate.root()).map_err(io_err("stat candidate root", candidate.root()))?;
    result.touched_dirs.push(root_snapshot);
    let mut skipped_names: Vec<OsString> = Vec::new();

    for (src, dest) in candidate.planned_moves() {
        if shutdown::is_requested() {
            warn!(root = %candidate.root().display(), moved = result.records.len(), "interrupted; stopping at entry boundary");
            result.abort(FlattenError::Interrupted);
            return Ok(result);
        }

        let meta = match fs::symlink_metadata(&src) {
            Ok(meta) => meta,
            Err(e) => {
                let err = FlattenError::io("stat entry", &src, e);
                error!(src = %src.display(), error = %err, "entry vanished before move");
                result.abort(err);
                return Ok(result);
            }
        };
        let ft = meta.file_type();
        if !(ft.is_file() || ft.is_dir() || ft.is_symlink()) {
            let err = FlattenError::UnsupportedEntryType { path: src.clone() };
            warn!(src = %src.display(), code = err.code(), "skipping entry");
            skip(&mut result, &mut skipped_names, src);
            continue;
        }

        match relocate(backend, &src, &dest, opts) {
            Ok(moved) => {
                info!(src = %src.display(), dest = %dest.display(), strategy = ?moved.strategy, "moved");
                result
                    .records
                    .push(MoveRecord::completed(src, dest, moved.strategy, moved.checksum));
                if let Some(err) = moved.cleanup_error {
                    result.abort(err);
                    return Ok(result);
                }
            }
            // Only the copy fallback refuses a directory holding a fifo, socket or device.
            Err(err @ FlattenError::UnsupportedEntryType { .. }) => {
                warn!(src = %src.display(), code = err.code(), error = %err, "skipping entry; it cannot be copied");
                skip(&mut result, &mut skipped_names, src);
            }
            Err(err) => {
                error!(src = %src.display(), dest = %dest.display(), code = err.code(), error = %err, "move failed; aborting run");
                result.abort(err);
                return Ok(result);
            }
        }
    }

    match remaining_names(&nested) {
        Ok(left) if left.is_empty() => match fs::remove_dir(&nested) {
            Ok(()) => {
                info!(path = %nested.display(), "removed nested directory");
                result.removed_dirs.push(snapshot);
            }
            Err(e) => result.abort(FlattenError::io("remove nested directory", &nested, e)),
        },
        Ok(left) if left.iter().all(|n| skipped_names.contains(n)) => {
            warn!(path = %nested.display(), skipped = left.len(), "nested directory kept; it still holds skipped entries");
        }
        Ok(left) => {
            error!(path = %nested.display(), unexpected = left.len(), "nested directory not empty after relocation");
            result.abort(FlattenError::NestedNotEmpty { path: nested });
        }
        Err(e) => result.abort(FlattenError::io("list nested directory", &nested, e)),
    }
    Ok(result)
}

fn skip(result: &mut MoveResult, skipped_names: &mut Vec<OsString>, src: PathBuf) {
    if let Some(name) = src.file_name() {
        skipped_names.push(name.to_os_string());
    }
    result.skipped.push(src);
}

fn remaining_names(dir: &Path) -> io::Result<Vec<OsString>> {
    fs::read_dir(dir)?
        .map(|e| e.map(|e| e.file_name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;
    use serial_test::{parallel, serial};
    use tempfile::tempdir;

    fn candidate(root: &Path) -> NestingCandidate {
        let root = fs::canonicalize(root).unwrap();
        let name = root.file_name().unwrap().to_os_string();
        let entries = fs::read_dir(root.join(&name))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        NestingCandidate::new(root, name, entries)
    }

    #[test]
    fn dry_run_plans_without_touching() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        fs::create_dir_all(a.join("a")).unwrap();
        fs::write(a.join("a/x"), b"x").unwrap();
        let c = candidate(&a);
        let r = flatten(&c, &scan(&c), true).unwrap();
        assert_eq!(r.records.len(), 1);
        assert!(r.is_dry_run());
        assert!(a.join("a/x").exists());
    }

    #[test]
    fn stale_report_is_rejected() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        fs::create_dir_all(a.join("a")).unwrap();
        let before = candidate(&a);
        let report = scan(&before);
        fs::write(a.join("a/new"), b"").unwrap();
        let after = candidate(&a);
        assert!(matches!(
            flatten(&after, &report, false),
            Err(FlattenError::StaleReport { .. })
        ));
    }

    #[test]
    #[serial]
    fn interrupt_stops_before_first_entry() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        fs::create_dir_all(a.join("a")).unwrap();
        fs::write(a.join("a/x"), b"x").unwrap();
        let c = candidate(&a);
        let report = scan(&c);
        shutdown::request();
        let r = flatten(&c, &report, false);
        shutdown::reset();
        let r = r.unwrap();
        assert!(r.aborted);
        assert!(matches!(r.abort_reason, Some(FlattenError::Interrupted)));
        assert!(r.records.is_empty());
        assert!(a.join("a/x").exists());
    }

    #[test]
    #[parallel]
    fn fifo_is_skipped_and_nested_dir_kept() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        fs::create_dir_all(a.join("a")).unwrap();
        fs::write(a.join("a/x"), b"x").unwrap();
        let fifo = std::ffi::CString::new(a.join("a/pipe").to_str().unwrap()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(fifo.as_ptr(), 0o644) }, 0);

        let c = candidate(&a);
        let r = flatten(&c, &scan(&c), false).unwrap();
        assert!(!r.aborted);
        assert_eq!(r.records.len(), 1);
        assert_eq!(r.skipped, vec![c.nested_path().join("pipe")]);
        assert!(r.removed_dirs.is_empty());
        assert!(a.join("x").exists());
        assert!(a.join("a/pipe").exists());
    }
}
