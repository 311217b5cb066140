//! Whole-tree operations: analyze, apply, rollback, history.
//!
//! `apply` runs in two phases. A preflight pass looks at every candidate as it
//! will be when its turn comes (deeper levels flattened first), and refuses the
//! whole run on any collision or permission failure. Then candidates are
//! flattened deepest-first, each one re-read and re-scanned just before it moves.

use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analyzer::detect_nesting;
use crate::errors::{io_err, FlattenError, Result};
use crate::fs_ops::{occupied, CopyOptions, MoveBackend, OsBackend};
use crate::ignore::{IgnoreSet, DEFAULT_IGNORE_FILE};
use crate::journal::{Journal, JournalStore, RollbackOutcome};
use crate::model::{MoveRecord, MoveResult, NestingCandidate, ScanReport};
use crate::mover::flatten_with;
use crate::scanner::{scan_with, ScanOptions};

/// Everything the pipeline needs besides the target path.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub ignore_file: String,
    pub scan: ScanOptions,
    pub copy: CopyOptions,
    /// Worker threads for read-only scanning; `0` lets rayon decide.
    pub scan_threads: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
            scan: ScanOptions::default(),
            copy: CopyOptions::default(),
            scan_threads: 0,
        }
    }
}

/// Read-only view of a target tree.
#[derive(Debug)]
pub struct Analysis {
    pub root: PathBuf,
    /// Candidates in depth-then-path order, ignore file already applied.
    pub candidates: Vec<NestingCandidate>,
    /// One report per candidate, same order.
    pub reports: Vec<ScanReport>,
    /// `X/X` pairs where the inner `X` is a symlink to a directory.
    pub symlinked_nests: Vec<PathBuf>,
    pub ignored: Vec<PathBuf>,
    pub unreadable: Vec<PathBuf>,
}

impl Analysis {
    pub fn has_risks(&self) -> bool {
        !self.symlinked_nests.is_empty() || self.reports.iter().any(ScanReport::has_risks)
    }
}

pub fn analyze(path: &Path, opts: &PipelineOptions) -> Result<Analysis> {
    let scan = detect_nesting(path)?;
    let root = scan.root().to_path_buf();
    let ignore = IgnoreSet::load(&root, &opts.ignore_file)?;

    let mut walk = scan.iter();
    let mut candidates = Vec::new();
    let mut ignored = Vec::new();
    for candidate in walk.by_ref() {
        if ignore.excludes(&root, &candidate) {
            ignored.push(candidate.root().to_path_buf());
        } else {
            candidates.push(candidate);
        }
    }
    let reports = scan_all(&candidates, opts);
    info!(
        root = %root.display(),
        candidates = candidates.len(),
        ignored = ignored.len(),
        "analysis complete"
    );
    Ok(Analysis {
        root,
        candidates,
        reports,
        symlinked_nests: walk.symlinked_nests().to_vec(),
        ignored,
        unreadable: walk.unreadable().to_vec(),
    })
}

fn scan_all(candidates: &[NestingCandidate], opts: &PipelineOptions) -> Vec<ScanReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.scan_threads)
        .thread_name(|i| format!("fs-cleaner-scan-{i}"))
        .build();
    match pool {
        Ok(pool) => pool.install(|| candidates.par_iter().map(|c| scan_with(c, &opts.scan)).collect()),
        Err(e) => {
            warn!(error = %e, "scan pool unavailable; scanning sequentially");
            candidates.iter().map(|c| scan_with(c, &opts.scan)).collect()
        }
    }
}

/// Candidates as they will look when flattened, deepest first.
///
/// A candidate's self-named entry is vacated when a deeper candidate empties
/// it, and names flattened into its nested directory from below arrive before
/// it runs. Fails with the first blocking finding.
fn preflight(analysis: &Analysis) -> Result<Vec<NestingCandidate>> {
    let roots: BTreeSet<&Path> = analysis.candidates.iter().map(|c| c.root()).collect();
    let mut arriving: HashMap<PathBuf, Vec<OsString>> = HashMap::new();
    let mut plan = Vec::with_capacity(analysis.candidates.len());

    for (candidate, report) in analysis.candidates.iter().zip(&analysis.reports).rev() {
        if let Some(path) = report.permission_denied.first() {
            return Err(FlattenError::PermissionDenied { path: path.clone() });
        }

        let nested = candidate.nested_path();
        let vacated = roots.contains(nested.as_path());
        let mut entries: Vec<OsString> = Vec::new();
        for name in candidate.entries() {
            if vacated && name.as_os_str() == candidate.child_name() {
                continue;
            }
            if report.collisions.contains(name) {
                return Err(FlattenError::CollisionDetected {
                    dest: candidate.root().join(name),
                });
            }
            entries.push(name.clone());
        }
        for name in arriving.remove(&nested).unwrap_or_default() {
            if entries.contains(&name) {
                continue;
            }
            let dest = candidate.root().join(&name);
            if name.as_os_str() == candidate.child_name() || occupied(&dest) {
                return Err(FlattenError::CollisionDetected { dest });
            }
            entries.push(name);
        }

        let effective = NestingCandidate::new(candidate.root().to_path_buf(), candidate.child_name().to_os_string(), entries);
        arriving.insert(candidate.root().to_path_buf(), effective.entries().to_vec());
        plan.push(effective);
    }
    Ok(plan)
}

/// Flatten every candidate under `path`. Real runs are journaled.
pub fn apply(path: &Path, dry_run: bool, opts: &PipelineOptions) -> Result<MoveResult> {
    if dry_run {
        return plan(path, opts);
    }
    let root = fs::canonicalize(path).map_err(io_err("resolve target root", path))?;
    let mut store = JournalStore::open(&root)?;
    apply_with(&OsBackend, &mut store, opts)
}

/// What a real apply would do, without touching anything.
pub fn plan(path: &Path, opts: &PipelineOptions) -> Result<MoveResult> {
    let analysis = analyze(path, opts)?;
    plan_for(&analysis)
}

pub fn plan_for(analysis: &Analysis) -> Result<MoveResult> {
    let mut result = MoveResult::default();
    for candidate in preflight(analysis)? {
        result.records.extend(
            candidate
                .planned_moves()
                .into_iter()
                .map(|(src, dest)| MoveRecord::planned(src, dest)),
        );
    }
    Ok(result)
}

/// Real apply against an already-open store.
pub fn apply_with<B: MoveBackend + ?Sized>(
    backend: &B,
    store: &mut JournalStore,
    opts: &PipelineOptions,
) -> Result<MoveResult> {
    let analysis = analyze(store.root(), opts)?;
    for nest in &analysis.symlinked_nests {
        warn!(path = %nest.display(), "symlinked nest left untouched");
    }
    let ordered = preflight(&analysis)?;

    let mut total = MoveResult::default();
    for planned in ordered {
        let Some(current) = reread(&planned)? else {
            debug!(root = %planned.root().display(), "nested directory gone; skipping");
            continue;
        };
        let report = scan_with(&current, &opts.scan);
        match flatten_with(backend, &current, &report, false, &opts.copy) {
            Ok(result) => {
                let stop = result.aborted;
                total.absorb(result);
                if stop {
                    break;
                }
            }
            Err(err) => {
                total.abort(err);
                break;
            }
        }
    }

    if let Some(reason) = &total.abort_reason {
        warn!(root = %store.root().display(), moved = total.records.len(), code = reason.code(), "apply aborted");
    }
    store.save(&total)?;
    Ok(total)
}

/// The candidate as it is on disk right now, or `None` if its nested directory is gone.
fn reread(candidate: &NestingCandidate) -> Result<Option<NestingCandidate>> {
    let nested = candidate.nested_path();
    if !fs::symlink_metadata(&nested).is_ok_and(|m| m.is_dir()) {
        return Ok(None);
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(&nested).map_err(io_err("list nested directory", &nested))? {
        entries.push(entry.map_err(io_err("list nested directory", &nested))?.file_name());
    }
    Ok(Some(NestingCandidate::new(
        candidate.root().to_path_buf(),
        candidate.child_name().to_os_string(),
        entries,
    )))
}

pub fn rollback(path: &Path) -> Result<RollbackOutcome> {
    rollback_with(&OsBackend, path, &PipelineOptions::default())
}

pub fn rollback_with<B: MoveBackend + ?Sized>(
    backend: &B,
    path: &Path,
    opts: &PipelineOptions,
) -> Result<RollbackOutcome> {
    let root = fs::canonicalize(path).map_err(io_err("resolve target root", path))?;
    JournalStore::open(&root)?.rollback_with(backend, &opts.copy)
}

/// Journal contents for `path`, read without locking.
pub fn history(path: &Path) -> Result<Journal> {
    let root = fs::canonicalize(path).map_err(io_err("resolve target root", path))?;
    crate::journal::load(&root)
}
