//! Per-target rollback journal.
//!
//! `.fs-cleaner-journal.json` at the target root holds every run that mutated
//! the tree. Writers hold a [`JournalStore`], which owns the exclusive lock for
//! that root; each change is persisted with an atomic rewrite. Rollback pops
//! records one at a time and persists after each, so an interrupted rollback
//! resumes where it stopped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::{io_err, FlattenError, Result};
use crate::fs_ops::{
    acquire_journal_lock, relocate, restore_dir, try_acquire_journal_lock, CopyOptions, JournalLock,
    MoveBackend, OsBackend,
};
use crate::model::{MoveRecord, MoveResult, RemovedDir, Strategy};
use crate::platform::atomic_write_0600;
use crate::shutdown;

pub const JOURNAL_FILE_NAME: &str = ".fs-cleaner-journal.json";

pub fn journal_path(root: &Path) -> PathBuf {
    root.join(JOURNAL_FILE_NAME)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub runs: Vec<JournalRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRun {
    pub timestamp: DateTime<Utc>,
    pub records: Vec<MoveRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_dirs: Vec<RemovedDir>,
    /// Candidate roots whose times are put back once the run is reversed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub touched_dirs: Vec<RemovedDir>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<PathBuf>,
}

/// What a rollback call achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The journal had no runs.
    NothingToDo,
    /// The latest run was fully reversed; carries the number of records undone.
    RolledBack { reversed: usize, run: DateTime<Utc> },
}

/// Locked handle on one target root's journal.
#[derive(Debug)]
pub struct JournalStore {
    root: PathBuf,
    path: PathBuf,
    _lock: JournalLock,
}

impl JournalStore {
    /// Open the store for `root`, waiting for any other holder to finish.
    pub fn open(root: &Path) -> Result<Self> {
        let lock = acquire_journal_lock(root).map_err(io_err("lock journal", root))?;
        Ok(Self::with_lock(root, lock))
    }

    /// Like [`JournalStore::open`], but `Ok(None)` when another process holds the lock.
    pub fn try_open(root: &Path) -> Result<Option<Self>> {
        let lock = try_acquire_journal_lock(root).map_err(io_err("lock journal", root))?;
        Ok(lock.map(|lock| Self::with_lock(root, lock)))
    }

    fn with_lock(root: &Path, lock: JournalLock) -> Self {
        debug!(root = %root.display(), "journal store opened");
        Self {
            root: root.to_path_buf(),
            path: journal_path(root),
            _lock: lock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the journal. A missing file is an empty journal.
    pub fn load(&self) -> Result<Journal> {
        read_journal(&self.path)
    }

    /// Append `result` as a new run. Planned (dry-run) records and empty
    /// results are not journaled; returns whether a run was written.
    pub fn save(&mut self, result: &MoveResult) -> Result<bool> {
        let records: Vec<MoveRecord> = result.records.iter().filter(|r| !r.simulated).cloned().collect();
        if records.is_empty() && result.removed_dirs.is_empty() {
            debug!(root = %self.root.display(), "nothing to journal");
            return Ok(false);
        }
        let mut journal = self.load()?;
        journal.runs.push(JournalRun {
            timestamp: Utc::now(),
            records,
            removed_dirs: result.removed_dirs.clone(),
            touched_dirs: result.touched_dirs.clone(),
            skipped: result.skipped.clone(),
        });
        self.persist(&journal)?;
        info!(path = %self.path.display(), runs = journal.runs.len(), "journal saved");
        Ok(true)
    }

    /// Reverse the most recent run, newest record first.
    pub fn rollback(&mut self) -> Result<RollbackOutcome> {
        self.rollback_with(&OsBackend, &CopyOptions::default())
    }

    pub fn rollback_with<B: MoveBackend + ?Sized>(
        &mut self,
        backend: &B,
        opts: &CopyOptions,
    ) -> Result<RollbackOutcome> {
        let mut journal = self.load()?;
        let Some(idx) = journal.runs.len().checked_sub(1) else {
            info!(root = %self.root.display(), "no runs to roll back");
            return Ok(RollbackOutcome::NothingToDo);
        };
        let run_ts = journal.runs[idx].timestamp;
        let mut reversed = 0usize;

        while let Some(record) = journal.runs[idx].records.last().cloned() {
            if shutdown::is_requested() {
                return Err(self.incomplete(&journal.runs[idx], "interrupted".to_string()));
            }
            if let Err(e) = reverse(backend, &record, opts) {
                warn!(src = %record.dest.display(), dest = %record.source.display(), code = e.code(), error = %e, "rollback stopped");
                return Err(self.incomplete(&journal.runs[idx], e.to_string()));
            }
            journal.runs[idx].records.pop();
            self.persist(&journal)?;
            reversed += 1;
        }

        // Every entry is back; restore the removed directories' own metadata,
        // inner levels last so outer mtimes are not bumped afterwards.
        for dir in journal.runs[idx].removed_dirs.iter().rev() {
            if let Err(e) = fs::create_dir_all(&dir.path) {
                return Err(self.incomplete(&journal.runs[idx], format!("recreate '{}': {e}", dir.path.display())));
            }
            if let Err(e) = restore_dir(dir) {
                warn!(path = %dir.path.display(), error = %e, "could not restore directory metadata");
            }
        }
        let run = journal.runs.remove(idx);
        self.persist(&journal)?;
        // Last, because removing the journal file bumps the target root.
        for dir in run.touched_dirs.iter().rev() {
            if let Err(e) = restore_dir(dir) {
                warn!(path = %dir.path.display(), error = %e, "could not restore directory times");
            }
        }
        info!(root = %self.root.display(), reversed, "rollback complete");
        Ok(RollbackOutcome::RolledBack { reversed, run: run_ts })
    }

    fn incomplete(&self, run: &JournalRun, cause: String) -> FlattenError {
        FlattenError::RollbackIncomplete {
            remaining: run.records.clone(),
            cause,
        }
    }

    /// Atomically rewrite the journal; an empty journal removes the file.
    fn persist(&self, journal: &Journal) -> Result<()> {
        if journal.runs.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(FlattenError::io("remove empty journal", &self.path, e)),
            };
        }
        let json = serde_json::to_vec_pretty(journal).map_err(|e| FlattenError::JournalCorrupt {
            path: self.path.clone(),
            details: e.to_string(),
        })?;
        atomic_write_0600(&self.path, &json).map_err(io_err("write journal", &self.path))
    }
}

fn read_journal(path: &Path) -> Result<Journal> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Journal::default()),
        Err(e) => return Err(FlattenError::io("read journal", path, e)),
    };
    serde_json::from_slice(&data).map_err(|e| FlattenError::JournalCorrupt {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}

/// Move `record.dest` back to `record.source`.
fn reverse<B: MoveBackend + ?Sized>(backend: &B, record: &MoveRecord, opts: &CopyOptions) -> Result<()> {
    if fs::symlink_metadata(&record.dest).is_err() {
        return Err(FlattenError::io(
            "locate moved entry",
            &record.dest,
            io::Error::from(io::ErrorKind::NotFound),
        ));
    }
    if let Some(parent) = record.source.parent() {
        fs::create_dir_all(parent).map_err(io_err("recreate source directory", parent))?;
    }
    let opts = CopyOptions {
        force_copy: opts.force_copy || record.strategy == Strategy::CopyVerifyDelete,
        ..*opts
    };
    let moved = relocate(backend, &record.dest, &record.source, &opts)?;
    if let (Some(expected), Some(actual)) = (&record.checksum, &moved.checksum) {
        if expected != actual {
            warn!(path = %record.source.display(), "content changed since it was moved");
        }
    }
    if let Some(err) = moved.cleanup_error {
        return Err(err);
    }
    debug!(src = %record.dest.display(), dest = %record.source.display(), "reversed");
    Ok(())
}

/// Append `result` to the journal for `root`, opening (and locking) the store for the call.
pub fn save(root: &Path, result: &MoveResult) -> Result<bool> {
    JournalStore::open(root)?.save(result)
}

/// Read the journal for `root` without taking the lock.
pub fn load(root: &Path) -> Result<Journal> {
    read_journal(&journal_path(root))
}

/// Reverse the latest run for `root`.
pub fn rollback(root: &Path) -> Result<RollbackOutcome> {
    JournalStore::open(root)?.rollback()
}
