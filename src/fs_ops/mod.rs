//! Filesystem operations used by the mover and the journal.

mod atomic;
mod checksum;
mod copy;
mod helpers;
mod io_copy;
mod lock;
mod metadata;
mod util;

pub use atomic::rename_no_clobber;
pub use checksum::tree_digest;
pub use copy::{relocate, CopyOptions, Relocated};
pub use helpers::{io_hint, is_cross_device};
pub use lock::{acquire_journal_lock, lock_file_path, try_acquire_journal_lock, JournalLock, LOCK_FILE_NAME};
pub use util::{file_identity, occupied, TEMP_PREFIX};

pub(crate) use metadata::{restore_dir, snapshot_dir};
pub(crate) use util::{fsync_dir, unique_temp_path};

use std::io;
use std::path::Path;

/// The two filesystem calls whose failures the mover must survive.
///
/// `OsBackend` is what the CLI uses; tests swap in implementations that
/// report `EXDEV` or return a wrong digest to drive the fallback paths.
pub trait MoveBackend: Send + Sync {
    /// Must fail with `EEXIST` rather than replace an existing `to`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        rename_no_clobber(from, to)
    }

    fn digest(&self, path: &Path) -> io::Result<String> {
        tree_digest(path)
    }
}

/// Real filesystem calls, no interception.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBackend;

impl MoveBackend for OsBackend {}
