//! Advisory journal lock.
//! Only one fs_cleaner process may mutate (or roll back) a target tree at a time.
//!
//! Design:
//! - The lock is an exclusive `flock` (via fs2) on `.fs-cleaner-journal.lock` in the target root.
//! - The lock file is unlinked when the guard drops so a finished run leaves the tree as it found it.
//! - After locking we re-check that the path still names the locked inode; a previous holder
//!   may have unlinked it between our open and our lock, in which case we retry.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::trace;

pub const LOCK_FILE_NAME: &str = ".fs-cleaner-journal.lock";

/// RAII guard held while a target tree is locked.
#[derive(Debug)]
pub struct JournalLock {
    file: File,
    path: PathBuf,
}

impl JournalLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JournalLock {
    fn drop(&mut self) {
        // Unlink first, while still holding the lock, so no waiter can lock a name we are about to remove.
        let _ = fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}

pub fn lock_file_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE_NAME)
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .custom_flags(libc::O_CLOEXEC)
        .mode(0o600)
        .open(path)
}

/// Whether `file` is still the inode reachable through `path`.
fn still_linked(file: &File, path: &Path) -> io::Result<bool> {
    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(on_disk) => Ok(held.dev() == on_disk.dev() && held.ino() == on_disk.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Blocking acquire of the journal lock for `root`.
pub fn acquire_journal_lock(root: &Path) -> io::Result<JournalLock> {
    let path = lock_file_path(root);
    let start = Instant::now();
    loop {
        let file = open_lock_file(&path)?;
        file.lock_exclusive()?;
        if still_linked(&file, &path)? {
            trace!(path = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "journal lock acquired");
            return Ok(JournalLock { file, path });
        }
        trace!(path = %path.display(), "lock file replaced while waiting; retrying");
    }
}

/// Non-blocking attempt. `Ok(None)` means another process holds the lock.
pub fn try_acquire_journal_lock(root: &Path) -> io::Result<Option<JournalLock>> {
    let path = lock_file_path(root);
    loop {
        let file = open_lock_file(&path)?;
        if let Err(e) = file.try_lock_exclusive() {
            let contended = fs2::lock_contended_error();
            if e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == contended.raw_os_error() {
                trace!(path = %path.display(), "journal lock busy");
                return Ok(None);
            }
            return Err(e);
        }
        if still_linked(&file, &path)? {
            return Ok(Some(JournalLock { file, path }));
        }
    }
}
