//! Rename helpers.
//! - Refuses to replace an existing destination (POSIX rename would silently clobber files).
//! - On Linux the refusal is atomic via `renameat2(RENAME_NOREPLACE)`.
//! - Best-effort fsync of the destination directory after the rename.

use std::fs;
use std::io;
use std::path::Path;

use super::util::{fsync_dir, occupied};

/// Rename `src` to `dst` only if `dst` is free; `EEXIST` otherwise.
pub fn rename_no_clobber(src: &Path, dst: &Path) -> io::Result<()> {
    rename_noreplace(src, dst)?;
    if let Some(parent) = dst.parent() {
        // A failed fsync must not turn a completed rename into a reported failure.
        let _ = fsync_dir(parent);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn rename_noreplace(src: &Path, dst: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let from = CString::new(src.as_os_str().as_bytes())?;
    let to = CString::new(dst.as_os_str().as_bytes())?;
    // SAFETY: both strings are valid and NUL-terminated for the duration of the call.
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            from.as_ptr(),
            libc::AT_FDCWD,
            to.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // Kernel or filesystem without RENAME_NOREPLACE support.
        Some(libc::ENOSYS) | Some(libc::EINVAL) => check_then_rename(src, dst),
        _ => Err(err),
    }
}

#[cfg(not(target_os = "linux"))]
fn rename_noreplace(src: &Path, dst: &Path) -> io::Result<()> {
    check_then_rename(src, dst)
}

/// The existence check and the rename are two syscalls here; a concurrent
/// writer can still slip in between.
fn check_then_rename(src: &Path, dst: &Path) -> io::Result<()> {
    if occupied(dst) {
        return Err(io::Error::from_raw_os_error(libc::EEXIST));
    }
    fs::rename(src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn renames_into_free_slot() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"1").unwrap();
        rename_no_clobber(&a, &b).unwrap();
        assert!(!a.exists());
        assert_eq!(fs::read(&b).unwrap(), b"1");
    }

    #[test]
    fn never_replaces_existing_file() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"new").unwrap();
        fs::write(&b, b"old").unwrap();
        let err = rename_no_clobber(&a, &b).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
        assert_eq!(fs::read(&b).unwrap(), b"old");
        assert!(a.exists());
    }

    #[test]
    fn never_replaces_existing_directory() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();
        let err = rename_no_clobber(&a, &b).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
        assert!(a.is_dir());
    }
}
