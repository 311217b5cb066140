//! Metadata preservation for copied entries.
//! - Mode bits and atime/mtime always.
//! - Owner/group when asked (best-effort; usually needs root).
//! - Extended attributes with the `xattrs` feature.
//!
//! Every step is best-effort: failures are logged and the copy still counts.

use filetime::FileTime;
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use tracing::{trace, warn};

use crate::model::RemovedDir;

/// Apply `src_meta` (from `symlink_metadata`) onto `dest`.
pub(crate) fn preserve_metadata(src: &Path, dest: &Path, src_meta: &fs::Metadata, ownership: bool) {
    let is_link = src_meta.file_type().is_symlink();

    if ownership {
        preserve_owner(dest, src_meta);
    }

    // Symlink modes are not settable on Linux; only their times are.
    if !is_link {
        let mode = src_meta.permissions().mode() & 0o7777;
        match fs::set_permissions(dest, fs::Permissions::from_mode(mode)) {
            Ok(()) => trace!(path = %dest.display(), mode = format!("{mode:o}"), "set mode"),
            Err(e) => warn!(path = %dest.display(), mode = format!("{mode:o}"), error = %e, "failed to set mode on copy"),
        }
    }

    preserve_xattrs(src, dest);

    let at = FileTime::from_unix_time(src_meta.atime(), src_meta.atime_nsec() as u32);
    let mt = FileTime::from_unix_time(src_meta.mtime(), src_meta.mtime_nsec() as u32);
    let res = if is_link {
        filetime::set_symlink_file_times(dest, at, mt)
    } else {
        filetime::set_file_times(dest, at, mt)
    };
    if let Err(e) = res {
        warn!(path = %dest.display(), error = %e, "failed to set atime/mtime on copy");
    }
}

fn preserve_owner(dest: &Path, src_meta: &fs::Metadata) {
    let Ok(c_path) = CString::new(dest.as_os_str().as_bytes()) else {
        return;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::lchown(c_path.as_ptr(), src_meta.uid(), src_meta.gid()) };
    if rc != 0 {
        let e = std::io::Error::last_os_error();
        trace!(path = %dest.display(), uid = src_meta.uid(), gid = src_meta.gid(), error = %e, "ownership not preserved");
    }
}

#[cfg(feature = "xattrs")]
fn preserve_xattrs(src: &Path, dest: &Path) {
    let names = match xattr::list(src) {
        Ok(names) => names,
        Err(e) => {
            warn!(src = %src.display(), error = %e, "failed to list xattrs");
            return;
        }
    };
    for name in names {
        let name_disp = name.to_string_lossy().into_owned();
        match xattr::get(src, &name) {
            Ok(value) => {
                let value = value.unwrap_or_default();
                if let Err(e) = xattr::set(dest, &name, &value) {
                    warn!(dest = %dest.display(), xattr = %name_disp, error = %e, "failed to set xattr on copy");
                }
            }
            Err(e) => warn!(src = %src.display(), xattr = %name_disp, error = %e, "failed to read xattr"),
        }
    }
}

#[cfg(not(feature = "xattrs"))]
fn preserve_xattrs(_src: &Path, _dest: &Path) {}

/// Capture what rollback needs to recreate a directory we are about to remove.
pub(crate) fn snapshot_dir(path: &Path) -> std::io::Result<RemovedDir> {
    let meta = fs::symlink_metadata(path)?;
    Ok(RemovedDir {
        path: path.to_path_buf(),
        mode: meta.permissions().mode() & 0o7777,
        atime: (meta.atime(), meta.atime_nsec() as u32),
        mtime: (meta.mtime(), meta.mtime_nsec() as u32),
    })
}

/// Reapply a snapshot taken by [`snapshot_dir`].
pub(crate) fn restore_dir(dir: &RemovedDir) -> std::io::Result<()> {
    fs::set_permissions(&dir.path, fs::Permissions::from_mode(dir.mode))?;
    let at = FileTime::from_unix_time(dir.atime.0, dir.atime.1);
    let mt = FileTime::from_unix_time(dir.mtime.0, dir.mtime.1);
    filetime::set_file_times(&dir.path, at, mt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mode_and_mtime_follow_source() {
        let td = tempdir().unwrap();
        let src = td.path().join("src");
        let dst = td.path().join("dst");
        fs::write(&src, b"a").unwrap();
        fs::write(&dst, b"a").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o640)).unwrap();
        filetime::set_file_mtime(&src, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

        let meta = fs::symlink_metadata(&src).unwrap();
        preserve_metadata(&src, &dst, &meta, false);

        let got = fs::metadata(&dst).unwrap();
        assert_eq!(got.permissions().mode() & 0o777, 0o640);
        assert_eq!(got.mtime(), 1_600_000_000);
    }

    #[test]
    fn dir_snapshot_roundtrips() {
        let td = tempdir().unwrap();
        let d = td.path().join("d");
        fs::create_dir(&d).unwrap();
        fs::set_permissions(&d, fs::Permissions::from_mode(0o750)).unwrap();
        filetime::set_file_mtime(&d, FileTime::from_unix_time(1_500_000_000, 42)).unwrap();
        let snap = snapshot_dir(&d).unwrap();

        fs::remove_dir(&d).unwrap();
        fs::create_dir(&d).unwrap();
        restore_dir(&snap).unwrap();

        let meta = fs::metadata(&d).unwrap();
        assert_eq!(meta.permissions().mode() & 0o7777, 0o750);
        assert_eq!(meta.mtime(), 1_500_000_000);
    }
}
