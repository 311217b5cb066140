//! Relocation of a single entry: same-device rename, or copy + verify + delete
//! when the rename reports a cross-device boundary.
//!
//! Copy fallback sequence:
//! 1. Copy the whole entry into a hidden temp sibling of the destination.
//! 2. Compare tree digests of source and temp copy.
//! 3. Rename the temp copy into place (never over an existing entry).
//! 4. Remove the source.
//!
//! A digest mismatch removes the temp copy and leaves the source untouched.
//! A tree holding a fifo, socket or device node is refused before step 1 with
//! `UnsupportedEntryType`, since such files cannot be recreated by copying.

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::atomic::rename_no_clobber;
use super::helpers::is_cross_device;
use super::metadata::preserve_metadata;
use super::util::{occupied, unique_temp_path};
use super::MoveBackend;
use crate::errors::{io_err, FlattenError, Result};
use crate::model::Strategy;

/// Knobs for the copy fallback.
#[derive(Debug, Clone, Copy)]
pub struct CopyOptions {
    /// Carry uid/gid over to copies. On by default; failures without
    /// privileges are ignored.
    pub preserve_ownership: bool,
    /// Skip the rename attempt and always copy + verify + delete.
    pub force_copy: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            preserve_ownership: true,
            force_copy: false,
        }
    }
}

/// What [`relocate`] did.
#[derive(Debug)]
pub struct Relocated {
    pub strategy: Strategy,
    pub checksum: Option<String>,
    /// The verified copy is in place but removing the source failed.
    pub cleanup_error: Option<FlattenError>,
}

/// Move `src` to `dest`, refusing to replace anything already at `dest`.
pub fn relocate<B: MoveBackend + ?Sized>(
    backend: &B,
    src: &Path,
    dest: &Path,
    opts: &CopyOptions,
) -> Result<Relocated> {
    if occupied(dest) {
        return Err(FlattenError::CollisionDetected {
            dest: dest.to_path_buf(),
        });
    }

    if !opts.force_copy {
        match backend.rename(src, dest) {
            Ok(()) => {
                debug!(src = %src.display(), dest = %dest.display(), "renamed");
                return Ok(Relocated {
                    strategy: Strategy::Rename,
                    checksum: None,
                    cleanup_error: None,
                });
            }
            Err(e) if is_cross_device(&e) => {
                info!(src = %src.display(), dest = %dest.display(), "cross-device rename; falling back to copy + verify");
            }
            Err(e) if e.raw_os_error() == Some(libc::EEXIST) => {
                return Err(FlattenError::CollisionDetected {
                    dest: dest.to_path_buf(),
                });
            }
            Err(e) => return Err(FlattenError::io("rename entry", src, e)),
        }
    }

    copy_verify_delete(backend, src, dest, opts)
}

fn copy_verify_delete<B: MoveBackend + ?Sized>(
    backend: &B,
    src: &Path,
    dest: &Path,
    opts: &CopyOptions,
) -> Result<Relocated> {
    if let Some(special) = find_special_file(src).map_err(io_err("inspect entry", src))? {
        return Err(FlattenError::UnsupportedEntryType { path: special });
    }

    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let tmp = unique_temp_path(parent);

    if let Err(e) = copy_entry(src, &tmp, opts) {
        discard(&tmp);
        return Err(FlattenError::io("copy entry to temp", src, e));
    }

    let digests = backend
        .digest(src)
        .map_err(io_err("checksum source", src))
        .and_then(|s| {
            backend
                .digest(&tmp)
                .map(|t| (s, t))
                .map_err(io_err("checksum copy", &tmp))
        });
    let (src_digest, tmp_digest) = match digests {
        Ok(pair) => pair,
        Err(e) => {
            discard(&tmp);
            return Err(e);
        }
    };
    if src_digest != tmp_digest {
        warn!(src = %src.display(), dest = %dest.display(), "checksum mismatch; discarding copy");
        discard(&tmp);
        return Err(FlattenError::CrossDeviceChecksumMismatch {
            origin: src.to_path_buf(),
            dest: dest.to_path_buf(),
        });
    }

    if let Err(e) = rename_no_clobber(&tmp, dest) {
        discard(&tmp);
        if e.raw_os_error() == Some(libc::EEXIST) {
            return Err(FlattenError::CollisionDetected {
                dest: dest.to_path_buf(),
            });
        }
        return Err(FlattenError::io("place verified copy", dest, e));
    }

    let cleanup_error = remove_entry(src)
        .err()
        .map(|e| FlattenError::io("remove source after verified copy", src, e));
    if let Some(err) = &cleanup_error {
        warn!(src = %src.display(), error = %err, "verified copy placed but source removal failed");
    }

    Ok(Relocated {
        strategy: Strategy::CopyVerifyDelete,
        checksum: Some(src_digest),
        cleanup_error,
    })
}

/// First entry under `src` (or `src` itself) that is neither a file, a
/// directory nor a symlink.
fn find_special_file(src: &Path) -> io::Result<Option<PathBuf>> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let ft = entry.file_type();
        if !(ft.is_file() || ft.is_dir() || ft.is_symlink()) {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

/// Copy a file, symlink or whole directory tree from `src` to the fresh path `dst`.
pub(crate) fn copy_entry(src: &Path, dst: &Path, opts: &CopyOptions) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    if !meta.is_dir() {
        return copy_leaf(src, dst, &meta, opts);
    }

    // Directory metadata is applied after the children so their creation does
    // not bump the copied mtimes.
    let mut dirs: Vec<(PathBuf, PathBuf, fs::Metadata)> = Vec::new();
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = if rel.as_os_str().is_empty() {
            dst.to_path_buf()
        } else {
            dst.join(rel)
        };
        let meta = fs::symlink_metadata(entry.path())?;
        if meta.is_dir() {
            fs::create_dir(&target)?;
            dirs.push((entry.path().to_path_buf(), target, meta));
        } else {
            copy_leaf(entry.path(), &target, &meta, opts)?;
        }
    }
    for (src_dir, dst_dir, meta) in dirs.iter().rev() {
        preserve_metadata(src_dir, dst_dir, meta, opts.preserve_ownership);
    }
    Ok(())
}

fn copy_leaf(src: &Path, dst: &Path, meta: &fs::Metadata, opts: &CopyOptions) -> io::Result<()> {
    let ft = meta.file_type();
    if ft.is_symlink() {
        symlink(fs::read_link(src)?, dst)?;
    } else if ft.is_file() {
        super::io_copy::copy_file_contents(src, dst)?;
    } else {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("special file '{}' cannot be copied", src.display()),
        ));
    }
    preserve_metadata(src, dst, meta, opts.preserve_ownership);
    Ok(())
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn discard(path: &Path) {
    if occupied(path) {
        if let Err(e) = remove_entry(path) {
            warn!(path = %path.display(), error = %e, "failed to remove temp copy");
        }
    }
}
