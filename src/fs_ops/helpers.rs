//! I/O error hints.
//!
//! Maps raw OS error codes to a short, actionable phrase that gets folded into
//! `FlattenError::Io` messages and `warn!` fields.

use std::io;

/// Hint for a failed filesystem call, if the error code is one we know.
pub fn io_hint(e: &io::Error) -> Option<&'static str> {
    if let Some(code) = e.raw_os_error() {
        let hint = match code {
            libc::EACCES | libc::EPERM => "permission denied; check ownership and write permissions",
            libc::EXDEV => "cross-filesystem; atomic rename not possible",
            libc::EBUSY => "resource busy; another process may be using it",
            libc::ENOENT => "path not found; it may have been moved concurrently",
            libc::EEXIST => "already exists",
            libc::ENOTEMPTY => "directory not empty",
            libc::ENOSPC => "insufficient space on device",
            libc::EROFS => "read-only filesystem",
            libc::ELOOP => "too many symbolic link levels; possible symlink cycle",
            libc::ENAMETOOLONG => "filename or path too long",
            libc::EMFILE | libc::ENFILE => "too many open files",
            _ => return None,
        };
        return Some(hint);
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => Some("permission denied"),
        io::ErrorKind::NotFound => Some("path not found"),
        io::ErrorKind::AlreadyExists => Some("already exists"),
        _ => None,
    }
}

/// True when `e` says source and destination live on different devices.
pub fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exdev_is_cross_device() {
        let e = io::Error::from_raw_os_error(libc::EXDEV);
        assert!(is_cross_device(&e));
        assert_eq!(io_hint(&e), Some("cross-filesystem; atomic rename not possible"));
    }

    #[test]
    fn kind_only_errors_still_get_hints() {
        let e = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(!is_cross_device(&e));
        assert_eq!(io_hint(&e), Some("permission denied"));
    }

    #[test]
    fn unknown_codes_have_no_hint() {
        let e = io::Error::from_raw_os_error(libc::EINTR);
        assert!(io_hint(&e).is_none());
    }
}
