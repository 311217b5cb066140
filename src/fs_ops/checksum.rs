//! SHA-256 digests used to verify cross-device copies.
//!
//! A regular file hashes to the digest of its bytes. A directory hashes its
//! sorted subtree: every entry contributes its relative path, a type tag and
//! either its content digest (files) or its link target (symlinks). A symlink
//! on its own hashes its target.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use walkdir::WalkDir;

/// Digest of whatever sits at `path`, without following symlinks.
pub fn tree_digest(path: &Path) -> io::Result<String> {
    let meta = fs::symlink_metadata(path)?;
    let ft = meta.file_type();
    if ft.is_file() {
        return Ok(hex_encode(&file_digest(path)?));
    }
    if ft.is_symlink() {
        let mut hasher = Sha256::new();
        hasher.update(b"link\0");
        hasher.update(fs::read_link(path)?.as_os_str().as_bytes());
        return Ok(hex_encode(&hasher.finalize()));
    }
    if !ft.is_dir() {
        return Err(unsupported(path));
    }

    let mut hasher = Sha256::new();
    hasher.update(b"dir\0");
    for entry in WalkDir::new(path)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry.path().strip_prefix(path).map_err(io::Error::other)?;
        hasher.update(rel.as_os_str().as_bytes());
        hasher.update(b"\0");
        let ft = entry.file_type();
        if ft.is_dir() {
            hasher.update(b"d\0");
        } else if ft.is_symlink() {
            hasher.update(b"l\0");
            hasher.update(fs::read_link(entry.path())?.as_os_str().as_bytes());
        } else if ft.is_file() {
            hasher.update(b"f\0");
            hasher.update(file_digest(entry.path())?);
        } else {
            return Err(unsupported(entry.path()));
        }
        hasher.update(b"\n");
    }
    Ok(hex_encode(&hasher.finalize()))
}

fn file_digest(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

fn unsupported(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot digest special file '{}'", path.display()),
    )
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_digest_matches_plain_sha256() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hello");
        fs::write(&path, b"hello").unwrap();
        assert_eq!(
            tree_digest(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn identical_trees_hash_equal_and_content_changes_show() {
        let tmp = TempDir::new().unwrap();
        for side in ["a", "b"] {
            let root = tmp.path().join(side);
            fs::create_dir_all(root.join("sub")).unwrap();
            fs::write(root.join("sub/f.txt"), b"data").unwrap();
            std::os::unix::fs::symlink("sub/f.txt", root.join("link")).unwrap();
        }
        let a = tree_digest(&tmp.path().join("a")).unwrap();
        let b = tree_digest(&tmp.path().join("b")).unwrap();
        assert_eq!(a, b);

        fs::write(tmp.path().join("b/sub/f.txt"), b"datA").unwrap();
        assert_ne!(a, tree_digest(&tmp.path().join("b")).unwrap());
    }

    #[test]
    fn renamed_entry_changes_digest() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        fs::create_dir(&a).unwrap();
        fs::write(a.join("x"), b"1").unwrap();
        let before = tree_digest(&a).unwrap();
        fs::rename(a.join("x"), a.join("y")).unwrap();
        assert_ne!(before, tree_digest(&a).unwrap());
    }

    #[test]
    fn hex_encode_correctness() {
        assert_eq!(hex_encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
        assert_eq!(hex_encode(&[]), "");
    }
}
