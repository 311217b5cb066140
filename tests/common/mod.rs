#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use fs_cleaner::fs_ops::{tree_digest, LOCK_FILE_NAME};
use fs_cleaner::journal::JOURNAL_FILE_NAME;
use walkdir::WalkDir;

/// What the round-trip and dry-run tests compare for each path below the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryState {
    pub kind: char,
    pub mode: u32,
    /// Content digest for files, link target for symlinks.
    pub content: String,
    /// Tracked for regular files and directories.
    pub mtime: Option<(i64, i64)>,
}

/// Every path under `root` (root itself excluded) with its kind, mode and content.
/// Journal and lock files are left out.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, EntryState> {
    let mut out = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false).sort_by_file_name() {
        let entry = entry.unwrap();
        let name = entry.file_name();
        if name == JOURNAL_FILE_NAME || name == LOCK_FILE_NAME {
            continue;
        }
        let meta = entry.path().symlink_metadata().unwrap();
        let ft = meta.file_type();
        let (kind, content, mtime) = if ft.is_symlink() {
            ('l', fs::read_link(entry.path()).unwrap().display().to_string(), None)
        } else if ft.is_dir() {
            ('d', String::new(), Some((meta.mtime(), meta.mtime_nsec())))
        } else {
            ('f', tree_digest(entry.path()).unwrap(), Some((meta.mtime(), meta.mtime_nsec())))
        };
        let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
        out.insert(
            rel,
            EntryState {
                kind,
                mode: meta.permissions().mode() & 0o7777,
                content,
                mtime,
            },
        );
    }
    out
}

/// Directory tree digest of `root`, journal and lock files included.
pub fn tree_hash(root: &Path) -> String {
    tree_digest(root).unwrap()
}

pub fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
