//! Nesting detection.
//!
//! Breadth-first walk over a target tree looking for directories `D` that
//! contain a child directory also named `D`. The walk is an explicit work
//! list, so arbitrarily deep trees never grow the call stack, and it never
//! follows symlinks.
//!
//! Emission order is depth ascending, then path order within a depth: each
//! directory's children are sorted before they are queued.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{io_err, FlattenError, Result};
use crate::model::NestingCandidate;

/// A validated target root. Iterate it (any number of times) with [`NestingScan::iter`].
#[derive(Debug, Clone)]
pub struct NestingScan {
    root: PathBuf,
}

/// Validate `root` and prepare a lazy scan over it.
///
/// The root must be a readable directory; it is canonicalized so every
/// candidate path is absolute.
pub fn detect_nesting(root: &Path) -> Result<NestingScan> {
    let root = fs::canonicalize(root).map_err(io_err("resolve target root", root))?;
    let meta = fs::metadata(&root).map_err(io_err("stat target root", &root))?;
    if !meta.is_dir() {
        return Err(FlattenError::NotADirectory { path: root });
    }
    fs::read_dir(&root).map_err(io_err("read target root", &root))?;
    Ok(NestingScan { root })
}

impl NestingScan {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fresh traversal from the root.
    pub fn iter(&self) -> Candidates {
        let mut queue = VecDeque::new();
        queue.push_back(self.root.clone());
        Candidates {
            queue,
            pending: VecDeque::new(),
            symlinked_nests: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

impl<'a> IntoIterator for &'a NestingScan {
    type Item = NestingCandidate;
    type IntoIter = Candidates;

    fn into_iter(self) -> Candidates {
        self.iter()
    }
}

/// Lazy candidate iterator. Side findings accumulate as the walk proceeds.
#[derive(Debug)]
pub struct Candidates {
    queue: VecDeque<PathBuf>,
    pending: VecDeque<NestingCandidate>,
    symlinked_nests: Vec<PathBuf>,
    unreadable: Vec<PathBuf>,
}

impl Candidates {
    /// `D/D` entries where the inner `D` is a symlink to a directory.
    /// They are never flattened; callers surface them as risks.
    pub fn symlinked_nests(&self) -> &[PathBuf] {
        &self.symlinked_nests
    }

    /// Directories skipped because they could not be listed.
    pub fn unreadable(&self) -> &[PathBuf] {
        &self.unreadable
    }

    fn visit(&mut self, dir: &Path) {
        let mut children = match sorted_entries(dir) {
            Ok(children) => children,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "skipping unreadable directory");
                self.unreadable.push(dir.to_path_buf());
                return;
            }
        };
        let own_name = dir.file_name().map(|n| n.to_os_string());

        for (name, file_type) in children.drain(..) {
            let child = dir.join(&name);
            let same_name = own_name.as_deref() == Some(name.as_os_str());
            if file_type.is_dir() {
                if same_name {
                    match sorted_entries(&child) {
                        Ok(entries) => {
                            let entries = entries.into_iter().map(|(n, _)| n).collect();
                            debug!(root = %dir.display(), "nesting candidate");
                            self.pending
                                .push_back(NestingCandidate::new(dir.to_path_buf(), name.clone(), entries));
                        }
                        Err(e) => {
                            warn!(path = %child.display(), error = %e, "cannot list nested directory; not a candidate");
                            self.unreadable.push(child.clone());
                        }
                    }
                }
                self.queue.push_back(child);
            } else if same_name && file_type.is_symlink() && fs::metadata(&child).is_ok_and(|m| m.is_dir()) {
                debug!(path = %child.display(), "symlinked nest; not flattened");
                self.symlinked_nests.push(child);
            }
        }
    }
}

impl Iterator for Candidates {
    type Item = NestingCandidate;

    fn next(&mut self) -> Option<NestingCandidate> {
        loop {
            if let Some(candidate) = self.pending.pop_front() {
                return Some(candidate);
            }
            let dir = self.queue.pop_front()?;
            self.visit(&dir);
        }
    }
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<(OsString, fs::FileType)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        out.push((entry.file_name(), entry.file_type()?));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
