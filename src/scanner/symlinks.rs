//! Symlinks whose meaning changes when the nested level disappears.
//!
//! Absolute targets under the nested path always break. A relative target
//! travels with its link, so it only changes meaning when it climbs out with
//! `..` and the climb now lands somewhere else.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::model::{NestingCandidate, SymlinkRisk};

pub(super) fn detect(candidate: &NestingCandidate) -> BTreeSet<SymlinkRisk> {
    let nested = candidate.nested_path();
    let mut risks = BTreeSet::new();

    for entry in WalkDir::new(&nested).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "unreadable entry during symlink scan");
                continue;
            }
        };
        if !entry.path_is_symlink() {
            continue;
        }
        let link = entry.path();
        let target = match fs::read_link(link) {
            Ok(t) => t,
            Err(e) => {
                warn!(link = %link.display(), error = %e, "cannot read symlink");
                continue;
            }
        };
        if let Some(reason) = assess(&nested, candidate.root(), link, &target) {
            debug!(link = %link.display(), %reason, "symlink risk");
            risks.insert(SymlinkRisk {
                path: link.to_path_buf(),
                reason,
            });
        }
    }
    risks
}

fn assess(nested: &Path, root: &Path, link: &Path, target: &Path) -> Option<String> {
    if target.is_absolute() {
        let norm = normalize_lexically(target);
        return norm.starts_with(nested).then(|| {
            format!(
                "absolute target '{}' points into '{}', which is removed by flattening",
                target.display(),
                nested.display()
            )
        });
    }

    if !target.components().any(|c| c == Component::ParentDir) {
        return None;
    }
    let rel = link.strip_prefix(nested).ok()?;
    let moved_link = root.join(rel);
    let before = normalize_lexically(&link.parent()?.join(target));
    let after = normalize_lexically(&moved_link.parent()?.join(target));
    (before != after).then(|| {
        format!(
            "relative target '{}' resolves to '{}' now but '{}' after flattening",
            target.display(),
            before.display(),
            after.display()
        )
    })
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_dots() {
        assert_eq!(normalize_lexically(Path::new("/c/c/../c/other")), PathBuf::from("/c/c/other"));
        assert_eq!(normalize_lexically(Path::new("/a/./b/..")), PathBuf::from("/a"));
        assert_eq!(normalize_lexically(Path::new("../../x")), PathBuf::from("../../x"));
        assert_eq!(normalize_lexically(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn climbing_relative_target_changes_meaning() {
        let nested = Path::new("/c/c");
        let reason = assess(nested, Path::new("/c"), Path::new("/c/c/link"), Path::new("../c/other"));
        assert!(reason.is_some());
    }

    #[test]
    fn sibling_relative_target_travels_with_the_link() {
        let nested = Path::new("/c/c");
        assert!(assess(nested, Path::new("/c"), Path::new("/c/c/link"), Path::new("other")).is_none());
        assert!(assess(nested, Path::new("/c"), Path::new("/c/c/d/link"), Path::new("e/other")).is_none());
    }

    #[test]
    fn absolute_target_inside_nested_is_a_risk() {
        let nested = Path::new("/c/c");
        assert!(assess(nested, Path::new("/c"), Path::new("/c/c/l"), Path::new("/c/c/f")).is_some());
        assert!(assess(nested, Path::new("/c"), Path::new("/c/c/l"), Path::new("/etc/hosts")).is_none());
    }
}
