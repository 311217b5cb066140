//! Shallow text scan for literal copies of the nested path in scripts and config.

use memchr::memmem;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{trace, warn};
use walkdir::WalkDir;

use super::ScanOptions;
use crate::model::{NestingCandidate, PathWarning};

pub const DEFAULT_SCRIPT_EXTENSIONS: &[&str] = &[
    "sh", "bash", "zsh", "fish", "py", "rb", "pl", "js", "ts", "mk", "cmake", "conf", "cfg", "ini",
    "toml", "yaml", "yml", "json", "xml", "env", "service",
];

pub(super) fn detect(candidate: &NestingCandidate, opts: &ScanOptions) -> BTreeSet<PathWarning> {
    let nested = candidate.nested_path();
    let literal = nested.as_os_str().as_bytes().to_vec();
    let finder = memmem::Finder::new(&literal);
    let display = nested.to_string_lossy().into_owned();
    let mut out = BTreeSet::new();

    for entry in WalkDir::new(&nested).min_depth(1).follow_links(false) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let head = match read_head(path, opts.max_scan_bytes) {
            Ok(buf) => buf,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot read file for path scan");
                continue;
            }
        };
        if !is_script_like(path, &head, &opts.script_extensions) {
            continue;
        }
        if finder.find(&head).is_some() {
            trace!(file = %path.display(), "hardcoded nested path");
            out.insert(PathWarning {
                file: path.to_path_buf(),
                literal: display.clone(),
            });
        }
    }
    out
}

fn read_head(path: &Path, cap: u64) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    File::open(path)?.take(cap).read_to_end(&mut buf)?;
    Ok(buf)
}

fn is_script_like(path: &Path, head: &[u8], extensions: &[String]) -> bool {
    if head.starts_with(b"#!") {
        return true;
    }
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| *e == ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, NestingCandidate) {
        let td = tempdir().unwrap();
        let root = fs::canonicalize(td.path()).unwrap().join("proj");
        fs::create_dir_all(root.join("proj")).unwrap();
        let cand = NestingCandidate::new(root.clone(), OsString::from("proj"), Vec::new());
        (td, cand)
    }

    #[test]
    fn finds_literal_in_shebang_and_extension_files() {
        let (_td, cand) = setup();
        let nested = cand.nested_path();
        let lit = nested.display().to_string();
        fs::write(nested.join("run"), format!("#!/bin/sh\ncd {lit}/bin\n")).unwrap();
        fs::write(nested.join("app.toml"), format!("dir = \"{lit}\"\n")).unwrap();
        fs::write(nested.join("notes.txt"), format!("{lit}\n")).unwrap();

        let found = detect(&cand, &ScanOptions::default());
        let files: Vec<_> = found.iter().map(|w| w.file.file_name().unwrap().to_owned()).collect();
        assert_eq!(files, vec![OsString::from("app.toml"), OsString::from("run")]);
    }

    #[test]
    fn cap_limits_how_far_we_read() {
        let (_td, cand) = setup();
        let nested = cand.nested_path();
        let mut body = "x".repeat(1024);
        body.push_str(&nested.display().to_string());
        fs::write(nested.join("late.sh"), body).unwrap();

        let opts = ScanOptions {
            max_scan_bytes: 512,
            ..ScanOptions::default()
        };
        assert!(detect(&cand, &opts).is_empty());
        assert_eq!(detect(&cand, &ScanOptions::default()).len(), 1);
    }
}
