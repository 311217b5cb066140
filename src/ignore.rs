//! `.cleanupignore` support.
//!
//! One glob per line, `#` starts a comment. A pattern without `/` matches a
//! directory name anywhere in the tree; a pattern with `/` is matched against
//! the path relative to the target root. A candidate is excluded when its
//! nested directory or any ancestor inside the target matches.

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Component, Path};
use tracing::debug;

use crate::errors::{io_err, FlattenError, Result};
use crate::model::NestingCandidate;

pub const DEFAULT_IGNORE_FILE: &str = ".cleanupignore";

#[derive(Debug)]
struct Pattern {
    source: String,
    regex: Regex,
    anchored: bool,
}

#[derive(Debug, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    /// Read `<root>/<file_name>`. A missing file yields an empty set.
    pub fn load(root: &Path, file_name: &str) -> Result<Self> {
        let path = root.join(file_name);
        match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(io_err("read ignore file", &path)(e)),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut patterns = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let trimmed = line.trim_start_matches('/').trim_end_matches('/');
            if trimmed.is_empty() {
                continue;
            }
            patterns.push(Pattern {
                source: line.to_string(),
                regex: glob_to_regex(trimmed)?,
                anchored: trimmed.contains('/') || line.starts_with('/'),
            });
        }
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `rel` (relative to the target root) or any of its ancestors is ignored.
    pub fn is_ignored(&self, rel: &Path) -> bool {
        let mut prefix = String::new();
        for comp in rel.components() {
            let Component::Normal(name) = comp else { continue };
            let name = name.to_string_lossy();
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(&name);
            for p in &self.patterns {
                let subject = if p.anchored { prefix.as_str() } else { name.as_ref() };
                if p.regex.is_match(subject) {
                    debug!(path = %prefix, pattern = %p.source, "ignored by pattern");
                    return true;
                }
            }
        }
        false
    }

    /// Candidate filter relative to `target_root`.
    pub fn excludes(&self, target_root: &Path, candidate: &NestingCandidate) -> bool {
        if self.is_empty() {
            return false;
        }
        let nested = candidate.nested_path();
        match nested.strip_prefix(target_root) {
            Ok(rel) => self.is_ignored(rel),
            Err(_) => false,
        }
    }
}

/// Glob to anchored regex:
/// - `**` matches across separators, `**/` also matches nothing
/// - `*` matches within one component
/// - `?` matches one character except `/`
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut regex_str = String::with_capacity(pattern.len() * 2);
    regex_str.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    regex_str.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex_str.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                regex_str.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex_str.push_str("[^/]");
                i += 1;
            }
            c => {
                let mut buf = [0u8; 4];
                regex_str.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }
    regex_str.push('$');

    Regex::new(&regex_str).map_err(|err| FlattenError::InvalidIgnorePattern {
        pattern: pattern.to_string(),
        details: err.to_string(),
    })
}
