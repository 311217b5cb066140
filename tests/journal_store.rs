use std::fs;
use std::io;
use std::path::Path;

use fs_cleaner::fs_ops::lock_file_path;
use fs_cleaner::journal::journal_path;
use fs_cleaner::{apply, history, rollback, rollback_with, FlattenError, JournalStore, MoveBackend, PipelineOptions};
use tempfile::tempdir;

fn flattened_tree(names: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
    let td = tempdir().unwrap();
    let a = fs::canonicalize(td.path()).unwrap().join("a");
    fs::create_dir_all(a.join("a")).unwrap();
    for name in names {
        fs::write(a.join("a").join(name), name.as_bytes()).unwrap();
    }
    let result = apply(&a, false, &PipelineOptions::default()).unwrap();
    assert!(!result.aborted);
    (td, a)
}

/// Refuses to move anything back to a path ending in `name`.
struct RefuseBackTo(&'static str);

impl MoveBackend for RefuseBackTo {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if to.ends_with(Path::new("a").join(self.0)) {
            return Err(io::Error::from_raw_os_error(libc::EACCES));
        }
        fs::rename(from, to)
    }
}

#[test]
fn corrupt_journal_fails_rollback_with_exit_code_3() {
    let (_td, a) = flattened_tree(&["x"]);
    fs::write(journal_path(&a), b"{ not json").unwrap();

    let err = rollback(&a).unwrap_err();
    assert!(matches!(err, FlattenError::JournalCorrupt { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(a.join("x").exists());
}

#[test]
fn corrupt_journal_does_not_block_analysis() {
    let (_td, a) = flattened_tree(&["x"]);
    fs::write(journal_path(&a), b"[]garbage").unwrap();
    let analysis = fs_cleaner::analyze(&a, &PipelineOptions::default()).unwrap();
    assert!(analysis.candidates.is_empty());
}

#[test]
fn interrupted_rollback_resumes_where_it_stopped() {
    let (_td, a) = flattened_tree(&["x", "y"]);

    // Records are x then y; y is reversed first, then x is refused.
    let err = rollback_with(&RefuseBackTo("x"), &a, &PipelineOptions::default()).unwrap_err();
    match &err {
        FlattenError::RollbackIncomplete { remaining, .. } => {
            assert_eq!(remaining.len(), 1);
            assert!(remaining[0].dest.ends_with("x"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 3);
    assert!(a.join("a/y").exists());
    assert!(a.join("x").exists());

    let journal = history(&a).unwrap();
    assert_eq!(journal.runs[0].records.len(), 1);

    rollback(&a).unwrap();
    assert!(a.join("a/x").exists());
    assert!(a.join("a/y").exists());
    assert!(!journal_path(&a).exists());
}

#[test]
fn second_writer_is_locked_out() {
    let td = tempdir().unwrap();
    let root = fs::canonicalize(td.path()).unwrap();
    let first = JournalStore::open(&root).unwrap();
    assert!(lock_file_path(&root).exists());
    assert!(JournalStore::try_open(&root).unwrap().is_none());
    drop(first);
    assert!(!lock_file_path(&root).exists());
    assert!(JournalStore::try_open(&root).unwrap().is_some());
}

#[test]
fn history_lists_runs_in_order() {
    let (_td, a) = flattened_tree(&["x"]);
    fs::create_dir_all(a.join("a")).unwrap();
    fs::write(a.join("a/y"), b"y").unwrap();
    apply(&a, false, &PipelineOptions::default()).unwrap();

    let journal = history(&a).unwrap();
    assert_eq!(journal.runs.len(), 2);
    assert!(journal.runs[0].timestamp <= journal.runs[1].timestamp);
    assert!(journal.runs[1].records[0].source.ends_with("a/y"));
}

#[test]
fn journal_file_is_private() {
    use std::os::unix::fs::PermissionsExt;
    let (_td, a) = flattened_tree(&["x"]);
    let mode = fs::metadata(journal_path(&a)).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
