mod common;

use std::fs;

use fs_cleaner::{apply, PipelineOptions};
use tempfile::tempdir;

use common::{tree_hash, write};

#[test]
fn dry_run_plans_the_same_moves_and_touches_nothing() {
    let td = tempdir().unwrap();
    let x = td.path().join("x");
    write(&x.join("x/x/deep"), "d");
    write(&x.join("x/mid"), "m");
    write(&x.join("x/x/other"), "o");
    let opts = PipelineOptions::default();

    let hash_before = tree_hash(&x);
    let planned = apply(&x, true, &opts).unwrap();
    assert!(planned.is_dry_run());
    assert_eq!(tree_hash(&x), hash_before);
    let entries_after_plan: Vec<_> = fs::read_dir(&x).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(entries_after_plan, vec![std::ffi::OsString::from("x")]);

    let real = apply(&x, false, &opts).unwrap();
    assert!(!real.aborted);
    let pairs = |r: &fs_cleaner::MoveResult| -> Vec<_> {
        r.records.iter().map(|m| (m.source.clone(), m.dest.clone())).collect()
    };
    assert_eq!(pairs(&planned), pairs(&real));
}

#[test]
fn dry_run_of_a_blocked_tree_reports_the_collision() {
    let td = tempdir().unwrap();
    let b = td.path().join("b");
    write(&b.join("b/z"), "1");
    write(&b.join("z"), "2");
    let err = apply(&b, true, &PipelineOptions::default()).unwrap_err();
    assert_eq!(err.code(), "collision");
}
