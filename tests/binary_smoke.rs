// use macro form directly; no import needed
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use fs_cleaner::config::CONFIG_ENV;
use fs_cleaner::journal::journal_path;
use tempfile::tempdir;

fn fs_cleaner(cfg_dir: &Path, args: &[&str]) -> Output {
    let me = assert_cmd::cargo::cargo_bin!("fs-cleaner");
    Command::new(me)
        .env(CONFIG_ENV, cfg_dir.join("absent.xml"))
        .args(args)
        .output()
        .expect("spawn binary")
}

#[test]
fn binary_print_config_succeeds() {
    let td = tempdir().unwrap();
    let out = fs_cleaner(td.path(), &["--print-config"]);
    assert!(out.status.success(), "binary should succeed with --print-config");
    assert!(String::from_utf8_lossy(&out.stdout).contains(CONFIG_ENV));
}

#[test]
fn init_config_writes_a_loadable_template() {
    let td = tempdir().unwrap();
    let cfg = td.path().join("conf/config.xml");
    let out = fs_cleaner(td.path(), &["--config", cfg.to_str().unwrap(), "--init-config"]);
    assert!(out.status.success());
    assert!(cfg.exists());

    let again = fs_cleaner(td.path(), &["--config", cfg.to_str().unwrap(), "--init-config"]);
    assert_eq!(again.status.code(), Some(1));
}

#[test]
fn exit_codes_follow_the_outcome() {
    let td = tempdir().unwrap();
    let a = td.path().join("a");
    fs::create_dir_all(a.join("a")).unwrap();
    fs::write(a.join("a/x"), b"x").unwrap();
    let target = a.to_str().unwrap();

    assert_eq!(fs_cleaner(td.path(), &["analyze", target]).status.code(), Some(0));
    assert_eq!(fs_cleaner(td.path(), &["apply", target, "--dry-run"]).status.code(), Some(0));
    assert!(a.join("a/x").exists());

    assert_eq!(fs_cleaner(td.path(), &["apply", target]).status.code(), Some(0));
    assert!(a.join("x").exists());
    let history = fs_cleaner(td.path(), &["history", target]);
    assert!(String::from_utf8_lossy(&history.stdout).contains("1 move(s)"));

    assert_eq!(fs_cleaner(td.path(), &["rollback", target]).status.code(), Some(0));
    assert!(a.join("a/x").exists());
}

#[test]
fn collision_exits_1_on_analyze_and_2_on_apply() {
    let td = tempdir().unwrap();
    let b = td.path().join("b");
    fs::create_dir_all(b.join("b")).unwrap();
    fs::write(b.join("b/z"), b"inner").unwrap();
    fs::write(b.join("z"), b"outer").unwrap();
    let target = b.to_str().unwrap();

    assert_eq!(fs_cleaner(td.path(), &["analyze", target]).status.code(), Some(1));
    assert_eq!(fs_cleaner(td.path(), &["apply", target]).status.code(), Some(2));
    assert_eq!(fs::read(b.join("z")).unwrap(), b"outer");
}

#[test]
fn corrupt_journal_exits_3_on_rollback() {
    let td = tempdir().unwrap();
    let t = td.path().join("t");
    fs::create_dir_all(&t).unwrap();
    fs::write(journal_path(&t), b"{").unwrap();
    let out = fs_cleaner(td.path(), &["rollback", t.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn json_report_is_parseable() {
    let td = tempdir().unwrap();
    let a = td.path().join("a");
    fs::create_dir_all(a.join("a")).unwrap();
    fs::write(a.join("a/x"), b"x").unwrap();
    let out = fs_cleaner(td.path(), &["report", a.to_str().unwrap(), "--json"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["candidates"].as_array().unwrap().len(), 1);
    assert_eq!(v["moves"].as_array().unwrap().len(), 1);
    assert!(v["risks"].as_array().unwrap().is_empty());
}
