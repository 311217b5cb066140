use std::fs;

use fs_cleaner::config::{load_config, load_config_from_xml_path, Config, LogLevel, CONFIG_ENV};
use serial_test::serial;
use tempfile::tempdir;

#[test]
fn malformed_xml_errors() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    // Missing closing tag for ignore_file
    fs::write(&cfg_path, "<config>\n  <ignore_file>.keep\n</config>").unwrap();
    let err = load_config_from_xml_path(&cfg_path).unwrap_err();
    assert!(format!("{err:#}").contains("parse config xml"));
}

#[test]
fn bad_values_are_reported() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(&cfg_path, "<config><max_scan_bytes>lots</max_scan_bytes></config>").unwrap();
    assert!(load_config_from_xml_path(&cfg_path).is_err());

    fs::write(&cfg_path, "<config><log_level>shouty</log_level></config>").unwrap();
    assert!(load_config_from_xml_path(&cfg_path).is_err());
}

#[test]
fn empty_document_yields_defaults() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(&cfg_path, "<config>\n</config>\n").unwrap();
    let cfg = load_config_from_xml_path(&cfg_path).unwrap();
    assert_eq!(cfg, Config::default());
}

#[test]
fn every_field_is_read() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(
        &cfg_path,
        r#"<config>
  <log_level>info</log_level>
  <log_file>/var/tmp/fs_cleaner.log</log_file>
  <ignore_file>.nocleanup</ignore_file>
  <script_extensions>sh,rb</script_extensions>
  <max_scan_bytes>4096</max_scan_bytes>
  <preserve_ownership>false</preserve_ownership>
  <scan_threads>2</scan_threads>
</config>"#,
    )
    .unwrap();
    let cfg = load_config_from_xml_path(&cfg_path).unwrap();
    assert_eq!(cfg.log_level, LogLevel::Info);
    assert_eq!(cfg.log_file.as_deref(), Some(std::path::Path::new("/var/tmp/fs_cleaner.log")));
    assert_eq!(cfg.ignore_file, ".nocleanup");
    assert_eq!(cfg.script_extensions, vec!["sh", "rb"]);
    assert_eq!(cfg.max_scan_bytes, 4096);
    assert!(!cfg.preserve_ownership);
    assert_eq!(cfg.scan_threads, 2);

    let opts = cfg.pipeline_options();
    assert!(!opts.copy.preserve_ownership);
    assert_eq!(opts.scan.max_scan_bytes, 4096);
}

#[test]
#[serial]
fn env_var_points_the_loader_elsewhere() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("custom.xml");
    fs::write(&cfg_path, "<config><log_level>quiet</log_level></config>").unwrap();

    unsafe { std::env::set_var(CONFIG_ENV, &cfg_path) };
    let loaded = load_config();
    let missing = {
        unsafe { std::env::set_var(CONFIG_ENV, td.path().join("absent.xml")) };
        load_config()
    };
    unsafe { std::env::remove_var(CONFIG_ENV) };

    let (path, cfg) = loaded.unwrap().unwrap();
    assert_eq!(path, cfg_path);
    assert_eq!(cfg.log_level, LogLevel::Quiet);
    assert!(missing.unwrap().is_none());
}

#[test]
fn validation_rejects_odd_values() {
    let mut cfg = Config::default();
    cfg.ignore_file = "sub/.cleanupignore".into();
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.script_extensions = vec![".sh".into()];
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.max_scan_bytes = 0;
    assert!(cfg.validate().is_err());
}
