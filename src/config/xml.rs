//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Writes a commented template on request (`--init-config`).
//!
//! Unknown elements are rejected so typos surface instead of being ignored.

use anyhow::{bail, Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::{Deserialize, Deserializer};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use super::paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
use super::types::{Config, LogLevel};
use crate::platform::{atomic_write_0600, set_dir_mode_0700};

/// Mirror of the XML document; every element is optional.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    log_level: Option<String>,
    log_file: Option<String>,
    ignore_file: Option<String>,
    /// Comma separated, e.g. `sh,py,toml`.
    script_extensions: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    max_scan_bytes: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    preserve_ownership: Option<bool>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    scan_threads: Option<usize>,
}

// Element text may carry surrounding whitespace from hand-edited files.
fn de_trimmed_opt<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();
    if let Some(s) = non_empty(parsed.log_level.as_deref()) {
        cfg.log_level = s.parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    cfg.log_file = non_empty(parsed.log_file.as_deref()).map(PathBuf::from);
    if let Some(s) = non_empty(parsed.ignore_file.as_deref()) {
        cfg.ignore_file = s.to_string();
    }
    if let Some(s) = non_empty(parsed.script_extensions.as_deref()) {
        cfg.script_extensions = s
            .split(',')
            .map(|e| e.trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
    }
    if let Some(n) = parsed.max_scan_bytes {
        cfg.max_scan_bytes = n;
    }
    if let Some(b) = parsed.preserve_ownership {
        cfg.preserve_ownership = b;
    }
    if let Some(n) = parsed.scan_threads {
        cfg.scan_threads = n;
    }
    Ok(cfg)
}

/// Load a Config from a specific XML file.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig =
        from_xml_str(&contents).with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid value in config xml '{}'", path.display()))
}

/// Load the config from `$FS_CLEANER_CONFIG` or the default location.
/// `Ok(None)` when no file exists there.
pub fn load_config() -> Result<Option<(PathBuf, Config)>> {
    let Some(path) = default_config_path() else {
        debug!("no config directory available; using defaults");
        return Ok(None);
    };
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(None);
    }
    let cfg = load_config_from_xml_path(&path)?;
    debug!(path = %path.display(), "config loaded");
    Ok(Some((path, cfg)))
}

/// Write a commented template to `path` (0600, atomic). Refuses to overwrite.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("config already exists at '{}'", path.display());
    }
    if path_has_symlink_ancestor(path)? {
        bail!("refusing to create config: an ancestor of '{}' is a symlink", path.display());
    }
    if let Some(parent) = path.parent() {
        let existed = parent.exists();
        fs::create_dir_all(parent).with_context(|| format!("create '{}'", parent.display()))?;
        if !existed {
            let _ = set_dir_mode_0700(parent);
        }
    }

    let suggested_log = default_log_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "/path/to/fs_cleaner.log".into());
    let defaults = Config::default();
    let content = format!(
        "<!--\n  fs_cleaner configuration (XML). CLI flags override these values.\n\n    log_level           -> quiet | normal | info | debug\n    log_file            -> optional log file (stderr logging stays on)\n    ignore_file         -> ignore file name looked up in each target root\n    script_extensions   -> comma separated extensions scanned for hardcoded paths\n    max_scan_bytes      -> bytes read per file by that scan\n    preserve_ownership  -> copy fallback keeps uid/gid (best-effort)\n    scan_threads        -> read-only scan workers, 0 = one per CPU\n-->\n<config>\n  <log_level>{}</log_level>\n  <log_file>{}</log_file>\n  <ignore_file>{}</ignore_file>\n  <script_extensions>{}</script_extensions>\n  <max_scan_bytes>{}</max_scan_bytes>\n  <preserve_ownership>true</preserve_ownership>\n  <scan_threads>0</scan_threads>\n</config>\n",
        defaults.log_level,
        suggested_log,
        defaults.ignore_file,
        defaults.script_extensions.join(","),
        defaults.max_scan_bytes,
    );

    atomic_write_0600(path, content.as_bytes())
        .with_context(|| format!("write config template '{}'", path.display()))?;
    info!(path = %path.display(), "created template config");
    Ok(())
}
