//! Config validation. Runs after CLI overrides are applied.

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::paths::path_has_symlink_ancestor;
use super::types::Config;

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_scan_bytes == 0 {
            bail!("max_scan_bytes must be greater than zero");
        }
        if self.ignore_file.trim().is_empty() || self.ignore_file.contains('/') {
            bail!(
                "ignore_file must be a plain file name looked up in the target root, got '{}'",
                self.ignore_file
            );
        }
        if let Some(ext) = self.script_extensions.iter().find(|e| e.starts_with('.') || e.is_empty()) {
            bail!("script_extensions entries are bare extensions like 'sh', got '{ext}'");
        }
        if let Some(log) = &self.log_file {
            let symlinked = path_has_symlink_ancestor(log)
                .with_context(|| format!("inspect log path '{}'", log.display()))?;
            if symlinked {
                bail!("refusing log file '{}': an ancestor is a symlink", log.display());
            }
        }
        debug!(
            log_level = %self.log_level,
            ignore_file = %self.ignore_file,
            max_scan_bytes = self.max_scan_bytes,
            scan_threads = self.scan_threads,
            force_copy = self.force_copy,
            "config validated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_scan_cap_and_path_ignore_file() {
        let cfg = Config {
            max_scan_bytes: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = Config {
            ignore_file: "sub/.cleanupignore".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
