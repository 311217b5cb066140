//! Configuration: types, default paths, XML loading, validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{default_config_path, default_log_path, path_has_symlink_ancestor, CONFIG_ENV};
pub use types::{Config, LogLevel};
pub use xml::{create_template_config, load_config, load_config_from_xml_path};

/// Set to `1`/`true` to skip rename and always copy + verify + delete.
pub const FORCE_COPY_ENV: &str = "FS_CLEANER_FORCE_COPY";

/// True when `$FS_CLEANER_FORCE_COPY` is set to a truthy value.
pub fn force_copy_from_env() -> bool {
    std::env::var(FORCE_COPY_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
