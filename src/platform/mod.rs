//! Platform helpers. fs_cleaner targets Unix-like systems only; everything
//! that touches raw permissions or `access(2)` lives here.

mod unix;

pub use unix::{atomic_write_0600, has_write_access, open_log_file_secure_append, set_dir_mode_0700};
