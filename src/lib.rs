//! Core library for `fs_cleaner`.
//!
//! Finds directories that contain a child of the same name (`X/X`), checks
//! what flattening them would break, moves the inner entries up one level and
//! journals every move so the run can be rolled back.
//!
//! Entry points live in [`pipeline`]: [`analyze`], [`apply`], [`rollback`] and
//! [`history`]. [`report`] renders an analysis as text or JSON.

#[cfg(not(unix))]
compile_error!("fs_cleaner supports Unix-like systems only");

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod errors;
pub mod fs_ops;
pub mod ignore;
pub mod journal;
pub mod model;
pub mod mover;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod report;
pub mod scanner;
pub mod shutdown;

pub use analyzer::{detect_nesting, NestingScan};
pub use config::{Config, LogLevel};
pub use errors::{FlattenError, Result};
pub use fs_ops::{CopyOptions, MoveBackend, OsBackend};
pub use ignore::IgnoreSet;
pub use journal::{Journal, JournalRun, JournalStore, RollbackOutcome};
pub use model::{
    MoveRecord, MoveResult, NestingCandidate, PathWarning, RemovedDir, ScanReport, Strategy, SymlinkRisk,
};
pub use mover::{flatten, flatten_with};
pub use pipeline::{analyze, apply, apply_with, history, plan, rollback, rollback_with, Analysis, PipelineOptions};
pub use report::report;
pub use scanner::{scan, scan_with, ScanOptions};
