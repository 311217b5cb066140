//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the signal handler,
//! and dispatches the subcommand. Returns the process exit code.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use fs_cleaner::cli::{Args, Command};
use fs_cleaner::config::{
    create_template_config, default_config_path, force_copy_from_env, load_config, load_config_from_xml_path,
    Config, CONFIG_ENV,
};
use fs_cleaner::output as out;
use fs_cleaner::pipeline::{self, Analysis, PipelineOptions};
use fs_cleaner::report::render;
use fs_cleaner::{shutdown, FlattenError, MoveResult, RollbackOutcome};

use crate::logging::init_tracing;

pub const EXIT_OK: i32 = 0;
pub const EXIT_RISKS: i32 = 1;

/// Run the CLI application.
pub fn run(args: Args) -> i32 {
    if args.print_config {
        print_config_location(args.config.as_deref());
        return EXIT_OK;
    }
    if args.init_config {
        return match init_config(args.config.as_deref()) {
            Ok(path) => {
                out::print_success(&format!("Template config written to {}", path.display()));
                EXIT_OK
            }
            Err(e) => {
                out::print_error(&format!("{e:#}"));
                EXIT_RISKS
            }
        };
    }

    let Some(command) = args.command.clone() else {
        out::print_error("no subcommand given; try `fs-cleaner --help`");
        return EXIT_RISKS;
    };

    let cfg = match resolve_config(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            out::print_error(&format!("{e:#}"));
            return EXIT_RISKS;
        }
    };

    // Initialize logging and capture the guard so we can drop it on signal
    let guard_opt = match init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json_logs) {
        Ok(g) => g,
        Err(e) => {
            out::print_error(&format!("Failed to initialize logging: {e:#}"));
            return EXIT_RISKS;
        }
    };

    // Guard needs to be dropped on SIGINT to flush logs
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        let installed = ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; stopping after the current entry...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
        });
        if let Err(e) = installed {
            error!(error = %e, "failed to install interrupt handler; Ctrl-C will terminate immediately");
        }
    }

    debug!(?command, "starting fs-cleaner");
    let opts = cfg.pipeline_options();
    let code = dispatch(&command, &opts);

    // Ensure logs are flushed before exit
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    code
}

fn print_config_location(explicit: Option<&Path>) {
    if let Some(p) = explicit {
        out::print_info(&format!("Using --config:\n  {}", p.display()));
        return;
    }
    if let Ok(env) = std::env::var(CONFIG_ENV) {
        out::print_info(&format!("Using {CONFIG_ENV} (explicit):\n  {env}"));
        return;
    }
    match default_config_path() {
        Some(p) => {
            out::print_info(&format!("Default fs_cleaner config path:\n  {}", p.display()));
            if p.exists() {
                out::print_info("A config file exists at that location.");
            } else {
                out::print_info("No config file exists there yet. Run with --init-config to create a template.");
            }
        }
        None => out::print_error("Could not determine a default config path."),
    }
}

fn init_config(explicit: Option<&Path>) -> Result<PathBuf> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => default_config_path().context("no config directory available; pass --config")?,
    };
    create_template_config(&path)?;
    Ok(path)
}

/// Config file (explicit or default), then CLI overrides, then validation.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut cfg = match &args.config {
        Some(path) => load_config_from_xml_path(path)?,
        None => load_config()?.map(|(_, cfg)| cfg).unwrap_or_default(),
    };
    args.apply_overrides(&mut cfg);
    if force_copy_from_env() {
        cfg.force_copy = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn dispatch(command: &Command, opts: &PipelineOptions) -> i32 {
    let outcome = match command {
        Command::Analyze { path } => pipeline::analyze(path, opts).and_then(|a| print_analysis(&a, false)),
        Command::Report { path, json } => pipeline::analyze(path, opts).and_then(|a| print_analysis(&a, *json)),
        Command::Apply { path, dry_run } => pipeline::apply(path, *dry_run, opts).map(|r| print_apply(&r)),
        Command::Rollback { path } => pipeline::rollback_with(&fs_cleaner::OsBackend, path, opts).map(print_rollback),
        Command::History { path } => pipeline::history(path).map(|journal| {
            if journal.runs.is_empty() {
                out::print_info("No journaled runs.");
            }
            for (i, run) in journal.runs.iter().enumerate() {
                out::print_user(&format!(
                    "{:>3}  {}  {} move(s), {} removed dir(s), {} skipped",
                    i + 1,
                    run.timestamp.to_rfc3339(),
                    run.records.len(),
                    run.removed_dirs.len(),
                    run.skipped.len()
                ));
            }
            EXIT_OK
        }),
    };
    outcome.unwrap_or_else(|e| report_error(&e))
}

fn print_analysis(analysis: &Analysis, json: bool) -> fs_cleaner::Result<i32> {
    let rendered = render(analysis, json)?;
    out::print_user(rendered.trim_end());
    Ok(if analysis.has_risks() { EXIT_RISKS } else { EXIT_OK })
}

fn print_apply(result: &MoveResult) -> i32 {
    if result.is_dry_run() {
        out::print_heading("Dry run: planned moves");
        for r in &result.records {
            out::print_user(&format!("  {} -> {}", r.source.display(), r.dest.display()));
        }
        if result.records.is_empty() {
            out::print_info("Nothing to flatten.");
        }
        return EXIT_OK;
    }
    for skipped in &result.skipped {
        out::print_warn(&format!("skipped unsupported entry {}", skipped.display()));
    }
    match &result.abort_reason {
        Some(reason) => {
            out::print_error(&format!(
                "apply aborted after {} move(s): {reason}. Completed moves are journaled; run `fs-cleaner rollback` to undo them.",
                result.records.len()
            ));
            reason.exit_code().max(2)
        }
        None => {
            info!(moved = result.records.len(), removed = result.removed_dirs.len(), "apply finished");
            out::print_success(&format!(
                "moved {} entr{}, removed {} nested director{}",
                result.records.len(),
                if result.records.len() == 1 { "y" } else { "ies" },
                result.removed_dirs.len(),
                if result.removed_dirs.len() == 1 { "y" } else { "ies" },
            ));
            EXIT_OK
        }
    }
}

fn print_rollback(outcome: RollbackOutcome) -> i32 {
    match outcome {
        RollbackOutcome::NothingToDo => out::print_info("Nothing to roll back."),
        RollbackOutcome::RolledBack { reversed, run } => out::print_success(&format!(
            "rolled back {reversed} move(s) from the run at {}",
            run.to_rfc3339()
        )),
    }
    EXIT_OK
}

fn report_error(e: &FlattenError) -> i32 {
    error!(code = e.code(), error = %e, "command failed");
    out::print_error(&e.to_string());
    if let FlattenError::RollbackIncomplete { remaining, .. } = e {
        for r in remaining {
            out::print_user(&format!("  outstanding: {} -> {}", r.dest.display(), r.source.display()));
        }
    }
    e.exit_code()
}
