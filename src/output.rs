//! User-facing lines, kept apart from diagnostic logs.
//! Colors only when the stream is a terminal.

use owo_colors::OwoColorize;
use std::fmt::Display;

fn stdout_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

fn stderr_tty() -> bool {
    atty::is(atty::Stream::Stderr)
}

pub fn print_info(msg: &str) {
    if stdout_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {msg}");
    }
}

pub fn print_warn(msg: &str) {
    if stderr_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {msg}");
    }
}

pub fn print_error(msg: &str) {
    if stderr_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {msg}");
    }
}

pub fn print_success(msg: &str) {
    if stdout_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {msg}");
    }
}

/// Section title for multi-line reports.
pub fn print_heading(title: impl Display) {
    if stdout_tty() {
        println!("{}", title.bold().underline());
    } else {
        println!("{title}");
    }
}

/// Plain line without prefix; scripts may parse these.
pub fn print_user(msg: &str) {
    println!("{msg}");
}
