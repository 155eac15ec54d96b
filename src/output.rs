//! Colored terminal output for install phases and checks
//!
//! All user-facing progress goes through here so the library never prints
//! ad hoc. Uses owo-colors for color and indicatif for spinners.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Print an action header, e.g. "==> Installing oommf@20a2_20200608"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print a phase marker, e.g. "  -> configure"
pub fn phase(name: &str) {
    println!("  {} {}", "->".cyan(), name);
}

/// Print a detail line under the current phase
pub fn detail(message: &str) {
    println!("     {}", message.dimmed());
}

pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
}

pub fn info(message: &str) {
    println!("{} {}", "::".cyan(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Print the result of one smoke check
pub fn check(name: &str, purpose: &str, failure: Option<&str>) {
    match failure {
        None => println!("  {} {} {}", "PASS".green().bold(), name, purpose.dimmed()),
        Some(reason) => {
            println!("  {} {} {}", "FAIL".red().bold(), name, purpose.dimmed());
            println!("       {}", reason.red());
        }
    }
}

/// Print one row of a listing; `highlight` marks installed or preferred rows
pub fn list_item(name: &str, note: &str, highlight: bool) {
    if highlight {
        println!("  {} {}", name.green(), note.dimmed());
    } else {
        println!("  {} {}", name, note.dimmed());
    }
}

/// Byte progress bar for downloads; starts as a spinner until the length is known
pub fn download_progress(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("     {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICKS),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Switch a download spinner to a byte bar once content-length is known
pub fn upgrade_to_bytes(pb: &ProgressBar, total: u64) {
    pb.set_length(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("     {spinner:.cyan} [{bar:30.cyan/dim}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸━"),
    );
}

/// Spinner shown while an external command runs
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("     {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICKS),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Shorten a command line for display
pub fn truncate(cmd: &str, max: usize) -> String {
    if cmd.chars().count() > max {
        let head: String = cmd.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        cmd.to_string()
    }
}
