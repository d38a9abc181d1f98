//! Plain text output formatting.
//!
//! Log lines are printed as they were logged, colored by severity.

use crate::session::{LogLine, Outcome, ScanReport, Severity};
use console::{style, Style, StyledObject};
use std::io::{self, Write};

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Info => Style::new(),
        Severity::Success => Style::new().green().bold(),
        Severity::Warning => Style::new().yellow(),
        Severity::Error => Style::new().red(),
    }
}

/// A log line with its severity color applied.
pub fn styled_line(line: &LogLine) -> StyledObject<&str> {
    severity_style(line.severity).apply_to(line.text.as_str())
}

/// Print one log line to stdout.
pub fn print_line(line: &LogLine) {
    println!("{}", styled_line(line));
}

/// Print the closing summary of a finished scan.
pub fn print_summary(report: &ScanReport) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let outcome = match report.outcome {
        Outcome::Completed => style("completed").green().bold(),
        Outcome::Stopped => style("stopped").yellow().bold(),
    };

    writeln!(out)?;
    writeln!(
        out,
        "  {} {} ({})",
        style("Session:").bold(),
        style(report.session.short()).dim(),
        outcome
    )?;
    writeln!(
        out,
        "  {} {}/{} probes, {} open",
        style("Statistics:").bold(),
        report.progress.completed,
        report.progress.total,
        style(report.progress.open).green().bold()
    )?;
    writeln!(out)?;
    Ok(())
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}
