//! Output formatting module.
//!
//! Renders event log lines and final reports as colored plain text or JSON.

mod json_format;
mod plain;

pub use json_format::print_json;
pub use plain::{
    print_error, print_info, print_line, print_summary, print_success, print_warning, styled_line,
};

use crate::cli::OutputFormat;
use crate::session::ScanReport;
use std::io;

/// Print the closing output for `report` according to `format`.
///
/// Plain output has already streamed the log, so only the summary is left.
pub fn format_report(report: &ScanReport, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::print_summary(report),
        OutputFormat::Json => json_format::print_json(report),
    }
}
