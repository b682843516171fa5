//! Text rendering of result tables.
//!
//! Pure formatting over the aggregator's output: a summary table plus one
//! detail block per site, using only the basic ASCII character set so the
//! output is safe for terminals and log files alike.

#![expect(
    clippy::cast_precision_loss,
    reason = "durations rendered here are far below 2^52 nanoseconds"
)]

use std::fmt::{self, Display};
use std::sync::Arc;
use std::path::Path;

use crate::tables::{DetailStats, ResultTables, SummaryRow};

impl Display for ResultTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.meta.lost_events > 0 {
            writeln!(
                f,
                "warning: {} event(s) lost because a thread's log could not grow",
                self.meta.lost_events
            )?;
        }
        if self.meta.clock_anomalies > 0 {
            writeln!(
                f,
                "warning: {} timestamp(s) clamped after the clock ran backwards",
                self.meta.clock_anomalies
            )?;
        }
        if self.meta.malformed_threads > 0 {
            writeln!(
                f,
                "warning: {} thread(s) produced a malformed event stream; no rows reported",
                self.meta.malformed_threads
            )?;
        }

        let mut window = TextTable::new(&["time total", "time tracked", "tracked %"]);
        window.add_row(vec![
            format_ns(self.time_total as f64),
            format_ns(self.time_tracked as f64),
            format_percent(self.time_tracked as f64, self.time_total as f64),
        ]);
        window.fmt(f)?;

        if self.summary.is_empty() {
            writeln!(f, "no scopes tracked in this window")?;
            return Ok(());
        }

        let center = center_interval(self.settings.non_center_percent);

        writeln!(f, "Summary")?;
        let mut summary = TextTable::new(&[
            "filename",
            "function",
            "line",
            "calls",
            "threads",
            &format!("ae{center}%"),
            "ae[0-100]%",
            "time ae[0-100]",
            "time a[0-100]",
        ]);
        for row in &self.summary {
            summary.add_row(summary_row_cells(row));
        }
        summary.fmt(f)?;

        writeln!(f, "Details")?;
        for details in &self.details {
            let mut info = TextTable::new(&[
                "filename", "function", "line", "time acc", "sd", "cv", "calls", "threads",
            ]);
            let summary_row = self
                .summary
                .iter()
                .find(|row| same_site(row, details));
            info.add_row(vec![
                short_filename(details.site.filename()),
                details.site.function_name().to_string(),
                details.site.line().to_string(),
                format_ns(details.time_accumulated as f64),
                format_ns(details.standard_deviation),
                format!("{:.2}", details.coefficient_of_variation),
                summary_row.map_or_else(String::new, |row| row.calls.to_string()),
                summary_row.map_or_else(String::new, |row| row.threads.to_string()),
            ]);
            info.fmt(f)?;

            let fastest = format!("fastest[0-{}]%", details.fastest_range);
            let slowest = format!("slowest[{}-100]%", details.slowest_range);
            let mut brackets = TextTable::new(&[
                &format!("{fastest} min"),
                &format!("{fastest} mean"),
                &format!("center{center} min"),
                "center mean",
                "center med",
                "center time a",
                "center time ae",
                "center max",
                &format!("{slowest} mean"),
                &format!("{slowest} max"),
            ]);
            brackets.add_row(vec![
                format_ns(details.fastest_min as f64),
                format_ns(details.fastest_mean),
                format_ns(details.center_min as f64),
                format_ns(details.center_mean),
                format_ns(details.center_median),
                format_ns(details.center_time_active as f64),
                format_ns(details.center_time_active_exclusive as f64),
                format_ns(details.center_max as f64),
                format_ns(details.slowest_mean),
                format_ns(details.slowest_max as f64),
            ]);
            brackets.fmt(f)?;

            writeln!(f)?;
        }

        Ok(())
    }
}

/// Rows pair up by site; summary and details are built together, so pointer
/// identity of the shared site is the cheap and sufficient check.
fn same_site(row: &SummaryRow, details: &DetailStats) -> bool {
    Arc::ptr_eq(&row.site, &details.site)
}

fn summary_row_cells(row: &SummaryRow) -> Vec<String> {
    vec![
        short_filename(row.site.filename()),
        row.site.function_name().to_string(),
        row.site.line().to_string(),
        row.calls.to_string(),
        row.threads.to_string(),
        format!("{:.2}%", row.percent_ae_bracket),
        format!("{:.2}%", row.percent_ae_all),
        format_ns(row.time_active_exclusive_all as f64),
        format_ns(row.time_active_all as f64),
    ]
}

fn center_interval(non_center_percent: u32) -> String {
    format!("[{}-{}]", non_center_percent, 100 - non_center_percent)
}

/// Formats nanoseconds with an adaptive unit, two decimals.
fn format_ns(nanoseconds: f64) -> String {
    const UNITS: [&str; 4] = ["ns", "us", "ms", "s"];

    let mut value = nanoseconds;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    format!("{:.2} {}", value, UNITS[unit])
}

fn format_percent(value: f64, total: f64) -> String {
    if total == 0.0 {
        "nan%".to_string()
    } else {
        format!("{:.2}%", 100.0 * value / total)
    }
}

/// Shortens a path to its file name, truncating very long names.
fn short_filename(full: &str) -> String {
    const MAX_LENGTH: usize = 35;

    let name = Path::new(full)
        .file_name()
        .map_or(full, |name| name.to_str().unwrap_or(full));

    if name.len() <= MAX_LENGTH {
        name.to_string()
    } else {
        let mut end = MAX_LENGTH - 3;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &name[..end])
    }
}

/// A plain ASCII table: header row, data rows, column widths sized to fit.
struct TextTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|&cell| cell.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn add_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.header.len());
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.header.iter().map(String::len).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }
        widths
    }
}

impl Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();

        let separator = {
            let mut line = String::from("+");
            for width in &widths {
                line.push_str(&"-".repeat(width + 2));
                line.push('+');
            }
            line
        };

        writeln!(f, "{separator}")?;
        write!(f, "|")?;
        for (cell, &width) in self.header.iter().zip(&widths) {
            write!(f, " {cell:^width$} |")?;
        }
        writeln!(f)?;
        writeln!(f, "{separator}")?;

        for row in &self.rows {
            write!(f, "|")?;
            for (cell, &width) in row.iter().zip(&widths) {
                write!(f, " {cell:>width$} |")?;
            }
            writeln!(f)?;
            writeln!(f, "{separator}")?;
        }

        Ok(())
    }
}
