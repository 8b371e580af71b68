use std::io::{IsTerminal, Write};
use std::sync::Arc;

use drivesync_core::domain::format_size;
use drivesync_core::ports::{ISyncReporter, ProgressFn, SyncEvent};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
}

/// JSON output formatter, one object per line
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", value);
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Left-aligned text table with columns sized to their widest cell
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self, show_header: bool) -> String {
        let mut widths: Vec<usize> = if show_header {
            self.headers.iter().map(|h| h.chars().count()).collect()
        } else {
            vec![0; self.headers.len()]
        };
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        if show_header {
            let header: Vec<String> = self.headers.iter().map(|h| h.to_string()).collect();
            lines.push(render_row(&header, &widths));
        }
        lines.extend(self.rows.iter().map(|row| render_row(row, &widths)));
        lines.join("\n")
    }
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    line.join("  ").trim_end().to_string()
}

// ============================================================================
// Sync reporters
// ============================================================================

/// Prints the engine's progress lines to stdout
pub struct HumanReporter {
    quiet: bool,
    show_progress: bool,
}

impl HumanReporter {
    pub fn new(quiet: bool, show_progress: bool) -> Self {
        Self {
            quiet,
            show_progress,
        }
    }
}

impl ISyncReporter for HumanReporter {
    fn report(&self, event: &SyncEvent) {
        if self.quiet {
            return;
        }
        println!("{event}");
    }

    fn progress(&self) -> Option<ProgressFn> {
        if self.quiet || !self.show_progress || !std::io::stderr().is_terminal() {
            return None;
        }
        Some(Arc::new(|done, total| {
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "\r{}", progress_line(done, total));
            if done >= total {
                let _ = writeln!(err);
            }
        }))
    }
}

/// `  42% of 1.5 MB`
fn progress_line(done: u64, total: u64) -> String {
    let percent = if total == 0 {
        100
    } else {
        done.saturating_mul(100) / total
    };
    format!("{percent:>4}% of {}", format_size(total, false))
}

/// Emits every event as one JSON object per line
pub struct JsonReporter;

impl ISyncReporter for JsonReporter {
    fn report(&self, event: &SyncEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize sync event"),
        }
    }
}
