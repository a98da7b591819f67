//! Shared output formatting for guard results.

use anyhow::Result;
use arch_guard::{Report, Severity, Violation};
use serde::Serialize;

use crate::OutputFormat;

/// Print a report in the specified format.
pub fn print(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print_text(report),
        OutputFormat::Json => return print_json(report),
        OutputFormat::Compact => print_compact(&report.violations),
    }
    Ok(())
}

/// Pretty-printed JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Terminal colors used by text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Yellow,
    Green,
    Blue,
}

impl Color {
    const fn code(self) -> &'static str {
        match self {
            Self::Red => "31",
            Self::Yellow => "33",
            Self::Green => "32",
            Self::Blue => "34",
        }
    }
}

/// Wraps `text` in the escape sequence for `color`.
pub(crate) fn paint(color: Color, text: &str) -> String {
    format!("\x1b[{}m{text}\x1b[0m", color.code())
}

pub(crate) fn severity_label(severity: Severity) -> String {
    match severity {
        Severity::Error => paint(Color::Red, "error"),
        Severity::Warn => paint(Color::Yellow, "warning"),
        Severity::Info => paint(Color::Blue, "info"),
    }
}

/// `ok` or `failed` for a step outcome.
pub(crate) fn status_label(success: bool) -> String {
    if success {
        paint(Color::Green, "ok")
    } else {
        paint(Color::Red, "failed")
    }
}

/// One violation, multi-line, followed by a blank line.
pub fn print_violation(violation: &Violation) {
    println!(
        "{} at {}:{}",
        violation.rule_id, violation.file, violation.line
    );
    println!(
        "  {}: {} -> {}: {}",
        severity_label(violation.severity),
        violation.from_layer,
        violation.to_layer,
        violation.rule_description
    );
    if !violation.suggestion.is_empty() {
        println!("  = help: {}", violation.suggestion);
    }
    if let Some(fix) = &violation.fix {
        println!("  = fix: import '{}' instead", fix.replacement);
    }
    println!();
}

fn print_text(report: &Report) {
    for violation in &report.violations {
        print_violation(violation);
    }

    println!("{}", paint(summary_color(report), &report.summary_line()));
}

fn summary_color(report: &Report) -> Color {
    if report.by_severity.error > 0 {
        Color::Red
    } else if report.by_severity.warn > 0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

/// `file:line: severity [RULE] from -> to`, one per line.
pub fn print_compact(violations: &[Violation]) {
    for violation in violations {
        println!("{violation}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_share_one_palette() {
        assert_eq!(status_label(true), paint(Color::Green, "ok"));
        assert_eq!(status_label(false), "\x1b[31mfailed\x1b[0m");
        assert_eq!(severity_label(Severity::Error), paint(Color::Red, "error"));
        assert_eq!(severity_label(Severity::Warn), "\x1b[33mwarning\x1b[0m");
    }

    #[test]
    fn summary_color_follows_worst_severity() {
        assert_eq!(summary_color(&Report::aggregate(3, Vec::new())), Color::Green);
    }
}
