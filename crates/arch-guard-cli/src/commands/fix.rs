//! Fix command implementation.

use anyhow::{Context, Result};
use arch_guard::{check_directory, AutoCorrectEngine, MemorySnapshot, Report};
use std::path::Path;

use super::output;
use super::GlobalOptions;
use crate::OutputFormat;

/// Runs the fix command.
pub fn run(path: &Path, dry_run: bool, format: OutputFormat, options: &GlobalOptions) -> Result<()> {
    let manifest = options.manifest(path)?;
    let strict = manifest.config.guard.ci;

    let report = check_directory(&manifest.registry, &manifest.config, path)
        .with_context(|| format!("Failed to check {}", path.display()))?;
    let correctable = report.auto_correctable();

    if dry_run {
        match format {
            OutputFormat::Json => output::print_json(&correctable)?,
            OutputFormat::Compact => {
                for v in &correctable {
                    if let Some(fix) = &v.fix {
                        println!("{}:{}: '{}' -> '{}'", v.file, v.line, fix.specifier, fix.replacement);
                    }
                }
            }
            OutputFormat::Text => {
                for v in &correctable {
                    output::print_violation(v);
                }
                println!(
                    "{} of {} violation(s) can be corrected",
                    correctable.len(),
                    report.total_violations
                );
            }
        }
        return Ok(());
    }

    let engine = AutoCorrectEngine::new(MemorySnapshot::new());
    let result = engine
        .run(&report.violations, &manifest, path)
        .context("Auto-correction failed")?;

    if let OutputFormat::Json = format {
        output::print_json(&result)?;
    } else {
        for step in &result.steps {
            println!(
                "{} {}: {}",
                output::status_label(step.success),
                step.action,
                step.message
            );
        }
        if result.fixed {
            println!(
                "Committed {} correction(s) as {}",
                correctable.len(),
                result.change_id.as_deref().unwrap_or("-")
            );
        } else if result.rolled_back {
            println!("Corrections were not committed; the tree was restored");
        } else {
            println!("Nothing to correct");
        }
    }

    let remaining = Report::aggregate(report.files_analyzed, result.remaining_violations);
    if !remaining.passes(strict) {
        if !matches!(format, OutputFormat::Json) {
            println!("{}", remaining.summary_line());
        }
        std::process::exit(1);
    }

    Ok(())
}
