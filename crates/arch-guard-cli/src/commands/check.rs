//! Check command implementation.

use anyhow::{Context, Result};
use arch_guard::{add_scan_record, check_directory, create_scan_record};
use std::path::Path;

use super::GlobalOptions;
use crate::OutputFormat;

/// Runs the check command.
pub fn run(
    path: &Path,
    format: OutputFormat,
    ci: bool,
    record: bool,
    options: &GlobalOptions,
) -> Result<()> {
    let manifest = options.manifest(path)?;
    let strict = ci || manifest.config.guard.ci;

    let report = check_directory(&manifest.registry, &manifest.config, path)
        .with_context(|| format!("Failed to check {}", path.display()))?;

    super::output::print(&report, format)?;

    if record {
        let scan = create_scan_record(&report, &manifest.config.guard.preset);
        add_scan_record(path, scan).context("Failed to record scan statistics")?;
        tracing::info!("Recorded scan in {}", arch_guard::stats::statistics_path(path).display());
    }

    if !report.passes(strict) {
        std::process::exit(1);
    }

    Ok(())
}
