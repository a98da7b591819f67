//! Stats command implementation.

use anyhow::{Context, Result};
use arch_guard::{
    analyze_trend, calculate_layer_statistics, check_directory, load_statistics, LayerStatistics,
    Trend,
};
use serde::Serialize;
use std::path::Path;

use super::output;
use super::GlobalOptions;
use crate::OutputFormat;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsOutput {
    trend: Trend,
    #[serde(skip_serializing_if = "Option::is_none")]
    layers: Option<LayerStatistics>,
}

/// Runs the stats command.
pub fn run(
    path: &Path,
    days: i64,
    layers: bool,
    format: OutputFormat,
    options: &GlobalOptions,
) -> Result<()> {
    let records = load_statistics(path).context("Failed to read scan statistics")?;
    let trend = analyze_trend(&records, days);

    let layers = if layers {
        let manifest = options.manifest(path)?;
        let preset = manifest.registry.get(&manifest.config.guard.preset)?;
        let report = check_directory(&manifest.registry, &manifest.config, path)
            .with_context(|| format!("Failed to check {}", path.display()))?;
        Some(calculate_layer_statistics(&report.violations, &preset.hierarchy))
    } else {
        None
    };

    match format {
        OutputFormat::Json => output::print_json(&StatsOutput { trend, layers }),
        OutputFormat::Text | OutputFormat::Compact => {
            print_trend(&trend, records.len(), days);
            if let Some(stats) = &layers {
                print_layers(stats);
            }
            Ok(())
        }
    }
}

fn print_trend(trend: &Trend, total_records: usize, days: i64) {
    println!(
        "Trend over the last {days} day(s): {} ({} of {total_records} record(s))",
        trend.trend, trend.records_in_window
    );
    println!(
        "  violations: {:+} ({:+.1}%)",
        trend.violation_delta, trend.violation_change_percent
    );
    for recommendation in &trend.recommendations {
        println!("  = {recommendation}");
    }
}

fn print_layers(stats: &LayerStatistics) {
    println!();
    if stats.by_boundary.is_empty() {
        println!("No layer boundary is violated");
        return;
    }
    println!("Violations by boundary:");
    for boundary in &stats.by_boundary {
        println!(
            "  {:>5}  {} -> {}",
            boundary.count, boundary.from_layer, boundary.to_layer
        );
    }
    println!("Violations by layer:");
    for (layer, count) in &stats.by_layer {
        println!("  {count:>5}  {layer}");
    }
    if let Some(worst) = &stats.most_violated {
        println!(
            "Most violated: {} -> {} ({})",
            worst.from_layer, worst.to_layer, worst.count
        );
    }
}
