//! Violation statistics over time.
//!
//! Each recorded scan appends a [`ScanRecord`] to
//! `<root>/.arch-guard/statistics.json`. The store is append-only and never
//! pruned; concurrent writers are last-writer-wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use arch_guard_core::{Report, SeverityCounts, Violation};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Directory holding guard state inside a root.
pub const STATE_DIR: &str = ".arch-guard";

/// File name of the statistics store.
pub const STATISTICS_FILE: &str = "statistics.json";

/// Relative change below which a trend counts as stable, in percent.
pub const STABLE_THRESHOLD_PERCENT: f64 = 5.0;

/// Summary of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    /// When the scan ran.
    pub timestamp: DateTime<Utc>,
    /// Preset the scan was judged against.
    pub preset: String,
    /// Number of violations.
    pub total_violations: usize,
    /// Counts per severity.
    pub by_severity: SeverityCounts,
    /// Counts per rule id.
    pub by_type: BTreeMap<String, usize>,
    /// Number of files analyzed.
    pub files_analyzed: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StatisticsFile {
    records: Vec<ScanRecord>,
}

/// Direction of a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Fewer violations than at the start of the window.
    Improving,
    /// More violations than at the start of the window.
    Degrading,
    /// Within the stable threshold, or too few records.
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Degrading => write!(f, "degrading"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// Violation trend over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    /// Direction.
    pub trend: TrendDirection,
    /// Latest minus earliest total.
    pub violation_delta: i64,
    /// Delta relative to the earliest total, in percent.
    pub violation_change_percent: f64,
    /// Records inside the window.
    pub records_in_window: usize,
    /// What to do about it.
    pub recommendations: Vec<String>,
}

/// Violations crossing one layer boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryCount {
    /// Importing layer.
    pub from_layer: String,
    /// Imported layer.
    pub to_layer: String,
    /// Number of violations.
    pub count: usize,
}

/// Where violations concentrate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStatistics {
    /// Boundaries, most violated first.
    pub by_boundary: Vec<BoundaryCount>,
    /// Violations per offending (importing) layer.
    pub by_layer: BTreeMap<String, usize>,
    /// The most violated boundary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_violated: Option<BoundaryCount>,
}

/// Statistics store failures.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// The store could not be read or written.
    #[error("statistics I/O error at {}: {source}", path.display())]
    Io {
        /// Store path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The store exists but is not valid.
    #[error("corrupt statistics file {}: {source}", path.display())]
    Corrupt {
        /// Store path.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Location of the statistics store for `root`.
#[must_use]
pub fn statistics_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join(STATISTICS_FILE)
}

/// Summarizes a report, stamped with the current time.
#[must_use]
pub fn create_scan_record(report: &Report, preset: &str) -> ScanRecord {
    ScanRecord {
        timestamp: Utc::now(),
        preset: preset.to_string(),
        total_violations: report.total_violations,
        by_severity: report.by_severity,
        by_type: report.by_type.clone(),
        files_analyzed: report.files_analyzed,
    }
}

/// Loads every record for `root`. A missing store is empty.
///
/// # Errors
///
/// Returns an error if the store cannot be read or does not parse.
pub fn load_statistics(root: &Path) -> Result<Vec<ScanRecord>, StatsError> {
    let path = statistics_path(root);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(StatsError::Io { path, source }),
    };
    let file: StatisticsFile =
        serde_json::from_str(&content).map_err(|source| StatsError::Corrupt { path, source })?;
    Ok(file.records)
}

/// Appends a record to the store for `root`.
///
/// # Errors
///
/// Returns an error if the store cannot be read, parsed or written.
pub fn add_scan_record(root: &Path, record: ScanRecord) -> Result<(), StatsError> {
    let path = statistics_path(root);
    let mut records = load_statistics(root)?;
    records.push(record);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StatsError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(&StatisticsFile { records })
        .map_err(|source| StatsError::Corrupt {
            path: path.clone(),
            source,
        })?;
    std::fs::write(&path, json).map_err(|source| StatsError::Io {
        path: path.clone(),
        source,
    })?;
    debug!("Recorded scan in {}", path.display());
    Ok(())
}

/// Trend over the trailing `window_days`, relative to now.
#[must_use]
pub fn analyze_trend(records: &[ScanRecord], window_days: i64) -> Trend {
    analyze_trend_at(records, window_days, Utc::now())
}

/// Trend over the `window_days` before `now`.
///
/// A window reaching past the representable calendar covers every record.
#[must_use]
pub fn analyze_trend_at(records: &[ScanRecord], window_days: i64, now: DateTime<Utc>) -> Trend {
    let start = TimeDelta::try_days(window_days).and_then(|d| now.checked_sub_signed(d));
    let mut window: Vec<&ScanRecord> = records
        .iter()
        .filter(|r| start.map_or(true, |start| r.timestamp >= start) && r.timestamp <= now)
        .collect();
    window.sort_by_key(|r| r.timestamp);

    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return Trend {
            trend: TrendDirection::Stable,
            violation_delta: 0,
            violation_change_percent: 0.0,
            records_in_window: 0,
            recommendations: vec![
                "No scans recorded in this window; run `arch-guard check --record` to start tracking"
                    .to_string(),
            ],
        };
    };

    let earliest = count(first.total_violations);
    let latest = count(last.total_violations);
    let delta = latest - earliest;
    #[allow(clippy::cast_precision_loss)]
    let percent = if earliest == 0 {
        if latest > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        delta as f64 / earliest as f64 * 100.0
    };

    let trend = if window.len() < 2 || percent.abs() < STABLE_THRESHOLD_PERCENT {
        TrendDirection::Stable
    } else if delta < 0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Degrading
    };

    Trend {
        trend,
        violation_delta: delta,
        violation_change_percent: (percent * 10.0).round() / 10.0,
        records_in_window: window.len(),
        recommendations: recommendations(trend, first, last),
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn recommendations(trend: TrendDirection, first: &ScanRecord, last: &ScanRecord) -> Vec<String> {
    let mut out = Vec::new();
    match trend {
        TrendDirection::Degrading => {
            let growth = [
                ("error", count(last.by_severity.error) - count(first.by_severity.error)),
                ("warning", count(last.by_severity.warn) - count(first.by_severity.warn)),
                ("info", count(last.by_severity.info) - count(first.by_severity.info)),
            ];
            if let Some((bucket, grew)) = growth
                .iter()
                .filter(|(_, g)| *g > 0)
                .max_by_key(|(_, g)| *g)
            {
                out.push(match *bucket {
                    "error" => format!(
                        "Errors grew by {grew}; fail builds on `arch-guard check` until the count drops"
                    ),
                    "warning" => format!(
                        "Warnings grew by {grew}; enable strict mode (`ci = true`) to stop new ones landing"
                    ),
                    _ => format!("Informational findings grew by {grew}; review them before they become errors"),
                });
            }
            if let Some((rule, grew)) = fastest_growing_rule(first, last) {
                out.push(format!("Most new violations are {rule} (+{grew})"));
            }
        }
        TrendDirection::Improving => {
            out.push(format!(
                "Violations fell from {} to {}; keep going",
                first.total_violations, last.total_violations
            ));
            if last.total_violations == 0 {
                out.push("No violations remain; run `arch-guard check --ci` in CI to keep it that way".to_string());
            }
        }
        TrendDirection::Stable => {
            if last.total_violations == 0 {
                out.push("No violations; keep `arch-guard check --ci` in CI".to_string());
            } else if let Some((rule, n)) = last.by_type.iter().max_by_key(|(_, n)| **n) {
                out.push(format!(
                    "{} violation(s) persist; start with {rule} ({n})",
                    last.total_violations
                ));
            }
        }
    }
    out
}

fn fastest_growing_rule(first: &ScanRecord, last: &ScanRecord) -> Option<(String, i64)> {
    last.by_type
        .iter()
        .map(|(rule, n)| {
            let before = first.by_type.get(rule).copied().unwrap_or(0);
            (rule.clone(), count(*n) - count(before))
        })
        .filter(|(_, grew)| *grew > 0)
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
}

/// Counts violations per layer boundary and per offending layer.
///
/// Boundaries are ordered by count (descending), then by the hierarchy rank
/// of the importing and imported layers.
#[must_use]
pub fn calculate_layer_statistics(violations: &[Violation], hierarchy: &[String]) -> LayerStatistics {
    let rank = |layer: &str| hierarchy.iter().position(|l| l == layer).unwrap_or(usize::MAX);

    let mut boundaries: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut by_layer: BTreeMap<String, usize> = BTreeMap::new();
    for v in violations {
        *boundaries
            .entry((v.from_layer.clone(), v.to_layer.clone()))
            .or_insert(0) += 1;
        *by_layer.entry(v.from_layer.clone()).or_insert(0) += 1;
    }

    let mut by_boundary: Vec<BoundaryCount> = boundaries
        .into_iter()
        .map(|((from_layer, to_layer), count)| BoundaryCount {
            from_layer,
            to_layer,
            count,
        })
        .collect();
    by_boundary.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(rank(&a.from_layer).cmp(&rank(&b.from_layer)))
            .then(rank(&a.to_layer).cmp(&rank(&b.to_layer)))
            .then(a.from_layer.cmp(&b.from_layer))
            .then(a.to_layer.cmp(&b.to_layer))
    });

    LayerStatistics {
        most_violated: by_boundary.first().cloned(),
        by_boundary,
        by_layer,
    }
}
