//! Report aggregation.
//!
//! [`Report::aggregate`] is a pure reduction: identical inputs always produce
//! an identical report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Severity, Violation};

/// Violation counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Error count.
    pub error: usize,
    /// Warning count.
    pub warn: usize,
    /// Info count.
    pub info: usize,
}

impl SeverityCounts {
    /// Increments the bucket for `severity`.
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warn => self.warn += 1,
            Severity::Info => self.info += 1,
        }
    }

    /// Count for one severity.
    #[must_use]
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Error => self.error,
            Severity::Warn => self.warn,
            Severity::Info => self.info,
        }
    }

    /// Sum over all severities.
    #[must_use]
    pub fn total(&self) -> usize {
        self.error + self.warn + self.info
    }
}

/// Result of a guard check.
///
/// Field names are a compatibility contract for downstream formatters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Number of files that were read, parsed and classified.
    pub files_analyzed: usize,
    /// Number of violations.
    pub total_violations: usize,
    /// Counts per severity.
    pub by_severity: SeverityCounts,
    /// Counts per rule id.
    pub by_type: BTreeMap<String, usize>,
    /// Violations ordered by `(file, line)`.
    pub violations: Vec<Violation>,
}

impl Report {
    /// Reduces analyzed files and violations into a report.
    #[must_use]
    pub fn aggregate(files_analyzed: usize, mut violations: Vec<Violation>) -> Self {
        sort_violations(&mut violations);

        let mut by_severity = SeverityCounts::default();
        let mut by_type = BTreeMap::new();
        for v in &violations {
            by_severity.add(v.severity);
            *by_type.entry(v.rule_id.as_str().to_string()).or_insert(0) += 1;
        }

        Self {
            files_analyzed,
            total_violations: violations.len(),
            by_severity,
            by_type,
            violations,
        }
    }

    /// Returns true if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.by_severity.error > 0
    }

    /// Pass/fail verdict. Strict callers also fail on warnings.
    #[must_use]
    pub fn passes(&self, strict: bool) -> bool {
        !self.has_errors() && !(strict && self.by_severity.warn > 0)
    }

    /// Violations that carry a bound mechanical fix.
    #[must_use]
    pub fn auto_correctable(&self) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.auto_correctable).collect()
    }

    /// One-line summary.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "Found {} error(s), {} warning(s), {} info(s) in {} file(s)",
            self.by_severity.error, self.by_severity.warn, self.by_severity.info, self.files_analyzed
        )
    }
}

/// Sorts violations by file, then line, then rule and target for a total order.
pub fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then(a.line.cmp(&b.line))
            .then(a.rule_id.cmp(&b.rule_id))
            .then(a.to_layer.cmp(&b.to_layer))
            .then(a.target.cmp(&b.target))
    });
}
