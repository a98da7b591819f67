//! Core types for guard violations.

use serde::{Deserialize, Serialize};

/// Severity level for guard violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message, does not fail a check.
    Info,
    /// Warning; fails only strict (CI) checks.
    Warn,
    /// Error that must be fixed.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown severity `{other}`")),
        }
    }
}

/// Identifier of a guard rule.
///
/// Serialized in `SCREAMING_SNAKE_CASE` (e.g. `LAYER_BACKWARD_IMPORT`), which is
/// part of the report contract consumed by downstream formatters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleId {
    /// A more core layer imports a more outward one.
    LayerBackwardImport,
    /// A page imports another page.
    PageToPageImport,
    /// A page, layout or route imports outside its allow-list.
    FsrouteDisallowedImport,
}

/// Rules whose violations may be corrected mechanically.
///
/// A violation of one of these rules is only flagged auto-correctable when a
/// concrete specifier rewrite was bound to it during evaluation.
pub const AUTO_CORRECTABLE_RULES: &[RuleId] =
    &[RuleId::LayerBackwardImport, RuleId::FsrouteDisallowedImport];

impl RuleId {
    /// All rules, in reporting order.
    pub const ALL: [RuleId; 3] = [
        Self::LayerBackwardImport,
        Self::PageToPageImport,
        Self::FsrouteDisallowedImport,
    ];

    /// Wire name of the rule.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LayerBackwardImport => "LAYER_BACKWARD_IMPORT",
            Self::PageToPageImport => "PAGE_TO_PAGE_IMPORT",
            Self::FsrouteDisallowedImport => "FSROUTE_DISALLOWED_IMPORT",
        }
    }

    /// Severity assigned to violations of this rule.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            Self::LayerBackwardImport | Self::FsrouteDisallowedImport => Severity::Error,
            Self::PageToPageImport => Severity::Warn,
        }
    }

    /// Human-readable description of what the rule enforces.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::LayerBackwardImport => {
                "A layer may only import from layers below it in the hierarchy"
            }
            Self::PageToPageImport => "Pages must not import other pages",
            Self::FsrouteDisallowedImport => {
                "Pages, layouts and routes may only import from their allowed layers"
            }
        }
    }

    /// Whether the rule is in the declared auto-correctable set.
    #[must_use]
    pub fn is_auto_correctable(self) -> bool {
        AUTO_CORRECTABLE_RULES.contains(&self)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mechanical correction bound to a violation: rewrite one import specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFix {
    /// Specifier text as written in the source (without quotes).
    pub specifier: String,
    /// Specifier to write instead.
    pub replacement: String,
    /// Project-relative path of the file the replacement resolves to.
    pub via: String,
}

/// A guard violation found on one import edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Rule that produced this violation.
    pub rule_id: RuleId,
    /// Severity of this violation.
    pub severity: Severity,
    /// Project-relative path of the importing file, `/`-separated.
    pub file: String,
    /// Line of the import (1-indexed).
    pub line: usize,
    /// Layer of the importing file.
    pub from_layer: String,
    /// Layer of the imported file.
    pub to_layer: String,
    /// Description of the rule.
    pub rule_description: String,
    /// How to resolve the violation.
    pub suggestion: String,
    /// Whether a mechanical correction is bound to this violation.
    pub auto_correctable: bool,
    /// Project-relative path of the imported file.
    #[serde(skip)]
    pub target: String,
    /// The bound correction, if any. Never serialized.
    #[serde(skip)]
    pub fix: Option<ImportFix>,
}

impl Violation {
    /// Creates a new violation with the rule's default severity and description.
    #[must_use]
    pub fn new(
        rule_id: RuleId,
        file: impl Into<String>,
        line: usize,
        from_layer: impl Into<String>,
        to_layer: impl Into<String>,
    ) -> Self {
        Self {
            rule_id,
            severity: rule_id.default_severity(),
            file: file.into(),
            line,
            from_layer: from_layer.into(),
            to_layer: to_layer.into(),
            rule_description: rule_id.description().to_string(),
            suggestion: String::new(),
            auto_correctable: false,
            target: String::new(),
            fix: None,
        }
    }

    /// Sets the suggestion text.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    /// Records the imported file.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Binds a mechanical correction.
    ///
    /// The violation only becomes auto-correctable if its rule is in
    /// [`AUTO_CORRECTABLE_RULES`]; otherwise the fix is dropped.
    #[must_use]
    pub fn with_fix(mut self, fix: ImportFix) -> Self {
        if self.rule_id.is_auto_correctable() {
            self.auto_correctable = true;
            self.fix = Some(fix);
        }
        self
    }

    /// Identity of the violation independent of wording and bound fixes.
    #[must_use]
    pub fn key(&self) -> ViolationKey {
        ViolationKey {
            rule_id: self.rule_id,
            file: self.file.clone(),
            line: self.line,
            from_layer: self.from_layer.clone(),
            to_layer: self.to_layer.clone(),
            target: self.target.clone(),
        }
    }

    /// Formats the violation for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = format!("{} at {}:{}\n", self.rule_id, self.file, self.line);
        let _ = writeln!(
            output,
            "  {}: {} -> {}: {}",
            self.severity, self.from_layer, self.to_layer, self.rule_description
        );
        if !self.suggestion.is_empty() {
            let _ = writeln!(output, "  = help: {}", self.suggestion);
        }
        if self.auto_correctable {
            let _ = writeln!(output, "  = auto-correctable");
        }
        output
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {} -> {}",
            self.file, self.line, self.severity, self.rule_id, self.from_layer, self.to_layer
        )
    }
}

/// Hashable identity of a [`Violation`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViolationKey {
    /// Rule.
    pub rule_id: RuleId,
    /// Importing file.
    pub file: String,
    /// Import line.
    pub line: usize,
    /// Importing layer.
    pub from_layer: String,
    /// Imported layer.
    pub to_layer: String,
    /// Imported file.
    pub target: String,
}
