//! One-shot checking: build the graph, evaluate it, aggregate a report.

use std::path::Path;

use arch_guard_core::{ConfigError, GuardConfig, PresetError, PresetRegistry, Report, Violation};
use arch_guard_graph::{GraphBuilder, GraphError, ImportGraph, RuleEvaluator};
use tracing::info;

/// Errors that prevent a check from producing a report.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum GuardError {
    /// The configuration is invalid.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    /// The active preset is unknown or invalid.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Preset(#[from] PresetError),

    /// The source tree could not be walked.
    #[error(transparent)]
    #[diagnostic(code(arch_guard::graph))]
    Graph(#[from] GraphError),
}

/// The presets and configuration a guard run is judged against.
#[derive(Debug, Clone)]
pub struct GuardManifest {
    /// Registered presets.
    pub registry: PresetRegistry,
    /// Active configuration.
    pub config: GuardConfig,
}

impl GuardManifest {
    /// Creates a manifest.
    #[must_use]
    pub fn new(registry: PresetRegistry, config: GuardConfig) -> Self {
        Self { registry, config }
    }

    /// Builds the registry from the configuration's custom presets.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or a custom preset is invalid.
    pub fn from_config(config: GuardConfig) -> Result<Self, GuardError> {
        config.validate()?;
        let registry = config.registry()?;
        Ok(Self { registry, config })
    }
}

/// A graph builder and rule evaluator bound to one root.
pub(crate) struct Pipeline {
    pub(crate) builder: GraphBuilder,
    pub(crate) evaluator: RuleEvaluator,
}

impl Pipeline {
    pub(crate) fn new(
        registry: &PresetRegistry,
        config: &GuardConfig,
        root: &Path,
    ) -> Result<Self, GuardError> {
        config.validate()?;
        let preset = registry.get(&config.guard.preset)?;
        let builder = GraphBuilder::new(root, preset, config)?;
        Ok(Self {
            builder,
            evaluator: RuleEvaluator::new(preset.clone()),
        })
    }

    /// Full build and evaluation.
    pub(crate) fn scan(&self) -> Result<(ImportGraph, Vec<Violation>), GuardError> {
        let graph = self.builder.build()?;
        let violations = self.evaluator.evaluate(&graph);
        Ok((graph, violations))
    }

    pub(crate) fn report(&self) -> Result<Report, GuardError> {
        let (graph, violations) = self.scan()?;
        Ok(Report::aggregate(graph.files_analyzed(), violations))
    }
}

/// Checks a source tree against the configured preset.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the preset is unknown,
/// or the root cannot be walked. Individual unreadable or unparsable files
/// are skipped, not reported as errors.
pub fn check_directory(
    registry: &PresetRegistry,
    config: &GuardConfig,
    root: &Path,
) -> Result<Report, GuardError> {
    let pipeline = Pipeline::new(registry, config, root)?;
    info!(
        "Checking {} with preset `{}`",
        pipeline.builder.root().display(),
        pipeline.evaluator.preset().name
    );
    let report = pipeline.report()?;
    info!("{}", report.summary_line());
    Ok(report)
}
