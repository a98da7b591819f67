//! Subcommand implementations.

pub mod check;
pub mod fix;
pub mod init;
pub mod output;
pub mod presets;
pub mod stats;
pub mod watch;

use anyhow::{Context, Result};
use arch_guard::GuardManifest;
use std::path::{Path, PathBuf};

use crate::config_resolver;

/// Options shared by every subcommand.
pub struct GlobalOptions {
    /// `--config`.
    pub config: Option<PathBuf>,
    /// `--preset`.
    pub preset: Option<String>,
}

impl GlobalOptions {
    /// Resolves and loads the configuration for `project`, applies the preset
    /// override and builds the preset registry.
    pub fn manifest(&self, project: &Path) -> Result<GuardManifest> {
        let source = config_resolver::resolve(project, self.config.as_deref());
        let mut config = source.load()?;
        if let Some(preset) = &self.preset {
            config.guard.preset.clone_from(preset);
        }
        GuardManifest::from_config(config).context("Invalid configuration")
    }
}
