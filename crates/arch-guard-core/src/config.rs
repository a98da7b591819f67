//! Configuration types for arch-guard.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::paths::GlobPattern;
use crate::preset::{Preset, PresetError, PresetRegistry};

/// Default debounce window for watch mode, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Top-level configuration for arch-guard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Guard settings.
    #[serde(default)]
    pub guard: GuardSection,

    /// Import alias table: specifier prefix -> project-relative path prefix.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,

    /// Custom presets registered next to the built-ins.
    #[serde(default)]
    pub presets: Vec<Preset>,
}

/// The `[guard]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSection {
    /// Preset to enforce.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Glob patterns to include (if empty, all supported source files).
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns to exclude from analysis.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Watch-mode debounce window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum number of parallel file analyses.
    #[serde(default)]
    pub parallelism: Option<usize>,

    /// Strict mode: warnings fail the check as well.
    #[serde(default)]
    pub ci: bool,

    /// Retries per auto-correction step after an I/O failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GuardSection {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            include: Vec::new(),
            exclude: default_exclude(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            parallelism: None,
            ci: false,
            max_retries: default_max_retries(),
        }
    }
}

fn default_preset() -> String {
    "fsd".to_string()
}

fn default_exclude() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/dist/**".to_string(),
        "**/.arch-guard/**".to_string(),
    ]
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_max_retries() -> u32 {
    1
}

impl GuardConfig {
    /// Creates a default configuration enforcing `preset`.
    #[must_use]
    pub fn for_preset(preset: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.guard.preset = preset.into();
        config
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Validates settings that do not depend on the preset registry.
    ///
    /// # Errors
    ///
    /// Returns the first invalid glob or setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.include_patterns()?;
        self.exclude_patterns()?;

        if self.guard.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "guard.debounce_ms must be greater than zero".into(),
            ));
        }
        if self.guard.parallelism == Some(0) {
            return Err(ConfigError::Validation(
                "guard.parallelism must be greater than zero".into(),
            ));
        }
        for (prefix, target) in &self.aliases {
            if prefix.is_empty() {
                return Err(ConfigError::Validation("aliases: empty prefix".into()));
            }
            if target.starts_with('/') || target.split('/').any(|s| s == "..") {
                return Err(ConfigError::Validation(format!(
                    "aliases.{prefix}: target `{target}` must stay inside the project"
                )));
            }
        }
        Ok(())
    }

    /// Builds a preset registry with the built-ins plus the configured presets.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured preset is invalid.
    pub fn registry(&self) -> Result<PresetRegistry, PresetError> {
        PresetRegistry::new(self.presets.iter().cloned())
    }

    /// Compiled include patterns.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid glob syntax.
    pub fn include_patterns(&self) -> Result<Vec<GlobPattern>, ConfigError> {
        compile(&self.guard.include)
    }

    /// Compiled exclude patterns.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid glob syntax.
    pub fn exclude_patterns(&self) -> Result<Vec<GlobPattern>, ConfigError> {
        compile(&self.guard.exclude)
    }
}

fn compile(patterns: &[String]) -> Result<Vec<GlobPattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            GlobPattern::new(p).map_err(|reason| ConfigError::InvalidGlob {
                pattern: p.clone(),
                reason,
            })
        })
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {path}: {source}")]
    #[diagnostic(code(arch_guard::config::io))]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    #[diagnostic(
        code(arch_guard::config::parse),
        help("see `arch-guard init` for a commented template")
    )]
    Parse {
        /// Parse error message.
        message: String,
    },

    /// A glob pattern does not compile.
    #[error("Invalid glob pattern `{pattern}`: {reason}")]
    #[diagnostic(code(arch_guard::config::glob))]
    InvalidGlob {
        /// The pattern.
        pattern: String,
        /// Why it failed.
        reason: String,
    },

    /// A setting is out of range.
    #[error("config validation: {0}")]
    #[diagnostic(code(arch_guard::config::validation))]
    Validation(String),
}
