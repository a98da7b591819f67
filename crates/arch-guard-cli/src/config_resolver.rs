//! Configuration discovery and loading.
//!
//! The configuration file is looked up in this order:
//!
//! 1. `--config` flag (explicit path, trusted as-is)
//! 2. `{project}/arch-guard.toml`, then `{project}/.arch-guard.toml`
//! 3. `$ARCH_GUARD_CONFIG_DIR/config.toml`, else `~/.arch-guard/config.toml`
//! 4. Built-in defaults (`fsd` preset)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arch_guard::GuardConfig;

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Given with `--config`.
    Explicit(PathBuf),
    /// Found in the project directory.
    Project(PathBuf),
    /// Found in the user-wide config directory.
    Global(PathBuf),
    /// Nothing found.
    Default,
}

impl ConfigSource {
    /// The file to read, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Project(p) | Self::Global(p) => Some(p),
            Self::Default => None,
        }
    }

    /// Reads the configuration, falling back to defaults when nothing was
    /// found.
    pub fn load(&self) -> Result<GuardConfig> {
        let Some(path) = self.path() else {
            tracing::debug!("No configuration file; using defaults");
            return Ok(GuardConfig::default());
        };
        if matches!(self, Self::Global(_)) {
            tracing::info!("Using global config: {}", path.display());
        }
        GuardConfig::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
    }
}

const PROJECT_CONFIG_NAMES: &[&str] = &["arch-guard.toml", ".arch-guard.toml"];

const GLOBAL_CONFIG_NAME: &str = "config.toml";

/// Finds the configuration for `project_dir`.
#[must_use]
pub fn resolve(project_dir: &Path, explicit: Option<&Path>) -> ConfigSource {
    locate(project_dir, explicit, global_config_dir().as_deref())
}

fn locate(project_dir: &Path, explicit: Option<&Path>, global_dir: Option<&Path>) -> ConfigSource {
    if let Some(p) = explicit {
        return ConfigSource::Explicit(p.to_path_buf());
    }

    if let Some(found) = PROJECT_CONFIG_NAMES
        .iter()
        .map(|name| project_dir.join(name))
        .find(|candidate| candidate.is_file())
    {
        tracing::debug!("Found project config: {}", found.display());
        return ConfigSource::Project(found);
    }

    global_dir
        .map(|dir| dir.join(GLOBAL_CONFIG_NAME))
        .filter(|candidate| candidate.is_file())
        .map_or(ConfigSource::Default, |found| {
            tracing::debug!("Found global config: {}", found.display());
            ConfigSource::Global(found)
        })
}

/// The user-wide config directory: `$ARCH_GUARD_CONFIG_DIR`, else
/// `~/.arch-guard/`.
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("ARCH_GUARD_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    home::home_dir().map(|h| h.join(".arch-guard"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn explicit_wins_and_is_not_checked() {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("arch-guard.toml"), "").unwrap();

        let result = locate(project.path(), Some(Path::new("/nonexistent.toml")), None);
        assert_eq!(
            result,
            ConfigSource::Explicit(PathBuf::from("/nonexistent.toml"))
        );
    }

    #[test]
    fn plain_name_preferred_over_dot_prefix() {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join(".arch-guard.toml"), "").unwrap();
        assert_eq!(
            locate(project.path(), None, None),
            ConfigSource::Project(project.path().join(".arch-guard.toml"))
        );

        fs::write(project.path().join("arch-guard.toml"), "").unwrap();
        assert_eq!(
            locate(project.path(), None, None),
            ConfigSource::Project(project.path().join("arch-guard.toml"))
        );
    }

    #[test]
    fn global_is_a_fallback_only() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        assert_eq!(
            locate(project.path(), None, Some(global.path())),
            ConfigSource::Default
        );

        fs::write(global.path().join("config.toml"), "").unwrap();
        assert_eq!(
            locate(project.path(), None, Some(global.path())),
            ConfigSource::Global(global.path().join("config.toml"))
        );

        fs::write(project.path().join("arch-guard.toml"), "").unwrap();
        assert!(matches!(
            locate(project.path(), None, Some(global.path())),
            ConfigSource::Project(_)
        ));
    }

    #[test]
    fn default_source_loads_fsd() {
        let config = ConfigSource::Default.load().unwrap();
        assert_eq!(config.guard.preset, "fsd");
    }

    #[test]
    fn load_reads_the_preset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("arch-guard.toml");
        fs::write(&path, "[guard]\npreset = \"clean\"\nci = true\n").unwrap();

        let config = ConfigSource::Project(path).load().unwrap();
        assert_eq!(config.guard.preset, "clean");
        assert!(config.guard.ci);
    }

    #[test]
    fn load_reports_the_failing_file() {
        let err = ConfigSource::Explicit(PathBuf::from("/nonexistent/arch-guard.toml"))
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/arch-guard.toml"));
    }
}
