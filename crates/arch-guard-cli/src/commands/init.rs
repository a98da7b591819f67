//! Init command implementation.

use anyhow::{bail, Context, Result};
use arch_guard::PresetRegistry;
use std::path::Path;

const CONFIG_TEMPLATE: &str = r#"# arch-guard configuration

[guard]
# Layer hierarchy to enforce: mandu, fsd, clean, hexagonal, atomic,
# or a custom preset declared below.
preset = "{preset}"

# Glob patterns to include (empty: every .ts/.tsx/.js/.jsx/.mjs/.cjs file)
include = []

# Glob patterns to exclude from analysis
exclude = [
    "**/node_modules/**",
    "**/dist/**",
    "**/.arch-guard/**",
]

# Watch-mode debounce window
debounce_ms = 300

# Fail on warnings as well as errors
ci = false

# Import aliases: specifier prefix -> project-relative path prefix
[aliases]
# "@/" = "src/"

# [[presets]]
# name = "custom"
# description = "Core below UI"
# hierarchy = ["core", "ui"]
#
# [presets.exceptions]
# core = ["ui"]
"#;

/// Renders the starter configuration for `preset`.
fn render(preset: &str) -> String {
    CONFIG_TEMPLATE.replace("{preset}", preset)
}

/// Runs the init command.
pub fn run(force: bool, preset: Option<&str>) -> Result<()> {
    let preset = preset.unwrap_or("fsd");
    PresetRegistry::with_builtins().get(preset)?;

    let config_path = Path::new("arch-guard.toml");
    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(config_path, render(preset))
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Created arch-guard.toml (preset: {preset})");
    println!("\nNext steps:");
    println!("  1. Edit arch-guard.toml to configure layers and aliases");
    println!("  2. Run: arch-guard check");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch_guard::GuardConfig;

    #[test]
    fn template_parses_and_validates() {
        let config = GuardConfig::parse(&render("clean")).unwrap();
        assert_eq!(config.guard.preset, "clean");
        assert!(config.aliases.is_empty());
        assert!(config.presets.is_empty());
        config.validate().unwrap();
    }
}
