//! Layer presets and the registry that owns them.
//!
//! A [`Preset`] is an ordered layer hierarchy (index = rank, 0 = most core)
//! plus optional import permissions. The [`PresetRegistry`] is an explicit,
//! constructed value: built-ins plus caller-supplied extensions, validated
//! once and passed to every entry point.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Errors raised while building or querying presets.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum PresetError {
    /// No preset with this name is registered.
    #[error("unknown preset `{name}`")]
    #[diagnostic(
        code(arch_guard::preset::not_found),
        help("available presets: {available}")
    )]
    NotFound {
        /// Requested name.
        name: String,
        /// Comma-separated list of registered names.
        available: String,
    },

    /// Preset definition is structurally invalid.
    #[error("invalid preset `{name}`: {reason}")]
    #[diagnostic(code(arch_guard::preset::invalid))]
    Invalid {
        /// Preset name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Role of a file inside the file-system routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    /// `page.*`
    Page,
    /// `layout.*`
    Layout,
    /// `route.*`
    Route,
}

impl FileRole {
    /// Role for a file stem, if it names one.
    #[must_use]
    pub fn from_stem(stem: &str) -> Option<Self> {
        match stem {
            "page" => Some(Self::Page),
            "layout" => Some(Self::Layout),
            "route" => Some(Self::Route),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Page => write!(f, "page"),
            Self::Layout => write!(f, "layout"),
            Self::Route => write!(f, "route"),
        }
    }
}

/// Import rules for file-system routes (pages, layouts, route handlers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsRouteRules {
    /// Layer that holds the routes.
    pub route_layer: String,
    /// Forbid a page importing another page.
    #[serde(default)]
    pub no_page_to_page: bool,
    /// Layers a page may import from.
    #[serde(default)]
    pub page_can_import: Vec<String>,
    /// Layers a layout may import from.
    #[serde(default)]
    pub layout_can_import: Vec<String>,
    /// Layers a route handler may import from.
    #[serde(default)]
    pub route_can_import: Vec<String>,
}

impl FsRouteRules {
    /// Allow-list for a role.
    #[must_use]
    pub fn allow_list(&self, role: FileRole) -> &[String] {
        match role {
            FileRole::Page => &self.page_can_import,
            FileRole::Layout => &self.layout_can_import,
            FileRole::Route => &self.route_can_import,
        }
    }
}

/// A named layer hierarchy plus import permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    /// Preset name.
    pub name: String,
    /// One-line description.
    #[serde(default)]
    pub description: String,
    /// Layers from most core (rank 0) to most outward.
    pub hierarchy: Vec<String>,
    /// Explicitly permitted outward imports: layer -> layers it may import
    /// despite their higher rank.
    #[serde(default)]
    pub exceptions: BTreeMap<String, Vec<String>>,
    /// File-system routing rules.
    #[serde(default, rename = "fs_routes")]
    pub fs_route_rules: Option<FsRouteRules>,
}

impl Preset {
    /// Creates a preset from a hierarchy with no exceptions or route rules.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, hierarchy: &[&str]) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            hierarchy: hierarchy.iter().map(|s| (*s).to_string()).collect(),
            exceptions: BTreeMap::new(),
            fs_route_rules: None,
        }
    }

    /// Adds file-system routing rules.
    #[must_use]
    pub fn with_fs_routes(mut self, rules: FsRouteRules) -> Self {
        self.fs_route_rules = Some(rules);
        self
    }

    /// Permits `from` to import the outward layer `to`.
    #[must_use]
    pub fn with_exception(mut self, from: &str, to: &str) -> Self {
        self.exceptions
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self
    }

    /// Rank of a layer (0 = most core).
    #[must_use]
    pub fn rank(&self, layer: &str) -> Option<usize> {
        self.hierarchy.iter().position(|l| l == layer)
    }

    /// Whether the layer exists in this preset.
    #[must_use]
    pub fn has_layer(&self, layer: &str) -> bool {
        self.rank(layer).is_some()
    }

    /// Whether an outward import `from -> to` is explicitly permitted.
    #[must_use]
    pub fn permits(&self, from: &str, to: &str) -> bool {
        self.exceptions
            .get(from)
            .is_some_and(|allowed| allowed.iter().any(|a| a == to))
    }

    /// Layers strictly below `layer`, most core first.
    #[must_use]
    pub fn layers_below(&self, layer: &str) -> &[String] {
        match self.rank(layer) {
            Some(rank) => &self.hierarchy[..rank],
            None => &[],
        }
    }

    /// Checks the structural invariants of the preset.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), PresetError> {
        let invalid = |reason: String| PresetError::Invalid {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".into()));
        }
        if self.hierarchy.is_empty() {
            return Err(invalid("hierarchy is empty".into()));
        }

        let mut seen = HashSet::new();
        for layer in &self.hierarchy {
            if layer.is_empty() || layer.contains('/') {
                return Err(invalid(format!("layer name `{layer}` is not a path segment")));
            }
            if !seen.insert(layer.as_str()) {
                return Err(invalid(format!("duplicate layer `{layer}`")));
            }
        }

        for (from, targets) in &self.exceptions {
            if !self.has_layer(from) {
                return Err(invalid(format!("exceptions.{from}: unknown layer")));
            }
            for to in targets {
                if !self.has_layer(to) {
                    return Err(invalid(format!("exceptions.{from}: unknown layer `{to}`")));
                }
            }
        }

        if let Some(routes) = &self.fs_route_rules {
            if !self.has_layer(&routes.route_layer) {
                return Err(invalid(format!(
                    "fs_routes.route_layer: unknown layer `{}`",
                    routes.route_layer
                )));
            }
            for role in [FileRole::Page, FileRole::Layout, FileRole::Route] {
                for layer in routes.allow_list(role) {
                    if !self.has_layer(layer) {
                        return Err(invalid(format!(
                            "fs_routes.{role}_can_import: unknown layer `{layer}`"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Name and description of a registered preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetSummary {
    /// Preset name.
    pub name: String,
    /// One-line description.
    pub description: String,
}

/// Registry of available presets.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: BTreeMap<String, Preset>,
}

impl PresetRegistry {
    /// Creates a registry with the built-in presets only.
    #[must_use]
    pub fn with_builtins() -> Self {
        let presets = builtin_presets()
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { presets }
    }

    /// Creates a registry with the built-ins plus `extensions`.
    ///
    /// An extension with the name of a built-in replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if any extension fails validation.
    pub fn new(extensions: impl IntoIterator<Item = Preset>) -> Result<Self, PresetError> {
        let mut registry = Self::with_builtins();
        for preset in extensions {
            registry.register(preset)?;
        }
        Ok(registry)
    }

    /// Registers a preset after validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the preset is invalid.
    pub fn register(&mut self, preset: Preset) -> Result<(), PresetError> {
        preset.validate()?;
        tracing::debug!("Registered preset `{}`", preset.name);
        self.presets.insert(preset.name.clone(), preset);
        Ok(())
    }

    /// Looks up a preset by name.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::NotFound`] for unknown names.
    pub fn get(&self, name: &str) -> Result<&Preset, PresetError> {
        self.presets.get(name).ok_or_else(|| PresetError::NotFound {
            name: name.to_string(),
            available: self
                .presets
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Lists all registered presets, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<PresetSummary> {
        self.presets
            .values()
            .map(|p| PresetSummary {
                name: p.name.clone(),
                description: p.description.clone(),
            })
            .collect()
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn to_strings(layers: &[&str]) -> Vec<String> {
    layers.iter().map(|s| (*s).to_string()).collect()
}

/// The built-in presets.
#[must_use]
pub fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset::new(
            "mandu",
            "Feature-Sliced layers with file-system routes under app/",
            &["shared", "entities", "features", "widgets", "app"],
        )
        .with_fs_routes(FsRouteRules {
            route_layer: "app".into(),
            no_page_to_page: true,
            page_can_import: to_strings(&["widgets", "features", "entities", "shared"]),
            layout_can_import: to_strings(&["widgets", "shared"]),
            route_can_import: to_strings(&["features", "entities", "shared"]),
        }),
        Preset::new(
            "fsd",
            "Feature-Sliced Design",
            &["shared", "entities", "features", "widgets", "pages"],
        ),
        Preset::new(
            "clean",
            "Clean Architecture",
            &["domain", "application", "adapters", "infrastructure"],
        ),
        Preset::new(
            "hexagonal",
            "Hexagonal (ports and adapters)",
            &["domain", "ports", "application", "adapters"],
        ),
        Preset::new(
            "atomic",
            "Atomic Design",
            &["atoms", "molecules", "organisms", "templates", "pages"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_hierarchies_are_duplicate_free() {
        for preset in builtin_presets() {
            assert!(preset.validate().is_ok(), "{} failed validation", preset.name);
            for (i, layer) in preset.hierarchy.iter().enumerate() {
                assert_eq!(preset.rank(layer), Some(i), "{}: {layer}", preset.name);
            }
        }
    }

    #[test]
    fn fsd_matches_documented_hierarchy() {
        let registry = PresetRegistry::with_builtins();
        let fsd = registry.get("fsd").unwrap();
        assert_eq!(
            fsd.hierarchy,
            vec!["shared", "entities", "features", "widgets", "pages"]
        );
        assert_eq!(fsd.rank("entities"), Some(1));
        assert_eq!(fsd.rank("features"), Some(2));
    }

    #[test]
    fn unknown_preset_lists_available() {
        let registry = PresetRegistry::with_builtins();
        let err = registry.get("onion").unwrap_err();
        match err {
            PresetError::NotFound { name, available } => {
                assert_eq!(name, "onion");
                assert!(available.contains("fsd"));
                assert!(available.contains("hexagonal"));
            }
            PresetError::Invalid { .. } => panic!("expected NotFound"),
        }
    }

    #[test]
    fn list_includes_custom_presets() {
        let custom = Preset::new("custom", "Two tiers", &["core", "ui"]);
        let registry = PresetRegistry::new([custom]).unwrap();
        let names: Vec<String> = registry.list().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["atomic", "clean", "custom", "fsd", "hexagonal", "mandu"]
        );
    }

    #[test]
    fn custom_preset_shadows_builtin() {
        let custom = Preset::new("fsd", "Trimmed", &["shared", "app"]);
        let registry = PresetRegistry::new([custom]).unwrap();
        assert_eq!(registry.get("fsd").unwrap().hierarchy.len(), 2);
    }

    #[test]
    fn duplicate_layer_rejected() {
        let dup = Preset::new("dup", "", &["core", "ui", "core"]);
        let err = PresetRegistry::new([dup]).unwrap_err();
        assert!(err.to_string().contains("duplicate layer `core`"));
    }

    #[test]
    fn malformed_allow_list_rejected() {
        let preset = Preset::new("routes", "", &["shared", "app"]).with_fs_routes(FsRouteRules {
            route_layer: "app".into(),
            no_page_to_page: false,
            page_can_import: vec!["widgets".into()],
            layout_can_import: vec![],
            route_can_import: vec![],
        });
        let err = preset.validate().unwrap_err();
        assert!(err.to_string().contains("page_can_import"));
    }

    #[test]
    fn exceptions_must_reference_known_layers() {
        let preset = Preset::new("x", "", &["core", "ui"]).with_exception("core", "api");
        assert!(preset.validate().is_err());

        let ok = Preset::new("x", "", &["core", "ui"]).with_exception("core", "ui");
        assert!(ok.validate().is_ok());
        assert!(ok.permits("core", "ui"));
        assert!(!ok.permits("ui", "core"));
    }

    #[test]
    fn layers_below_excludes_self() {
        let registry = PresetRegistry::with_builtins();
        let fsd = registry.get("fsd").unwrap();
        assert_eq!(fsd.layers_below("features"), ["shared", "entities"]);
        assert!(fsd.layers_below("shared").is_empty());
        assert!(fsd.layers_below("nope").is_empty());
    }

    #[test]
    fn file_role_from_stem() {
        assert_eq!(FileRole::from_stem("page"), Some(FileRole::Page));
        assert_eq!(FileRole::from_stem("layout"), Some(FileRole::Layout));
        assert_eq!(FileRole::from_stem("route"), Some(FileRole::Route));
        assert_eq!(FileRole::from_stem("pages"), None);
    }
}
