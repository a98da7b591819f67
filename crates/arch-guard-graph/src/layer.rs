//! Layer resolution: maps project-relative file paths to architecture layers.

use std::collections::HashSet;

use arch_guard_core::paths::file_stem;
use arch_guard_core::{FileRole, Preset};

/// Resolves file paths to layer names and route roles.
///
/// A file belongs to the layer named by the first directory segment of its
/// path that equals a layer of the preset, so `src/features/auth/login.ts`
/// resolves to `features`.
pub struct LayerResolver {
    layers: HashSet<String>,
    route_layer: Option<String>,
}

impl LayerResolver {
    /// Build a resolver from a preset.
    #[must_use]
    pub fn new(preset: &Preset) -> Self {
        Self {
            layers: preset.hierarchy.iter().cloned().collect(),
            route_layer: preset
                .fs_route_rules
                .as_ref()
                .map(|r| r.route_layer.clone()),
        }
    }

    /// Which layer does this file belong to?
    #[must_use]
    pub fn resolve<'a>(&self, rel_path: &'a str) -> Option<&'a str> {
        let mut segments: Vec<&str> = rel_path.split('/').collect();
        segments.pop();
        segments.into_iter().find(|s| self.layers.contains(*s))
    }

    /// Route role of a file, if it lives in the route layer and is named
    /// `page`, `layout` or `route`.
    #[must_use]
    pub fn role(&self, rel_path: &str, layer: Option<&str>) -> Option<FileRole> {
        let route_layer = self.route_layer.as_deref()?;
        if layer? != route_layer {
            return None;
        }
        FileRole::from_stem(file_stem(rel_path))
    }
}
