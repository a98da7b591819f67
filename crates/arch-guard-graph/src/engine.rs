//! Guard rule evaluation.
//!
//! Applies the active preset to every classified edge of an
//! [`ImportGraph`], producing [`Violation`]s from arch-guard-core. Edges whose
//! endpoints are not both classified are never reported.

use std::collections::BTreeSet;

use arch_guard_core::paths::relative_specifier;
use arch_guard_core::{FileRole, ImportFix, Preset, RuleId, Violation};

use crate::extractor::{Binding, Bindings, ImportKind};
use crate::graph::{ImportEdge, ImportGraph};
use crate::layer::LayerResolver;
use crate::resolve::candidates;

/// Evaluates guard rules against an import graph.
pub struct RuleEvaluator {
    preset: Preset,
    layers: LayerResolver,
}

impl RuleEvaluator {
    /// Create a new evaluator for a preset.
    #[must_use]
    pub fn new(preset: Preset) -> Self {
        let layers = LayerResolver::new(&preset);
        Self { preset, layers }
    }

    /// The active preset.
    #[must_use]
    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    /// Check every analyzed file.
    #[must_use]
    pub fn evaluate(&self, graph: &ImportGraph) -> Vec<Violation> {
        graph
            .files()
            .flat_map(|file| self.evaluate_file(graph, &file.path))
            .collect()
    }

    /// Check the outgoing edges of one file.
    #[must_use]
    pub fn evaluate_file(&self, graph: &ImportGraph, path: &str) -> Vec<Violation> {
        graph
            .edges_from(path)
            .iter()
            .filter_map(|edge| self.check_edge(graph, edge))
            .collect()
    }

    fn role_of(&self, path: &str, layer: &str) -> Option<FileRole> {
        self.layers.role(path, Some(layer))
    }

    /// Which rule, if any, an import `from -> to` breaks.
    ///
    /// Files with a route role are judged by their allow-list instead of the
    /// hierarchy. Same-layer imports are legal except page-to-page.
    fn verdict(
        &self,
        from: &str,
        from_role: Option<FileRole>,
        to: &str,
        to_role: Option<FileRole>,
    ) -> Option<RuleId> {
        if let (Some(rules), Some(role)) = (&self.preset.fs_route_rules, from_role) {
            if rules.no_page_to_page && role == FileRole::Page && to_role == Some(FileRole::Page) {
                return Some(RuleId::PageToPageImport);
            }
            if from == to || rules.allow_list(role).iter().any(|l| l == to) {
                return None;
            }
            return Some(RuleId::FsrouteDisallowedImport);
        }

        if from == to {
            return None;
        }
        let from_rank = self.preset.rank(from)?;
        let to_rank = self.preset.rank(to)?;
        (to_rank > from_rank && !self.preset.permits(from, to))
            .then_some(RuleId::LayerBackwardImport)
    }

    fn check_edge(&self, graph: &ImportGraph, edge: &ImportEdge) -> Option<Violation> {
        let from = edge.from_layer.as_deref()?;
        let to = edge.to_layer.as_deref()?;
        let from_role = self.role_of(&edge.from_file, from);
        let to_role = self.role_of(&edge.to_file, to);

        let rule = self.verdict(from, from_role, to, to_role)?;
        let fix = if rule.is_auto_correctable() {
            self.find_fix(graph, edge, from, from_role)
        } else {
            None
        };

        let suggestion = match (&fix, rule, from_role) {
            (Some(fix), _, _) => format!(
                "Import `{}` instead; it re-exports the same module from an allowed layer",
                fix.replacement
            ),
            (None, RuleId::PageToPageImport, _) => {
                let homes = self.page_share_layers();
                format!(
                    "Pages must not depend on each other. Extract the shared part of `{}` into {homes} and import it from both pages",
                    edge.to_file
                )
            }
            (None, RuleId::FsrouteDisallowedImport, Some(role)) => {
                let allowed = self
                    .preset
                    .fs_route_rules
                    .as_ref()
                    .map(|r| r.allow_list(role).join(", "))
                    .unwrap_or_default();
                format!("A {role} may only import from: {allowed}")
            }
            (None, _, _) => {
                let below = self.preset.layers_below(from);
                if below.is_empty() {
                    format!(
                        "`{from}` is the most core layer and cannot depend on `{to}`. Move the shared code into `{from}` or invert the dependency"
                    )
                } else {
                    format!(
                        "`{from}` may only depend on {}. Move the shared code down a layer or invert the dependency",
                        below.join(", ")
                    )
                }
            }
        };

        let mut violation = Violation::new(rule, &edge.from_file, edge.line, from, to)
            .with_target(&edge.to_file)
            .with_suggestion(suggestion);
        if let Some(fix) = fix {
            violation = violation.with_fix(fix);
        }
        Some(violation)
    }

    fn page_share_layers(&self) -> String {
        let layers: Vec<&str> = self
            .preset
            .fs_route_rules
            .as_ref()
            .map(|r| {
                r.page_can_import
                    .iter()
                    .filter(|l| **l != r.route_layer)
                    .map(String::as_str)
                    .take(2)
                    .collect()
            })
            .unwrap_or_default();
        if layers.is_empty() {
            "a lower layer".to_string()
        } else {
            layers.join(" or ")
        }
    }

    /// Looks for a legal file exposing the same names as the edge's target.
    ///
    /// Two shapes qualify: the target is a pure barrel forwarding a single
    /// module, or another file re-exports the target. Either way the new path
    /// must be importable from the source, the re-export itself legal, and
    /// every name the source reads forwarded without a rename.
    fn find_fix(
        &self,
        graph: &ImportGraph,
        edge: &ImportEdge,
        from: &str,
        from_role: Option<FileRole>,
    ) -> Option<ImportFix> {
        let mut options: Vec<String> = Vec::new();

        if let Some(target) = graph.file(&edge.to_file) {
            if target.reexport_only && target.externals.is_empty() && target.unresolved.is_empty()
            {
                let forwards: Vec<&ImportEdge> = graph.edges_from(&target.path).iter().collect();
                let forwarded: BTreeSet<&str> =
                    forwards.iter().map(|e| e.to_file.as_str()).collect();
                let mut forwarded = forwarded.into_iter();
                if let (Some(only), None) = (forwarded.next(), forwarded.next()) {
                    if forwards_names(&forwards, only, &edge.bindings) {
                        options.push(only.to_string());
                    }
                }
            }
        }

        let target_layer = edge.to_layer.as_deref()?;
        let target_role = self.role_of(&edge.to_file, target_layer);
        for reexporter in graph.reexporters_of(&edge.to_file) {
            let Some(layer) = self.layers.resolve(&reexporter) else {
                continue;
            };
            let role = self.role_of(&reexporter, layer);
            if self.verdict(layer, role, target_layer, target_role).is_some() {
                continue;
            }
            let forwards: Vec<&ImportEdge> = graph
                .edges_from(&reexporter)
                .iter()
                .filter(|e| e.kind == ImportKind::Reexport)
                .collect();
            if forwards_names(&forwards, &edge.to_file, &edge.bindings) {
                options.push(reexporter);
            }
        }

        options.into_iter().find_map(|via| {
            if via == edge.from_file {
                return None;
            }
            let layer = self.layers.resolve(&via)?;
            let role = self.role_of(&via, layer);
            if self.verdict(from, from_role, layer, role).is_some() {
                return None;
            }
            let replacement = relative_specifier(&edge.from_file, &via);
            let resolved = candidates(&module_base(&via))
                .into_iter()
                .find(|c| graph.is_known(c));
            (resolved.as_deref() == Some(via.as_str())).then(|| ImportFix {
                specifier: edge.specifier.clone(),
                replacement,
                via,
            })
        })
    }
}

/// Whether the re-export edges `forwards` of one module expose every name
/// `wanted` reads from `origin`, under the same name.
///
/// Namespace and whole-module reads never qualify. `export *` does not carry
/// `default`, and an explicit entry for a name shadows any `export *`.
fn forwards_names(forwards: &[&ImportEdge], origin: &str, wanted: &Bindings) -> bool {
    let names = match wanted {
        Bindings::Bare => return true,
        Bindings::Named(names) => names,
        Bindings::Namespace | Bindings::Star => return false,
    };
    names.iter().all(|binding| {
        let name = binding.name.as_str();
        let explicit: Vec<(&ImportEdge, &Binding)> = forwards
            .iter()
            .filter_map(|e| match &e.bindings {
                Bindings::Named(list) => Some((*e, list)),
                _ => None,
            })
            .flat_map(|(e, list)| {
                list.iter()
                    .filter(move |b| b.alias == name)
                    .map(move |b| (e, b))
            })
            .collect();
        if !explicit.is_empty() {
            return explicit
                .iter()
                .all(|(e, b)| e.to_file == origin && !b.is_renamed());
        }
        name != "default"
            && forwards
                .iter()
                .any(|e| e.to_file == origin && e.bindings == Bindings::Star)
    })
}

/// The path a hand-written specifier for `path` points at: no extension and
/// no trailing `/index`.
fn module_base(path: &str) -> String {
    let without_ext = match path.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() && !base.ends_with('/') => base,
        _ => path,
    };
    without_ext
        .strip_suffix("/index")
        .unwrap_or(without_ext)
        .to_string()
}
