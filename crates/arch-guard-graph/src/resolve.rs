//! Specifier resolution: relative and aliased specifiers to in-tree files.

use std::collections::BTreeMap;
use std::path::Path;

use arch_guard_core::paths::{normalize, parent_dir, to_slash};

/// Extensions probed when a specifier omits one, in priority order.
pub const PROBE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Resolves to a known in-tree file (project-relative path).
    Internal(String),
    /// A package or a path outside the monitored root.
    External(String),
    /// Relative or aliased, but no known file matches yet.
    Unresolved {
        /// Normalized project-relative base the specifier points at.
        base: String,
    },
}

/// Resolves specifiers using relative paths and an alias table.
#[derive(Debug, Clone, Default)]
pub struct SpecifierResolver {
    /// (specifier prefix, path prefix), longest prefix first.
    aliases: Vec<(String, String)>,
}

impl SpecifierResolver {
    /// Build a resolver from an alias table.
    #[must_use]
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let mut aliases: Vec<(String, String)> = aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        Self { aliases }
    }

    /// Resolve `specifier` as written in `from_file`.
    ///
    /// `is_known` reports whether a project-relative path is an in-tree
    /// source file.
    pub fn resolve(
        &self,
        from_file: &str,
        specifier: &str,
        is_known: impl Fn(&str) -> bool,
    ) -> Resolution {
        let Some(base) = self.base_path(from_file, specifier) else {
            return Resolution::External(package_name(specifier));
        };
        match probe(&base, &is_known) {
            Some(file) => Resolution::Internal(file),
            None => Resolution::Unresolved { base },
        }
    }

    /// Normalized project-relative base for relative/aliased specifiers.
    fn base_path(&self, from_file: &str, specifier: &str) -> Option<String> {
        let joined = if is_relative(specifier) {
            let dir = parent_dir(from_file);
            if dir.is_empty() {
                specifier.to_string()
            } else {
                format!("{dir}/{specifier}")
            }
        } else {
            self.expand_alias(specifier)?
        };
        let normalized = normalize(Path::new(&joined))?;
        let base = to_slash(&normalized);
        (!base.is_empty()).then_some(base)
    }

    fn expand_alias(&self, specifier: &str) -> Option<String> {
        for (prefix, target) in &self.aliases {
            let rest = if prefix.ends_with('/') {
                specifier.strip_prefix(prefix.as_str())
            } else if specifier == prefix {
                Some("")
            } else {
                specifier
                    .strip_prefix(prefix.as_str())
                    .and_then(|r| r.strip_prefix('/'))
            };
            if let Some(rest) = rest {
                let target = target.trim_end_matches('/');
                return Some(match (target.is_empty(), rest.is_empty()) {
                    (true, _) => rest.to_string(),
                    (false, true) => target.to_string(),
                    (false, false) => format!("{target}/{rest}"),
                });
            }
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// Package name of a bare specifier (`@scope/pkg/sub` -> `@scope/pkg`).
fn package_name(specifier: &str) -> String {
    let mut parts = specifier.split('/');
    match parts.next() {
        Some(scope) if scope.starts_with('@') => match parts.next() {
            Some(name) => format!("{scope}/{name}"),
            None => scope.to_string(),
        },
        Some(name) => name.to_string(),
        None => specifier.to_string(),
    }
}

/// Candidate files for a base path, in probing order.
#[must_use]
pub fn candidates(base: &str) -> Vec<String> {
    let mut out = vec![base.to_string()];

    // `./x.js` written for a `./x.ts` source.
    if let Some((stem, ext)) = base.rsplit_once('.') {
        let substitute: &[&str] = match ext {
            "js" => &["ts", "tsx"],
            "jsx" => &["tsx"],
            "mjs" => &["mts"],
            "cjs" => &["cts"],
            _ => &[],
        };
        out.extend(substitute.iter().map(|e| format!("{stem}.{e}")));
    }

    out.extend(PROBE_EXTENSIONS.iter().map(|e| format!("{base}.{e}")));
    out.extend(PROBE_EXTENSIONS.iter().map(|e| format!("{base}/index.{e}")));
    out
}

fn probe(base: &str, is_known: &impl Fn(&str) -> bool) -> Option<String> {
    candidates(base).into_iter().find(|c| is_known(c.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn known() -> HashSet<String> {
        [
            "src/features/auth/index.ts",
            "src/features/auth/login.tsx",
            "src/shared/ui/button.ts",
            "src/entities/user/model.ts",
            "src/shared/lib/date.ts",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
    }

    fn resolver() -> SpecifierResolver {
        let mut aliases = BTreeMap::new();
        aliases.insert("@/".to_string(), "src/".to_string());
        aliases.insert("@shared".to_string(), "src/shared".to_string());
        SpecifierResolver::new(&aliases)
    }

    fn resolve(from: &str, spec: &str) -> Resolution {
        let files = known();
        resolver().resolve(from, spec, |p| files.contains(p))
    }

    #[test]
    fn resolves_relative_with_extension_probe() {
        assert_eq!(
            resolve("src/entities/user/model.ts", "../../shared/ui/button"),
            Resolution::Internal("src/shared/ui/button.ts".into())
        );
    }

    #[test]
    fn resolves_directory_index() {
        assert_eq!(
            resolve("src/entities/user/model.ts", "../../features/auth"),
            Resolution::Internal("src/features/auth/index.ts".into())
        );
    }

    #[test]
    fn resolves_js_extension_to_ts_source() {
        assert_eq!(
            resolve("src/entities/user/model.ts", "../../shared/lib/date.js"),
            Resolution::Internal("src/shared/lib/date.ts".into())
        );
    }

    #[test]
    fn resolves_aliases_longest_prefix_first() {
        assert_eq!(
            resolve("src/features/auth/login.tsx", "@/entities/user/model"),
            Resolution::Internal("src/entities/user/model.ts".into())
        );
        assert_eq!(
            resolve("src/features/auth/login.tsx", "@shared/ui/button"),
            Resolution::Internal("src/shared/ui/button.ts".into())
        );
    }

    #[test]
    fn bare_specifiers_are_external() {
        assert_eq!(
            resolve("src/a.ts", "react"),
            Resolution::External("react".into())
        );
        assert_eq!(
            resolve("src/a.ts", "@tanstack/react-query/devtools"),
            Resolution::External("@tanstack/react-query".into())
        );
    }

    #[test]
    fn escaping_the_root_is_external() {
        assert!(matches!(
            resolve("src/a.ts", "../../outside"),
            Resolution::External(_)
        ));
    }

    #[test]
    fn missing_relative_target_is_unresolved() {
        assert_eq!(
            resolve("src/entities/user/model.ts", "./missing"),
            Resolution::Unresolved {
                base: "src/entities/user/missing".into()
            }
        );
    }

    #[test]
    fn candidates_cover_index_files() {
        let c = candidates("src/x");
        assert_eq!(c[0], "src/x");
        assert!(c.contains(&"src/x.ts".to_string()));
        assert!(c.contains(&"src/x/index.tsx".to_string()));
    }
}
