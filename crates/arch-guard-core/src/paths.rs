//! Project-relative path helpers and glob filters.

use std::path::{Component, Path, PathBuf};

/// A compiled glob pattern matched against `/`-separated relative paths.
///
/// `*` stays within one segment; `**` spans any number of segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    raw: String,
    compiled: glob::Pattern,
}

impl GlobPattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns the reason if the pattern is empty or has invalid glob syntax.
    pub fn new(pattern: &str) -> Result<Self, String> {
        if pattern.is_empty() {
            return Err("empty pattern".to_string());
        }
        let compiled = glob::Pattern::new(pattern).map_err(|e| e.to_string())?;
        Ok(Self {
            raw: pattern.to_string(),
            compiled,
        })
    }

    /// Tests whether a relative path matches.
    #[must_use]
    pub fn matches(&self, rel_path: &str) -> bool {
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        if self.compiled.matches_with(rel_path, options) {
            return true;
        }
        // `dir/**` and `**/dir/**` also cover the directory prefix itself.
        if let Some(prefix) = self.raw.strip_suffix("/**") {
            if let Some(segment) = prefix.strip_prefix("**/") {
                if !segment.contains(['*', '?', '[']) {
                    return rel_path.split('/').any(|s| s == segment)
                        && !rel_path.ends_with(&format!("/{segment}"))
                        && rel_path != segment;
                }
            } else if !prefix.contains(['*', '?', '[']) {
                return rel_path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'));
            }
        }
        false
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Include/exclude filter over relative paths.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<GlobPattern>,
    exclude: Vec<GlobPattern>,
}

impl PathFilter {
    /// Creates a filter. An empty include list admits every path.
    #[must_use]
    pub fn new(include: Vec<GlobPattern>, exclude: Vec<GlobPattern>) -> Self {
        Self { include, exclude }
    }

    /// Whether the path is excluded.
    #[must_use]
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(rel_path))
    }

    /// Whether the path passes both include and exclude filters.
    #[must_use]
    pub fn admits(&self, rel_path: &str) -> bool {
        if self.is_excluded(rel_path) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.matches(rel_path))
    }
}

/// Renders a path with `/` separators.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

/// Lexically normalizes a relative path, resolving `.` and `..`.
///
/// Returns `None` if the path climbs above its starting point.
#[must_use]
pub fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => out.push(s),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out.iter().collect())
}

/// Directory part of a `/`-separated relative path (`""` at the root).
#[must_use]
pub fn parent_dir(rel_path: &str) -> &str {
    rel_path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// File stem of a `/`-separated relative path.
#[must_use]
pub fn file_stem(rel_path: &str) -> &str {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    name.split_once('.').map_or(name, |(stem, _)| stem)
}

/// Builds a relative import specifier from `from_file` to `to_file`.
///
/// The extension is dropped and a trailing `/index` is collapsed, matching
/// how module specifiers are written by hand.
#[must_use]
pub fn relative_specifier(from_file: &str, to_file: &str) -> String {
    let from_dir: Vec<&str> = parent_dir(from_file)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let without_ext = match to_file.rsplit_once('.') {
        Some((base, _)) if !base.ends_with('/') && !base.is_empty() => base,
        _ => to_file,
    };
    let target = without_ext.strip_suffix("/index").unwrap_or(without_ext);
    let to_parts: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_dir
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    parts.extend(std::iter::repeat("..").take(from_dir.len() - common));
    parts.extend(&to_parts[common..]);

    if parts.is_empty() {
        return ".".to_string();
    }
    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(p: &str) -> GlobPattern {
        GlobPattern::new(p).unwrap()
    }

    #[test]
    fn glob_star_stays_in_segment() {
        assert!(glob("src/*.ts").matches("src/a.ts"));
        assert!(!glob("src/*.ts").matches("src/deep/a.ts"));
        assert!(glob("src/**/*.ts").matches("src/deep/a.ts"));
    }

    #[test]
    fn glob_directory_patterns() {
        let nm = glob("**/node_modules/**");
        assert!(nm.matches("node_modules/react/index.js"));
        assert!(nm.matches("packages/web/node_modules/x.js"));
        assert!(!nm.matches("src/node_modules_like/x.ts"));

        let gen = glob("src/generated/**");
        assert!(gen.matches("src/generated/api.ts"));
        assert!(!gen.matches("src/generated_api.ts"));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(GlobPattern::new("").is_err());
    }

    #[test]
    fn filter_include_and_exclude() {
        let filter = PathFilter::new(vec![glob("src/**")], vec![glob("**/*.test.ts")]);
        assert!(filter.admits("src/features/auth/login.ts"));
        assert!(!filter.admits("src/features/auth/login.test.ts"));
        assert!(!filter.admits("scripts/build.ts"));
        assert!(PathFilter::default().admits("anything.ts"));
    }

    #[test]
    fn normalize_resolves_parent_segments() {
        assert_eq!(
            normalize(Path::new("src/features/../shared/./ui")),
            Some(PathBuf::from("src/shared/ui"))
        );
        assert_eq!(normalize(Path::new("src/../../etc")), None);
    }

    #[test]
    fn to_slash_joins_components() {
        assert_eq!(to_slash(Path::new("src/shared/ui.ts")), "src/shared/ui.ts");
    }

    #[test]
    fn stem_and_parent() {
        assert_eq!(file_stem("src/app/blog/page.tsx"), "page");
        assert_eq!(file_stem("page.test.tsx"), "page");
        assert_eq!(parent_dir("src/app/page.tsx"), "src/app");
        assert_eq!(parent_dir("main.ts"), "");
    }

    #[test]
    fn relative_specifier_between_slices() {
        assert_eq!(
            relative_specifier("src/entities/user/model.ts", "src/shared/auth/index.ts"),
            "../../shared/auth"
        );
        assert_eq!(
            relative_specifier("src/entities/user/model.ts", "src/entities/user/api.ts"),
            "./api"
        );
        assert_eq!(
            relative_specifier("main.ts", "src/shared/index.ts"),
            "./src/shared"
        );
    }
}
