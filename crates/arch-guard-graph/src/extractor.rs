//! Language-agnostic extraction types and trait.
//!
//! `SpecifierExtractor` is the extension point for adding new languages.
//! Specifier strings, their positions and the names each one binds are
//! extracted; no semantic analysis is performed.

/// How a specifier was introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `import x from "y"` or `import "y"`
    Static,
    /// `export { x } from "y"` or `export * from "y"`
    Reexport,
    /// `import("y")`
    Dynamic,
    /// `require("y")` or `import x = require("y")`
    Require,
}

/// One name bound by an import or re-export.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    /// Name in the module the specifier points at (`default` for a default
    /// import).
    pub name: String,
    /// Name on this side: the local binding of an import, the exported name
    /// of a re-export.
    pub alias: String,
}

impl Binding {
    /// A binding whose alias is `name` itself.
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
        }
    }

    /// The name is exposed under a different one.
    #[must_use]
    pub fn is_renamed(&self) -> bool {
        self.name != self.alias
    }
}

/// What a specifier binds from its module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Bindings {
    /// `import "y"`: evaluated for its side effects only.
    #[default]
    Bare,
    /// `import a, { b as c } from "y"` or `export { b } from "y"`.
    Named(Vec<Binding>),
    /// The module object itself: `import * as ns`, `export * as ns`,
    /// `import()` and `require()`.
    Namespace,
    /// `export * from "y"`: every named export except `default`.
    Star,
}

/// A single module specifier extracted from source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    /// Specifier text without quotes (e.g. `../features/auth`).
    pub target: String,
    /// Line number of the specifier literal (1-indexed).
    pub line: usize,
    /// Column of the opening quote (0-indexed byte offset within line).
    pub column: usize,
    /// How the specifier was introduced.
    pub kind: ImportKind,
    /// Names bound through the specifier.
    pub bindings: Bindings,
}

/// Everything extracted from one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Specifiers in source order.
    pub specifiers: Vec<ImportSpecifier>,
    /// The file consists only of `export … from` statements (a barrel).
    pub reexport_only: bool,
}

/// Extraction failures.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The grammar could not be loaded.
    #[error("failed to load {language} grammar: {message}")]
    Language {
        /// Language identifier.
        language: &'static str,
        /// Loader message.
        message: String,
    },
    /// The parser produced no tree.
    #[error("parser returned no syntax tree")]
    NoTree,
    /// The syntax tree contains errors.
    #[error("syntax error near line {line}")]
    Syntax {
        /// First line with an error node (1-indexed).
        line: usize,
    },
}

/// Trait for language-specific specifier extraction.
///
/// Implement this to add support for a new language. The extractor receives
/// raw source text and returns the specifiers in source order.
pub trait SpecifierExtractor: Send + Sync {
    /// Language identifier (e.g., `"typescript"`).
    fn language_id(&self) -> &'static str;

    /// File extensions this extractor handles, without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Extract import specifiers from source code.
    ///
    /// `path` is only used to pick a grammar variant (e.g. TSX).
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be parsed.
    fn extract(&self, path: &str, source: &str) -> Result<Extraction, ExtractError>;
}
