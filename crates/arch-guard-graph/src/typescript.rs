//! TypeScript / JavaScript specifier extractor using Tree-sitter.

use tree_sitter::{Language, Node, Parser};

use crate::extractor::{
    Binding, Bindings, ExtractError, Extraction, ImportKind, ImportSpecifier, SpecifierExtractor,
};

/// Extracts `import`, `export … from`, `import()` and `require()` specifiers.
pub struct TypeScriptExtractor {
    typescript: Language,
    tsx: Language,
}

impl TypeScriptExtractor {
    /// Creates a new TypeScript extractor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            typescript: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    /// JSX may appear in any JavaScript file, so only `.ts`-family files use
    /// the plain TypeScript grammar (which permits `<T>expr` casts).
    fn language_for(&self, path: &str) -> &Language {
        if [".ts", ".mts", ".cts"].iter().any(|ext| path.ends_with(ext)) {
            &self.typescript
        } else {
            &self.tsx
        }
    }

    /// Unquotes a `string` or substitution-free `template_string` node.
    fn literal(node: &Node<'_>, src: &[u8]) -> Option<String> {
        match node.kind() {
            "string" => {}
            "template_string" => {
                let mut cursor = node.walk();
                if node
                    .named_children(&mut cursor)
                    .any(|c| c.kind() == "template_substitution")
                {
                    return None;
                }
            }
            _ => return None,
        }
        let text = node.utf8_text(src).ok()?;
        if text.len() < 2 {
            return None;
        }
        Some(text[1..text.len() - 1].to_string())
    }

    fn specifier(
        node: &Node<'_>,
        src: &[u8],
        kind: ImportKind,
        bindings: Bindings,
    ) -> Option<ImportSpecifier> {
        let target = Self::literal(node, src)?;
        if target.is_empty() {
            return None;
        }
        Some(ImportSpecifier {
            target,
            line: node.start_position().row + 1,
            column: node.start_position().column,
            kind,
            bindings,
        })
    }

    fn from_import(node: &Node<'_>, src: &[u8]) -> Option<ImportSpecifier> {
        if let Some(source) = node.child_by_field_name("source") {
            let bindings = Self::import_bindings(node, src);
            return Self::specifier(&source, src, ImportKind::Static, bindings);
        }
        // `import x = require("y")`
        let mut cursor = node.walk();
        let clause = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "import_require_clause")?;
        let source = clause.child_by_field_name("source")?;
        Self::specifier(&source, src, ImportKind::Require, Bindings::Namespace)
    }

    fn from_export(node: &Node<'_>, src: &[u8]) -> Option<ImportSpecifier> {
        let source = node.child_by_field_name("source")?;
        let bindings = Self::export_bindings(node, src);
        Self::specifier(&source, src, ImportKind::Reexport, bindings)
    }

    fn import_bindings(node: &Node<'_>, src: &[u8]) -> Bindings {
        let mut cursor = node.walk();
        let Some(clause) = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "import_clause")
        else {
            return Bindings::Bare;
        };

        let mut named = Vec::new();
        let mut cursor = clause.walk();
        for child in clause.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => {
                    if let Ok(local) = child.utf8_text(src) {
                        named.push(Binding {
                            name: "default".to_string(),
                            alias: local.to_string(),
                        });
                    }
                }
                "namespace_import" => return Bindings::Namespace,
                "named_imports" => named.extend(Self::list(&child, src, "import_specifier")),
                _ => {}
            }
        }
        Bindings::Named(named)
    }

    fn export_bindings(node: &Node<'_>, src: &[u8]) -> Bindings {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "namespace_export" => return Bindings::Namespace,
                "export_clause" => {
                    return Bindings::Named(Self::list(&child, src, "export_specifier"));
                }
                _ => {}
            }
        }
        Bindings::Star
    }

    /// `name` / `name as alias` entries of a `{ … }` clause.
    fn list(clause: &Node<'_>, src: &[u8], kind: &str) -> Vec<Binding> {
        let mut cursor = clause.walk();
        clause
            .named_children(&mut cursor)
            .filter(|c| c.kind() == kind)
            .filter_map(|entry| {
                let name = Self::name(&entry.child_by_field_name("name")?, src)?;
                let alias = match entry.child_by_field_name("alias") {
                    Some(alias) => Self::name(&alias, src)?,
                    None => name.clone(),
                };
                Some(Binding { name, alias })
            })
            .collect()
    }

    /// Identifier text, or the content of a string module export name.
    fn name(node: &Node<'_>, src: &[u8]) -> Option<String> {
        if node.kind() == "string" {
            return Self::literal(node, src);
        }
        node.utf8_text(src).ok().map(str::to_string)
    }

    fn from_call(node: &Node<'_>, src: &[u8]) -> Option<ImportSpecifier> {
        let function = node.child_by_field_name("function")?;
        let kind = match function.kind() {
            "import" => ImportKind::Dynamic,
            "identifier" if function.utf8_text(src).ok()? == "require" => ImportKind::Require,
            _ => return None,
        };
        let arguments = node.child_by_field_name("arguments")?;
        let first = arguments.named_child(0)?;
        Self::specifier(&first, src, kind, Bindings::Namespace)
    }
}

impl Default for TypeScriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecifierExtractor for TypeScriptExtractor {
    fn language_id(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"]
    }

    fn extract(&self, path: &str, source: &str) -> Result<Extraction, ExtractError> {
        let mut parser = Parser::new();
        parser
            .set_language(self.language_for(path))
            .map_err(|e| ExtractError::Language {
                language: self.language_id(),
                message: e.to_string(),
            })?;

        let src = source.as_bytes();
        let tree = parser.parse(src, None).ok_or(ExtractError::NoTree)?;
        let root = tree.root_node();

        if root.has_error() {
            return Err(ExtractError::Syntax {
                line: first_error_line(&root),
            });
        }

        let mut specifiers = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let found = match node.kind() {
                "import_statement" => Self::from_import(&node, src),
                "export_statement" => Self::from_export(&node, src),
                "call_expression" => Self::from_call(&node, src),
                _ => None,
            };
            if let Some(spec) = found {
                specifiers.push(spec);
            }

            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        specifiers.sort_by_key(|s| (s.line, s.column));
        Ok(Extraction {
            reexport_only: is_barrel(&root),
            specifiers,
        })
    }
}

/// A barrel holds nothing but `export … from` statements (and comments).
fn is_barrel(root: &Node<'_>) -> bool {
    let mut cursor = root.walk();
    let mut reexports = 0;
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "comment" => {}
            "export_statement" if node.child_by_field_name("source").is_some() => reexports += 1,
            _ => return false,
        }
    }
    reexports > 0
}

fn first_error_line(root: &Node<'_>) -> usize {
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return node.start_position().row + 1;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev().filter(Node::has_error));
    }
    root.start_position().row + 1
}
