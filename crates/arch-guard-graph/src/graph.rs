//! Import graph construction.
//!
//! [`GraphBuilder`] discovers source files under a root, extracts their
//! specifiers in parallel, resolves them against the discovered file set and
//! classifies both endpoints into layers. The resulting [`ImportGraph`] keeps
//! a reverse index so the watcher can find importers of a changed file
//! without rescanning the tree.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use arch_guard_core::paths::{to_slash, PathFilter};
use arch_guard_core::{ConfigError, FileRole, GuardConfig, Preset};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::extractor::{Bindings, ExtractError, ImportKind, ImportSpecifier, SpecifierExtractor};
use crate::layer::LayerResolver;
use crate::resolve::{candidates, Resolution, SpecifierResolver};
use crate::typescript::TypeScriptExtractor;

/// A source file that was read, parsed and classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Project-relative path, `/`-separated.
    pub path: String,
    /// Layer the file belongs to, if any.
    pub layer: Option<String>,
    /// Route role inside the route layer, if any.
    pub role: Option<FileRole>,
    /// Specifiers in source order.
    pub specifiers: Vec<ImportSpecifier>,
    /// Packages and out-of-root paths this file imports.
    pub externals: Vec<String>,
    /// Bases of relative/aliased specifiers with no matching file.
    pub unresolved: Vec<String>,
    /// The file only re-exports other modules.
    pub reexport_only: bool,
}

/// A resolved in-tree import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEdge {
    /// Importing file.
    pub from_file: String,
    /// Imported file.
    pub to_file: String,
    /// Layer of the importing file.
    pub from_layer: Option<String>,
    /// Layer of the imported file.
    pub to_layer: Option<String>,
    /// Line of the specifier (1-indexed).
    pub line: usize,
    /// Column of the specifier (0-indexed).
    pub column: usize,
    /// Specifier as written.
    pub specifier: String,
    /// How the import was written.
    pub kind: ImportKind,
    /// Names the import binds.
    pub bindings: Bindings,
}

/// Why a discovered file was left out of the graph.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// The file could not be read (missing, unreadable, not UTF-8).
    #[error("cannot read {path}: {source}")]
    Io {
        /// Project-relative path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file could not be parsed.
    #[error("cannot parse {path}: {source}")]
    Extract {
        /// Project-relative path.
        path: String,
        /// Underlying error.
        #[source]
        source: ExtractError,
    },
    /// No extractor handles this extension.
    #[error("unsupported file type: {0}")]
    Unsupported(String),
}

/// Failures that abort a whole build.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The root directory does not exist or is not a directory.
    #[error("root directory not found: {}", .0.display())]
    RootNotFound(PathBuf),
    /// Directory walk failed.
    #[error("failed to walk source tree: {0}")]
    Walk(#[from] ignore::Error),
    /// Include/exclude patterns are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The parse thread pool could not be created.
    #[error("failed to build thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Outcome of an incremental update of one file.
#[derive(Debug)]
pub enum FileUpdate {
    /// The file was (re)parsed and linked.
    Updated,
    /// The file no longer exists or is no longer tracked.
    Removed,
    /// The file exists but could not be analyzed; it stays known but has no
    /// outgoing edges.
    Failed(FileError),
}

/// The import graph of one root.
#[derive(Debug, Default, Clone)]
pub struct ImportGraph {
    /// Every tracked file on disk, parsed or not.
    known: BTreeSet<String>,
    files: BTreeMap<String, SourceFile>,
    outgoing: BTreeMap<String, Vec<ImportEdge>>,
    importers: HashMap<String, BTreeSet<String>>,
    reexporters: HashMap<String, BTreeSet<String>>,
    dangling: HashMap<String, BTreeSet<String>>,
    skipped: BTreeMap<String, String>,
}

impl ImportGraph {
    /// Number of files that were read, parsed and classified.
    #[must_use]
    pub fn files_analyzed(&self) -> usize {
        self.files.len()
    }

    /// Whether `path` is a tracked file on disk.
    #[must_use]
    pub fn is_known(&self, path: &str) -> bool {
        self.known.contains(path)
    }

    /// Known files below the directory `dir`, ordered by path.
    #[must_use]
    pub fn known_under(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.known
            .range(prefix.clone()..)
            .take_while(|p| p.starts_with(&prefix))
            .cloned()
            .collect()
    }

    /// All analyzed files, ordered by path.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// One analyzed file.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.files.get(path)
    }

    /// Outgoing edges of one file, in source order.
    #[must_use]
    pub fn edges_from(&self, path: &str) -> &[ImportEdge] {
        self.outgoing.get(path).map_or(&[], Vec::as_slice)
    }

    /// All edges, ordered by importing file then line.
    pub fn edges(&self) -> impl Iterator<Item = &ImportEdge> {
        self.outgoing.values().flatten()
    }

    /// Files with an edge into `path`.
    #[must_use]
    pub fn importers_of(&self, path: &str) -> BTreeSet<String> {
        self.importers.get(path).cloned().unwrap_or_default()
    }

    /// Files that re-export `path`.
    #[must_use]
    pub fn reexporters_of(&self, path: &str) -> BTreeSet<String> {
        self.reexporters.get(path).cloned().unwrap_or_default()
    }

    /// Files holding an unresolved specifier that `path` would now satisfy.
    #[must_use]
    pub fn dangling_importers(&self, path: &str) -> BTreeSet<String> {
        self.dangling
            .iter()
            .filter(|(base, _)| candidates(base).iter().any(|c| c == path))
            .flat_map(|(_, importers)| importers.iter().cloned())
            .collect()
    }

    /// Files that were discovered but skipped, with the reason.
    #[must_use]
    pub fn skipped(&self) -> &BTreeMap<String, String> {
        &self.skipped
    }

    fn insert(&mut self, file: SourceFile, edges: Vec<ImportEdge>) {
        let path = file.path.clone();
        self.unlink(&path);
        for edge in &edges {
            self.importers
                .entry(edge.to_file.clone())
                .or_default()
                .insert(path.clone());
            if edge.kind == ImportKind::Reexport {
                self.reexporters
                    .entry(edge.to_file.clone())
                    .or_default()
                    .insert(path.clone());
            }
        }
        for base in &file.unresolved {
            self.dangling
                .entry(base.clone())
                .or_default()
                .insert(path.clone());
        }
        self.known.insert(path.clone());
        self.skipped.remove(&path);
        self.outgoing.insert(path.clone(), edges);
        self.files.insert(path, file);
    }

    fn mark_skipped(&mut self, path: &str, reason: String) {
        self.unlink(path);
        self.known.insert(path.to_string());
        self.skipped.insert(path.to_string(), reason);
    }

    fn forget(&mut self, path: &str) {
        self.unlink(path);
        self.known.remove(path);
        self.skipped.remove(path);
    }

    /// Drops a file's node and its outgoing index entries. Edges pointing at
    /// the file stay until their importers are relinked.
    fn unlink(&mut self, path: &str) {
        if let Some(edges) = self.outgoing.remove(path) {
            for edge in edges {
                remove_entry(&mut self.importers, &edge.to_file, path);
                remove_entry(&mut self.reexporters, &edge.to_file, path);
            }
        }
        if let Some(file) = self.files.remove(path) {
            for base in &file.unresolved {
                remove_entry(&mut self.dangling, base, path);
            }
        }
    }
}

fn remove_entry(index: &mut HashMap<String, BTreeSet<String>>, key: &str, value: &str) {
    if let Some(set) = index.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

/// Builds and incrementally maintains an [`ImportGraph`] for one root.
pub struct GraphBuilder {
    root: PathBuf,
    filter: PathFilter,
    layers: LayerResolver,
    resolver: SpecifierResolver,
    extractors: Vec<Box<dyn SpecifierExtractor>>,
    parallelism: Option<usize>,
}

impl GraphBuilder {
    /// Creates a builder for `root` classified by `preset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist or the include/exclude
    /// patterns are invalid.
    pub fn new(root: &Path, preset: &Preset, config: &GuardConfig) -> Result<Self, GraphError> {
        let root = root
            .canonicalize()
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| GraphError::RootNotFound(root.to_path_buf()))?;
        let filter = PathFilter::new(config.include_patterns()?, config.exclude_patterns()?);
        Ok(Self {
            root,
            filter,
            layers: LayerResolver::new(preset),
            resolver: SpecifierResolver::new(&config.aliases),
            extractors: vec![Box::new(TypeScriptExtractor::new())],
            parallelism: config.guard.parallelism,
        })
    }

    /// Canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project-relative path for an absolute path under the root.
    #[must_use]
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let rel = to_slash(rel);
        (!rel.is_empty()).then_some(rel)
    }

    /// Whether a project-relative path is a supported, admitted source file.
    #[must_use]
    pub fn is_tracked(&self, rel_path: &str) -> bool {
        self.extractor_for(rel_path).is_some() && self.filter.admits(rel_path)
    }

    fn extractor_for(&self, rel_path: &str) -> Option<&dyn SpecifierExtractor> {
        let name = rel_path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        self.extractors
            .iter()
            .find(|e| e.extensions().contains(&ext))
            .map(|e| &**e)
    }

    /// Lists tracked files under the root, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory walk fails.
    pub fn discover(&self) -> Result<Vec<String>, GraphError> {
        self.walk(&self.root)
    }

    /// Lists tracked files below the project-relative directory `rel_dir`,
    /// sorted. Hidden directories yield nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory walk fails.
    pub fn discover_under(&self, rel_dir: &str) -> Result<Vec<String>, GraphError> {
        if rel_dir.split('/').any(|segment| segment.starts_with('.')) {
            return Ok(Vec::new());
        }
        self.walk(&self.root.join(rel_dir))
    }

    fn walk(&self, start: &Path) -> Result<Vec<String>, GraphError> {
        let mut files = Vec::new();
        let walker = ignore::WalkBuilder::new(start)
            .hidden(true)
            .git_ignore(true)
            .require_git(false)
            .build();

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Some(rel) = self.relative(entry.path()) {
                if self.is_tracked(&rel) {
                    files.push(rel);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Tracked files a change at `rel_path` stands for.
    ///
    /// A tracked path is itself. Anything else is treated as a directory:
    /// the files the graph knows below it (gone if it was removed or moved
    /// away) plus the tracked files now on disk below it.
    #[must_use]
    pub fn affected_files(&self, graph: &ImportGraph, rel_path: &str) -> BTreeSet<String> {
        if self.is_tracked(rel_path) {
            return BTreeSet::from([rel_path.to_string()]);
        }
        let mut files: BTreeSet<String> = graph.known_under(rel_path).into_iter().collect();
        if self.root.join(rel_path).is_dir() {
            match self.discover_under(rel_path) {
                Ok(found) => files.extend(found),
                Err(e) => warn!("Cannot list {rel_path}: {e}"),
            }
        }
        files
    }

    /// Builds the full graph.
    ///
    /// Files that cannot be read or parsed are skipped with a warning and
    /// recorded in [`ImportGraph::skipped`].
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or the thread pool cannot start.
    pub fn build(&self) -> Result<ImportGraph, GraphError> {
        info!("Starting analysis at {}", self.root.display());
        let discovered = self.discover()?;
        info!("Found {} source files", discovered.len());

        let parsed: Vec<(String, Result<SourceFile, FileError>)> = match self.parallelism {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                pool.install(|| self.parse_all(&discovered))
            }
            None => self.parse_all(&discovered),
        };

        let mut graph = ImportGraph {
            known: discovered.into_iter().collect(),
            ..ImportGraph::default()
        };
        for (path, result) in parsed {
            match result {
                Ok(file) => {
                    let (file, edges) = self.link(&graph.known, file);
                    graph.insert(file, edges);
                }
                Err(e) => {
                    warn!("Skipping {path}: {e}");
                    graph.mark_skipped(&path, e.to_string());
                }
            }
        }

        info!(
            "Analyzed {} files ({} skipped)",
            graph.files_analyzed(),
            graph.skipped.len()
        );
        Ok(graph)
    }

    fn parse_all(&self, paths: &[String]) -> Vec<(String, Result<SourceFile, FileError>)> {
        paths
            .par_iter()
            .map(|path| (path.clone(), self.parse(path)))
            .collect()
    }

    /// Reads, parses and classifies one file without linking it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn parse(&self, rel_path: &str) -> Result<SourceFile, FileError> {
        debug!("Analyzing: {rel_path}");
        let extractor = self
            .extractor_for(rel_path)
            .ok_or_else(|| FileError::Unsupported(rel_path.to_string()))?;
        let source =
            std::fs::read_to_string(self.root.join(rel_path)).map_err(|source| FileError::Io {
                path: rel_path.to_string(),
                source,
            })?;
        let extraction = extractor
            .extract(rel_path, &source)
            .map_err(|source| FileError::Extract {
                path: rel_path.to_string(),
                source,
            })?;

        let layer = self.layers.resolve(rel_path);
        Ok(SourceFile {
            path: rel_path.to_string(),
            layer: layer.map(str::to_string),
            role: self.layers.role(rel_path, layer),
            specifiers: extraction.specifiers,
            externals: Vec::new(),
            unresolved: Vec::new(),
            reexport_only: extraction.reexport_only,
        })
    }

    /// Resolves a parsed file's specifiers against the known file set.
    fn link(&self, known: &BTreeSet<String>, mut file: SourceFile) -> (SourceFile, Vec<ImportEdge>) {
        let mut edges = Vec::new();
        let mut externals = BTreeSet::new();
        let mut unresolved = BTreeSet::new();

        for spec in &file.specifiers {
            match self
                .resolver
                .resolve(&file.path, &spec.target, |p| known.contains(p))
            {
                Resolution::Internal(to) if to == file.path => {}
                Resolution::Internal(to) => {
                    let to_layer = self.layers.resolve(&to).map(str::to_string);
                    edges.push(ImportEdge {
                        from_file: file.path.clone(),
                        from_layer: file.layer.clone(),
                        to_file: to,
                        to_layer,
                        line: spec.line,
                        column: spec.column,
                        specifier: spec.target.clone(),
                        kind: spec.kind,
                        bindings: spec.bindings.clone(),
                    });
                }
                Resolution::External(name) => {
                    externals.insert(name);
                }
                Resolution::Unresolved { base } => {
                    debug!("Unresolved specifier `{}` in {}", spec.target, file.path);
                    unresolved.insert(base);
                }
            }
        }

        file.externals = externals.into_iter().collect();
        file.unresolved = unresolved.into_iter().collect();
        (file, edges)
    }

    /// Re-reads one file and relinks it in place.
    ///
    /// A file that vanished (or stopped being tracked) is removed from the
    /// graph. Edges of other files into it are not touched; relink those
    /// through their own updates.
    pub fn update_file(&self, graph: &mut ImportGraph, rel_path: &str) -> FileUpdate {
        if !self.is_tracked(rel_path) || !self.root.join(rel_path).is_file() {
            debug!("Removing {rel_path} from graph");
            graph.forget(rel_path);
            return FileUpdate::Removed;
        }

        graph.known.insert(rel_path.to_string());
        match self.parse(rel_path) {
            Ok(file) => {
                let (file, edges) = self.link(&graph.known, file);
                graph.insert(file, edges);
                FileUpdate::Updated
            }
            Err(e) => {
                warn!("Skipping {rel_path}: {e}");
                graph.mark_skipped(rel_path, e.to_string());
                FileUpdate::Failed(e)
            }
        }
    }

    /// Drops a file from the graph.
    pub fn remove_file(&self, graph: &mut ImportGraph, rel_path: &str) {
        graph.forget(rel_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch_guard_core::PresetRegistry;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn builder(dir: &TempDir) -> GraphBuilder {
        let registry = PresetRegistry::with_builtins();
        let preset = registry.get("fsd").unwrap();
        GraphBuilder::new(dir.path(), preset, &GuardConfig::for_preset("fsd")).unwrap()
    }

    #[test]
    fn builds_edges_with_layers() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/shared/ui/button.ts", "export const Button = 1;\n");
        write(
            &dir,
            "src/features/auth/login.ts",
            "import { Button } from '../../shared/ui/button';\nimport React from 'react';\n",
        );

        let graph = builder(&dir).build().unwrap();
        assert_eq!(graph.files_analyzed(), 2);

        let edges = graph.edges_from("src/features/auth/login.ts");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to_file, "src/shared/ui/button.ts");
        assert_eq!(edges[0].from_layer.as_deref(), Some("features"));
        assert_eq!(edges[0].to_layer.as_deref(), Some("shared"));
        assert_eq!(edges[0].line, 1);

        let login = graph.file("src/features/auth/login.ts").unwrap();
        assert_eq!(login.externals, vec!["react"]);
        assert!(graph
            .importers_of("src/shared/ui/button.ts")
            .contains("src/features/auth/login.ts"));
    }

    #[test]
    fn skips_unparsable_and_excluded_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/shared/ok.ts", "export const ok = 1;\n");
        write(&dir, "src/shared/broken.ts", "import { from ;;;\n");
        write(&dir, "node_modules/react/index.js", "module.exports = {};\n");
        write(&dir, "src/shared/readme.md", "# not source\n");

        let graph = builder(&dir).build().unwrap();
        assert_eq!(graph.files_analyzed(), 1);
        assert!(graph.skipped().contains_key("src/shared/broken.ts"));
        assert!(graph.is_known("src/shared/broken.ts"));
        assert!(!graph.is_known("node_modules/react/index.js"));
    }

    #[test]
    fn records_reexporters_and_barrels() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/shared/session.ts", "export const s = 1;\n");
        write(&dir, "src/features/auth/index.ts", "export * from '../../shared/session';\n");

        let graph = builder(&dir).build().unwrap();
        assert!(graph
            .reexporters_of("src/shared/session.ts")
            .contains("src/features/auth/index.ts"));
        assert!(graph.file("src/features/auth/index.ts").unwrap().reexport_only);
    }

    #[test]
    fn incremental_update_tracks_dangling_specifiers() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/entities/user.ts", "import { x } from '../shared/later';\n");

        let b = builder(&dir);
        let mut graph = b.build().unwrap();
        assert!(graph.edges_from("src/entities/user.ts").is_empty());

        write(&dir, "src/shared/later.ts", "export const x = 1;\n");
        assert!(matches!(
            b.update_file(&mut graph, "src/shared/later.ts"),
            FileUpdate::Updated
        ));
        let waiting = graph.dangling_importers("src/shared/later.ts");
        assert!(waiting.contains("src/entities/user.ts"));

        b.update_file(&mut graph, "src/entities/user.ts");
        assert_eq!(graph.edges_from("src/entities/user.ts").len(), 1);
        assert!(graph.dangling_importers("src/shared/later.ts").is_empty());
    }

    #[test]
    fn incremental_removal_keeps_reverse_index_until_relink() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/shared/a.ts", "export const a = 1;\n");
        write(&dir, "src/entities/b.ts", "import { a } from '../shared/a';\n");

        let b = builder(&dir);
        let mut graph = b.build().unwrap();

        fs::remove_file(dir.path().join("src/shared/a.ts")).unwrap();
        assert!(matches!(
            b.update_file(&mut graph, "src/shared/a.ts"),
            FileUpdate::Removed
        ));
        assert!(!graph.is_known("src/shared/a.ts"));
        assert!(graph.importers_of("src/shared/a.ts").contains("src/entities/b.ts"));

        b.update_file(&mut graph, "src/entities/b.ts");
        assert!(graph.importers_of("src/shared/a.ts").is_empty());
        assert_eq!(
            graph.file("src/entities/b.ts").unwrap().unresolved,
            vec!["src/shared/a"]
        );
    }

    #[test]
    fn directory_changes_expand_to_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/features/auth/login.ts", "export const login = 1;\n");
        write(&dir, "src/features/auth/model/session.ts", "export const s = 1;\n");
        write(&dir, "src/features/authz.ts", "export const z = 1;\n");
        let b = builder(&dir);
        let graph = b.build().unwrap();

        assert_eq!(
            graph.known_under("src/features/auth"),
            vec!["src/features/auth/login.ts", "src/features/auth/model/session.ts"]
        );

        // Renamed away: only the graph remembers the old files.
        fs::rename(
            dir.path().join("src/features/auth"),
            dir.path().join("moved-away"),
        )
        .unwrap();
        let gone = b.affected_files(&graph, "src/features/auth");
        assert_eq!(gone.len(), 2);

        // The new name is found on disk.
        fs::rename(dir.path().join("moved-away"), dir.path().join("src/features/login")).unwrap();
        let added = b.affected_files(&graph, "src/features/login");
        assert!(added.contains("src/features/login/login.ts"));
        assert!(added.contains("src/features/login/model/session.ts"));

        assert_eq!(
            b.affected_files(&graph, "src/features/authz.ts"),
            BTreeSet::from(["src/features/authz.ts".to_string()])
        );
        assert!(b.affected_files(&graph, "README.md").is_empty());
    }

    #[test]
    fn respects_parallelism_setting() {
        let dir = TempDir::new().unwrap();
        for i in 0..8 {
            write(&dir, &format!("src/shared/m{i}.ts"), "export const v = 1;\n");
        }
        let registry = PresetRegistry::with_builtins();
        let mut config = GuardConfig::for_preset("fsd");
        config.guard.parallelism = Some(2);
        let b = GraphBuilder::new(dir.path(), registry.get("fsd").unwrap(), &config).unwrap();
        assert_eq!(b.build().unwrap().files_analyzed(), 8);
    }

    #[test]
    fn missing_root_is_an_error() {
        let registry = PresetRegistry::with_builtins();
        let result = GraphBuilder::new(
            Path::new("/definitely/not/here"),
            registry.get("fsd").unwrap(),
            &GuardConfig::for_preset("fsd"),
        );
        assert!(matches!(result, Err(GraphError::RootNotFound(_))));
    }
}
