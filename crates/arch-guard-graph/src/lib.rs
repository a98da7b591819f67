//! # arch-guard-graph
//!
//! Tree-sitter based import graph for layered-architecture guarding.
//!
//! This crate turns a source tree into a classified import graph and checks it
//! against a preset. It reuses `arch-guard-core` types (`Preset`, `Violation`,
//! `GuardConfig`) and adds:
//!
//! - [`SpecifierExtractor`] trait for pluggable language support
//! - [`TypeScriptExtractor`] for TypeScript/JavaScript specifiers
//! - [`LayerResolver`] for path-to-layer mapping
//! - [`SpecifierResolver`] for relative and aliased specifiers
//! - [`GraphBuilder`] and [`ImportGraph`] for full and incremental builds
//! - [`RuleEvaluator`] for the layer and route rules

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod extractor;
pub mod graph;
pub mod layer;
pub mod resolve;
pub mod typescript;

pub use engine::RuleEvaluator;
pub use extractor::{
    Binding, Bindings, ExtractError, Extraction, ImportKind, ImportSpecifier, SpecifierExtractor,
};
pub use graph::{FileError, FileUpdate, GraphBuilder, GraphError, ImportEdge, ImportGraph, SourceFile};
pub use layer::LayerResolver;
pub use resolve::{Resolution, SpecifierResolver};
pub use typescript::TypeScriptExtractor;
