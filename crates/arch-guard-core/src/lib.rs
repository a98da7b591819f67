//! # arch-guard-core
//!
//! Core types for layered-architecture import guarding.
//!
//! This crate provides the vocabulary shared by the graph builder, the watcher
//! and the auto-corrector:
//!
//! - [`PresetRegistry`] and [`Preset`] for named layer hierarchies
//! - [`GuardConfig`] for TOML-based configuration
//! - [`Violation`] and [`RuleId`] for guard findings
//! - [`Report`] for the stable, serializable check result
//!
//! ## Example
//!
//! ```ignore
//! use arch_guard_core::{GuardConfig, PresetRegistry};
//!
//! let config = GuardConfig::from_file("arch-guard.toml".as_ref())?;
//! let registry = config.registry()?;
//! let preset = registry.get(&config.guard.preset)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod preset;
mod report;
mod types;

/// Relative path and glob helpers.
pub mod paths;

pub use config::{ConfigError, GuardConfig, GuardSection, DEFAULT_DEBOUNCE_MS};
pub use preset::{
    builtin_presets, FileRole, FsRouteRules, Preset, PresetError, PresetRegistry, PresetSummary,
};
pub use report::{sort_violations, Report, SeverityCounts};
pub use types::{ImportFix, RuleId, Severity, Violation, ViolationKey, AUTO_CORRECTABLE_RULES};
