//! # arch-guard
//!
//! Layered-architecture import guard for TypeScript and JavaScript trees.
//!
//! This is the main facade crate. It re-exports the core vocabulary and the
//! graph layer, and adds the long-running services on top of them:
//!
//! - [`check_directory`] for one-shot checks
//! - [`create_guard_watcher`] for incremental re-checking under a watcher
//! - [`AutoCorrectEngine`] for transactional specifier rewrites
//! - [`stats`] for scan history and trends
//!
//! ## One-shot check
//!
//! ```rust,ignore
//! use arch_guard::{check_directory, GuardConfig, PresetRegistry};
//!
//! let config = GuardConfig::for_preset("fsd");
//! let report = check_directory(&PresetRegistry::with_builtins(), &config, "./web".as_ref())?;
//! assert!(report.passes(config.guard.ci));
//! ```
//!
//! ## Watching
//!
//! ```rust,ignore
//! use arch_guard::{create_guard_watcher, NotifySource};
//!
//! let (mut watcher, events) = create_guard_watcher(&registry, &config, root, NotifySource::new())?;
//! let initial = watcher.start().await?;
//! events.drive(&mut my_handler).await;
//! ```

#![forbid(unsafe_code)]

pub use arch_guard_core::*;

/// Import graph construction and rule evaluation.
pub mod graph {
    pub use arch_guard_graph::*;
}

mod check;
pub mod correct;
pub mod source;
pub mod stats;
pub mod transaction;
pub mod watcher;

pub use check::{check_directory, GuardError, GuardManifest};
pub use correct::{AutoCorrectEngine, AutoCorrectResult, CorrectError, CorrectionStep};
pub use source::{ChangeKind, ChannelSender, ChannelSource, NotifySource, SourceEvent, WatchSource};
pub use stats::{
    add_scan_record, analyze_trend, calculate_layer_statistics, create_scan_record,
    load_statistics, LayerStatistics, ScanRecord, StatsError, Trend, TrendDirection,
};
pub use transaction::{ChangeTransaction, MemorySnapshot, TransactionError};
pub use watcher::{
    create_guard_watcher, GuardWatcher, WatchError, WatchEvent, WatchEvents, WatchHandler,
    WatchState,
};
