//! Watch command implementation.

use anyhow::{bail, Context, Result};
use arch_guard::{create_guard_watcher, NotifySource, Violation, WatchHandler};
use std::path::Path;

use super::output;
use super::GlobalOptions;
use crate::OutputFormat;

/// Prints watcher events as they arrive.
#[derive(Default)]
struct TerminalHandler {
    failure: Option<String>,
}

impl WatchHandler for TerminalHandler {
    fn on_file_analyzed(&mut self, file: &str, violations: &[Violation], diagnostic: Option<&str>) {
        match diagnostic {
            Some(reason) => tracing::warn!("{file}: not analyzed: {reason}"),
            None if violations.is_empty() => tracing::info!("{file}: clean"),
            None => tracing::info!("{file}: {} violation(s)", violations.len()),
        }
    }

    fn on_violation(&mut self, violation: &Violation) {
        output::print_violation(violation);
    }

    fn on_error(&mut self, message: &str) {
        self.failure = Some(message.to_string());
    }
}

/// Runs the watch command until interrupted.
pub fn run(path: &Path, debounce_ms: Option<u64>, options: &GlobalOptions) -> Result<()> {
    let mut manifest = options.manifest(path)?;
    if let Some(ms) = debounce_ms {
        manifest.config.guard.debounce_ms = ms;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async {
        let (mut watcher, events) = create_guard_watcher(
            &manifest.registry,
            &manifest.config,
            path,
            NotifySource::new(),
        )
        .with_context(|| format!("Failed to watch {}", path.display()))?;

        let initial = watcher.start().await.context("Initial check failed")?;
        output::print(&initial, OutputFormat::Text)?;
        tracing::info!("Watching for changes; press Ctrl-C to stop");

        let mut handler = TerminalHandler::default();
        tokio::select! {
            () = events.drive(&mut handler) => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                watcher.close();
            }
        }
        watcher.join().await;

        if let Some(message) = handler.failure {
            bail!("Watching stopped: {message}");
        }
        Ok(())
    })
}
