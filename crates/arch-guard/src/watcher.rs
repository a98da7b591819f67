//! Real-time guarding.
//!
//! A [`GuardWatcher`] keeps the import graph of one root alive, listens to a
//! [`WatchSource`], coalesces bursts of changes over a debounce window and
//! re-evaluates only the affected files: the changed files (every file below
//! a changed directory), the files that import them, and importers whose
//! dangling specifiers a new file satisfies. Removal of the root itself is a
//! terminal error.
//!
//! ```text
//! Idle -> Watching <-> Debouncing -> Reanalyzing -> Watching
//!   \________\______________\______________\-----> Stopped
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arch_guard_core::{GuardConfig, PresetRegistry, Report, Violation, ViolationKey};
use arch_guard_graph::{FileUpdate, GraphBuilder, ImportGraph};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::check::{GuardError, Pipeline};
use crate::source::{SourceError, SourceEvent, WatchSource};

/// Lifecycle state of a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Created, not started.
    Idle,
    /// Waiting for changes.
    Watching,
    /// Collecting changes until the debounce window closes.
    Debouncing,
    /// Re-evaluating the affected files.
    Reanalyzing,
    /// Terminal.
    Stopped,
}

/// Something the watcher reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file was re-evaluated. `violations` is its complete current set.
    FileAnalyzed {
        /// Project-relative path.
        file: String,
        /// All current violations of the file.
        violations: Vec<Violation>,
        /// Why the file could not be analyzed, if it could not.
        diagnostic: Option<String>,
    },
    /// A violation that the file did not have before this reanalysis.
    Violation(Violation),
    /// A non-recoverable source problem. Followed by [`WatchEvent::Stopped`].
    Error(String),
    /// The watcher stopped; no further events follow.
    Stopped,
}

/// Callbacks for [`WatchEvents::drive`].
pub trait WatchHandler {
    /// A file was re-evaluated.
    fn on_file_analyzed(
        &mut self,
        _file: &str,
        _violations: &[Violation],
        _diagnostic: Option<&str>,
    ) {
    }

    /// A new violation appeared.
    fn on_violation(&mut self, _violation: &Violation) {}

    /// The source failed.
    fn on_error(&mut self, _message: &str) {}

    /// The watcher stopped.
    fn on_stopped(&mut self) {}
}

/// Receiving end of a watcher's event stream.
pub struct WatchEvents {
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl WatchEvents {
    /// Next event, or `None` once the watcher is gone.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Dispatches events to `handler` until the watcher stops.
    pub async fn drive<H: WatchHandler + ?Sized>(mut self, handler: &mut H) {
        while let Some(event) = self.rx.recv().await {
            match event {
                WatchEvent::FileAnalyzed {
                    file,
                    violations,
                    diagnostic,
                } => handler.on_file_analyzed(&file, &violations, diagnostic.as_deref()),
                WatchEvent::Violation(v) => handler.on_violation(&v),
                WatchEvent::Error(message) => handler.on_error(&message),
                WatchEvent::Stopped => {
                    handler.on_stopped();
                    break;
                }
            }
        }
    }
}

/// Watcher failures.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The initial scan failed.
    #[error(transparent)]
    Guard(#[from] GuardError),
    /// The source could not subscribe.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// `start` was called on a watcher that is not idle.
    #[error("watcher is {0:?}, not idle")]
    NotIdle(WatchState),
    /// A background task panicked or was cancelled.
    #[error("watch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

struct Shared {
    state: Mutex<WatchState>,
    alive: AtomicBool,
    tx: mpsc::UnboundedSender<WatchEvent>,
}

impl Shared {
    fn state(&self) -> WatchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: WatchState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != WatchState::Stopped && *state != next {
            debug!("Watcher {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn emit(&self, event: WatchEvent) {
        if self.is_alive() {
            let _ = self.tx.send(event);
        }
    }

    /// Enters `Stopped` exactly once and announces it.
    fn stop(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = WatchState::Stopped;
        info!("Watcher stopped");
        let _ = self.tx.send(WatchEvent::Stopped);
    }
}

/// Retained analysis state of a watch session.
struct Session {
    graph: ImportGraph,
    violations: BTreeMap<String, Vec<Violation>>,
}

impl Session {
    fn seed(graph: ImportGraph, violations: Vec<Violation>) -> Self {
        let mut by_file: BTreeMap<String, Vec<Violation>> = graph
            .files()
            .map(|f| (f.path.clone(), Vec::new()))
            .collect();
        for v in violations {
            by_file.entry(v.file.clone()).or_default().push(v);
        }
        Self {
            graph,
            violations: by_file,
        }
    }

    /// Re-evaluates the files affected by the changed `paths` and returns the
    /// events to emit, in path order. A directory path stands for every file
    /// below it.
    fn reanalyze(&mut self, pipeline: &Pipeline, paths: &BTreeSet<String>) -> Vec<WatchEvent> {
        let builder = &pipeline.builder;
        let changed: BTreeSet<String> = paths
            .iter()
            .flat_map(|path| builder.affected_files(&self.graph, path))
            .collect();

        let mut importers = BTreeSet::new();
        for path in &changed {
            importers.extend(self.graph.importers_of(path));
        }

        let mut outcomes: BTreeMap<String, FileUpdate> = BTreeMap::new();
        for path in &changed {
            let outcome = builder.update_file(&mut self.graph, path);
            if matches!(outcome, FileUpdate::Updated) {
                importers.extend(self.graph.dangling_importers(path));
            }
            outcomes.insert(path.clone(), outcome);
        }
        for path in importers {
            if !outcomes.contains_key(&path) {
                let outcome = builder.update_file(&mut self.graph, &path);
                outcomes.insert(path, outcome);
            }
        }
        info!("Reanalyzed {} file(s) for {} change(s)", outcomes.len(), changed.len());

        let mut events = Vec::new();
        for (path, outcome) in outcomes {
            match outcome {
                FileUpdate::Removed => {
                    debug!("Dropped {path}");
                    self.violations.remove(&path);
                }
                FileUpdate::Failed(e) => {
                    self.violations.insert(path.clone(), Vec::new());
                    events.push(WatchEvent::FileAnalyzed {
                        file: path,
                        violations: Vec::new(),
                        diagnostic: Some(e.to_string()),
                    });
                }
                FileUpdate::Updated => {
                    let current = pipeline.evaluator.evaluate_file(&self.graph, &path);
                    let previous: HashSet<ViolationKey> = self
                        .violations
                        .get(&path)
                        .map(|vs| vs.iter().map(Violation::key).collect())
                        .unwrap_or_default();
                    let fresh: Vec<Violation> = current
                        .iter()
                        .filter(|v| !previous.contains(&v.key()))
                        .cloned()
                        .collect();
                    events.push(WatchEvent::FileAnalyzed {
                        file: path.clone(),
                        violations: current.clone(),
                        diagnostic: None,
                    });
                    events.extend(fresh.into_iter().map(WatchEvent::Violation));
                    self.violations.insert(path, current);
                }
            }
        }
        events
    }
}

/// Watches one root and re-evaluates changed files.
pub struct GuardWatcher {
    pipeline: Option<Arc<Pipeline>>,
    source: Box<dyn WatchSource>,
    shared: Arc<Shared>,
    debounce: Duration,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

/// Creates a watcher for `root` and the stream of its events.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the preset is unknown,
/// or the root does not exist.
pub fn create_guard_watcher(
    registry: &PresetRegistry,
    config: &GuardConfig,
    root: &Path,
    source: impl WatchSource + 'static,
) -> Result<(GuardWatcher, WatchEvents), GuardError> {
    let pipeline = Pipeline::new(registry, config, root)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let (cancel, _) = watch::channel(false);
    let watcher = GuardWatcher {
        pipeline: Some(Arc::new(pipeline)),
        source: Box::new(source),
        shared: Arc::new(Shared {
            state: Mutex::new(WatchState::Idle),
            alive: AtomicBool::new(true),
            tx,
        }),
        debounce: Duration::from_millis(config.guard.debounce_ms),
        cancel,
        task: None,
    };
    Ok((watcher, WatchEvents { rx }))
}

impl GuardWatcher {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WatchState {
        self.shared.state()
    }

    /// Runs the initial full check, subscribes the source and starts the
    /// event loop. Returns the initial report.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher is not idle, the initial scan fails, or
    /// the source cannot subscribe.
    pub async fn start(&mut self) -> Result<Report, WatchError> {
        let state = self.state();
        if state != WatchState::Idle {
            return Err(WatchError::NotIdle(state));
        }
        let Some(pipeline) = self.pipeline.take() else {
            return Err(WatchError::NotIdle(state));
        };

        let scan = {
            let pipeline = Arc::clone(&pipeline);
            tokio::task::spawn_blocking(move || pipeline.scan()).await?
        };
        let (graph, violations) = match scan {
            Ok(scan) => scan,
            Err(e) => {
                self.pipeline = Some(pipeline);
                return Err(e.into());
            }
        };
        let report = Report::aggregate(graph.files_analyzed(), violations.clone());
        let session = Session::seed(graph, violations);

        let rx = match self.source.subscribe(pipeline.builder.root()) {
            Ok(rx) => rx,
            Err(e) => {
                self.pipeline = Some(pipeline);
                return Err(e.into());
            }
        };

        info!(
            "Watching {} ({} files, debounce {} ms)",
            pipeline.builder.root().display(),
            report.files_analyzed,
            self.debounce.as_millis()
        );
        self.shared.set_state(WatchState::Watching);
        self.task = Some(tokio::spawn(event_loop(
            rx,
            session,
            pipeline,
            Arc::clone(&self.shared),
            self.debounce,
            self.cancel.subscribe(),
        )));
        Ok(report)
    }

    /// Stops watching. Results of an in-flight reanalysis are discarded.
    pub fn close(&mut self) {
        if self.state() == WatchState::Stopped {
            return;
        }
        self.shared.stop();
        let _ = self.cancel.send(true);
        self.source.unsubscribe();
        self.pipeline = None;
    }

    /// Waits for the event loop to exit after [`close`](Self::close) or a
    /// source failure.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for GuardWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// What ended a wait on the source.
enum Next {
    Event(SourceEvent),
    Quiet,
    Cancelled,
    Closed,
}

async fn event_loop(
    mut rx: mpsc::UnboundedReceiver<SourceEvent>,
    mut session: Session,
    pipeline: Arc<Pipeline>,
    shared: Arc<Shared>,
    debounce: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let mut pending: BTreeSet<String> = BTreeSet::new();

        let first = tokio::select! {
            _ = cancel.changed() => Next::Cancelled,
            event = rx.recv() => event.map_or(Next::Closed, Next::Event),
        };
        if !collect(first, &pipeline, &shared, &mut pending) {
            return;
        }
        if pending.is_empty() {
            continue;
        }

        shared.set_state(WatchState::Debouncing);
        let deadline = Instant::now() + debounce;
        loop {
            let next = tokio::select! {
                _ = cancel.changed() => Next::Cancelled,
                () = tokio::time::sleep_until(deadline) => Next::Quiet,
                event = rx.recv() => event.map_or(Next::Closed, Next::Event),
            };
            if matches!(next, Next::Quiet) {
                break;
            }
            if !collect(next, &pipeline, &shared, &mut pending) {
                return;
            }
        }

        shared.set_state(WatchState::Reanalyzing);
        let worker = Arc::clone(&pipeline);
        let result = tokio::task::spawn_blocking(move || {
            let events = session.reanalyze(&worker, &pending);
            (session, events)
        })
        .await;

        let events = match result {
            Ok((returned, events)) => {
                session = returned;
                events
            }
            Err(e) => {
                shared.emit(WatchEvent::Error(format!("reanalysis failed: {e}")));
                shared.stop();
                return;
            }
        };

        if !deliver(&shared, events) {
            return;
        }
    }
}

/// Emits the results of a finished reanalysis and resumes watching. Results
/// finishing after a close are dropped; returns false then.
fn deliver(shared: &Shared, events: Vec<WatchEvent>) -> bool {
    if !shared.is_alive() {
        debug!("Discarding {} event(s) after close", events.len());
        return false;
    }
    for event in events {
        shared.emit(event);
    }
    shared.set_state(WatchState::Watching);
    true
}

/// Folds one source outcome into `pending`. Returns false when the loop must
/// end.
fn collect(
    next: Next,
    pipeline: &Pipeline,
    shared: &Shared,
    pending: &mut BTreeSet<String>,
) -> bool {
    match next {
        Next::Event(SourceEvent::Changed { kind, path }) => {
            let builder = &pipeline.builder;
            if !builder.root().is_dir() {
                return fail(
                    shared,
                    format!("watched root {} was removed", builder.root().display()),
                );
            }
            if let Some(rel) = builder.relative(&path) {
                if concerns_sources(builder, &path, &rel) {
                    debug!("{kind:?}: {rel}");
                    pending.insert(rel);
                }
            }
            true
        }
        Next::Event(SourceEvent::Failed(message)) => fail(shared, message),
        Next::Closed => {
            if shared.is_alive() {
                fail(shared, "watch source closed".to_string());
            }
            false
        }
        Next::Cancelled => false,
        Next::Quiet => true,
    }
}

/// Reports a terminal source problem and stops. Always false.
fn fail(shared: &Shared, message: String) -> bool {
    warn!("Watch source failed: {message}");
    shared.emit(WatchEvent::Error(message));
    shared.stop();
    false
}

/// A tracked file, or a visible path that is a directory now or may have
/// been one before it went away.
fn concerns_sources(builder: &GraphBuilder, path: &Path, rel: &str) -> bool {
    if builder.is_tracked(rel) {
        return true;
    }
    let hidden = rel.split('/').any(|segment| segment.starts_with('.'));
    !hidden && (path.is_dir() || !path.exists())
}
