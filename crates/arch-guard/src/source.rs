//! Filesystem change sources for the watcher.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The path was created.
    Created,
    /// The path's content or metadata changed, or it was renamed.
    Modified,
    /// The path was removed.
    Removed,
}

/// One event from a [`WatchSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A path changed.
    Changed {
        /// Kind of change.
        kind: ChangeKind,
        /// Absolute path.
        path: PathBuf,
    },
    /// The source failed and will deliver no further events.
    Failed(String),
}

/// Subscription failures.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The backend could not watch the root.
    #[error("cannot watch {}: {message}", path.display())]
    Subscribe {
        /// Watched root.
        path: PathBuf,
        /// Backend message.
        message: String,
    },
    /// `subscribe` was called twice.
    #[error("source is already subscribed")]
    AlreadySubscribed,
}

/// A recursive filesystem change feed.
pub trait WatchSource: Send {
    /// Starts delivering events for everything under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be watched.
    fn subscribe(&mut self, root: &Path)
        -> Result<mpsc::UnboundedReceiver<SourceEvent>, SourceError>;

    /// Stops delivering events. Closing the receiver is the signal.
    fn unsubscribe(&mut self);
}

/// Native recursive watching through the `notify` crate.
#[derive(Default)]
pub struct NotifySource {
    watcher: Option<RecommendedWatcher>,
}

impl NotifySource {
    /// Creates an unsubscribed source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Maps a notify event under `root`. Removal of `root` itself ends the feed.
fn translate(event: Event, root: &Path) -> Vec<SourceEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return Vec::new(),
    };
    event
        .paths
        .into_iter()
        .map(|path| {
            if kind == ChangeKind::Removed && path == root {
                SourceEvent::Failed(format!("watched root {} was removed", path.display()))
            } else {
                SourceEvent::Changed { kind, path }
            }
        })
        .collect()
}

impl WatchSource for NotifySource {
    fn subscribe(
        &mut self,
        root: &Path,
    ) -> Result<mpsc::UnboundedReceiver<SourceEvent>, SourceError> {
        if self.watcher.is_some() {
            return Err(SourceError::AlreadySubscribed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let watched = root.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for e in translate(event, &watched) {
                        let _ = tx.send(e);
                    }
                }
                Err(e) => {
                    let _ = tx.send(SourceEvent::Failed(e.to_string()));
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| SourceError::Subscribe {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| SourceError::Subscribe {
                path: root.to_path_buf(),
                message: e.to_string(),
            })?;
        self.watcher = Some(watcher);
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        self.watcher = None;
    }
}

/// A caller-driven source.
///
/// Events sent through the [`ChannelSender`] are delivered as if they came
/// from the filesystem. Useful for embedding and tests.
pub struct ChannelSource {
    rx: Option<mpsc::UnboundedReceiver<SourceEvent>>,
    unsubscribed: Arc<AtomicBool>,
}

/// Sending half of a [`ChannelSource`].
#[derive(Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<SourceEvent>,
    unsubscribed: Arc<AtomicBool>,
}

impl ChannelSource {
    /// Creates a source and its sender.
    #[must_use]
    pub fn new() -> (Self, ChannelSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let unsubscribed = Arc::new(AtomicBool::new(false));
        (
            Self {
                rx: Some(rx),
                unsubscribed: unsubscribed.clone(),
            },
            ChannelSender { tx, unsubscribed },
        )
    }
}

impl WatchSource for ChannelSource {
    fn subscribe(
        &mut self,
        _root: &Path,
    ) -> Result<mpsc::UnboundedReceiver<SourceEvent>, SourceError> {
        self.rx.take().ok_or(SourceError::AlreadySubscribed)
    }

    fn unsubscribe(&mut self) {
        self.unsubscribed.store(true, Ordering::SeqCst);
    }
}

impl ChannelSender {
    /// Delivers a change. Returns false once the watcher is gone.
    pub fn send(&self, kind: ChangeKind, path: impl Into<PathBuf>) -> bool {
        self.tx
            .send(SourceEvent::Changed {
                kind,
                path: path.into(),
            })
            .is_ok()
    }

    /// Delivers a source failure.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.tx.send(SourceEvent::Failed(message.into())).is_ok()
    }

    /// Whether the watcher has unsubscribed.
    #[must_use]
    pub fn is_unsubscribed(&self) -> bool {
        self.unsubscribed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn translates_notify_events() {
        let root = Path::new("/r");
        let created = translate(
            Event::new(EventKind::Create(CreateKind::File)).add_path("/r/a.ts".into()),
            root,
        );
        assert_eq!(
            created,
            vec![SourceEvent::Changed {
                kind: ChangeKind::Created,
                path: "/r/a.ts".into()
            }]
        );

        let modified = translate(
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/r/b.ts".into()),
            root,
        );
        assert!(matches!(
            modified[0],
            SourceEvent::Changed { kind: ChangeKind::Modified, .. }
        ));

        let removed = translate(
            Event::new(EventKind::Remove(RemoveKind::File)).add_path("/r/c.ts".into()),
            root,
        );
        assert!(matches!(
            removed[0],
            SourceEvent::Changed { kind: ChangeKind::Removed, .. }
        ));

        assert!(translate(Event::new(EventKind::Any).add_path("/r/d.ts".into()), root).is_empty());
    }

    #[test]
    fn root_removal_fails_the_feed() {
        let root = Path::new("/r");
        let events = translate(
            Event::new(EventKind::Remove(RemoveKind::Folder))
                .add_path("/r/src".into())
                .add_path("/r".into()),
            root,
        );
        assert!(matches!(
            events[0],
            SourceEvent::Changed { kind: ChangeKind::Removed, .. }
        ));
        assert_eq!(events[1], SourceEvent::Failed("watched root /r was removed".into()));

        // A modification of the root itself is not a removal.
        let touched = translate(
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/r".into()),
            root,
        );
        assert!(matches!(touched[0], SourceEvent::Changed { .. }));
    }

    #[tokio::test]
    async fn channel_source_subscribes_once() {
        let (mut source, sender) = ChannelSource::new();
        let mut rx = source.subscribe(Path::new("/r")).unwrap();
        assert!(matches!(
            source.subscribe(Path::new("/r")),
            Err(SourceError::AlreadySubscribed)
        ));

        assert!(sender.send(ChangeKind::Modified, "/r/a.ts"));
        assert!(matches!(rx.recv().await, Some(SourceEvent::Changed { .. })));

        source.unsubscribe();
        assert!(sender.is_unsubscribed());
    }
}
