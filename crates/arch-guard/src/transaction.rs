//! Change transactions around source edits.
//!
//! The auto-corrector never edits a tree without an open change. A
//! [`ChangeTransaction`] snapshots the tree on `begin_change` and either keeps
//! the edits (`commit_change`) or restores the snapshot (`rollback_change`).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use arch_guard_core::paths::to_slash;
use arch_guard_graph::resolve::PROBE_EXTENSIONS;
use tracing::{debug, warn};

/// Result of opening a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBegin {
    /// Change identifier.
    pub id: String,
    /// Identifier of the snapshot taken for the change.
    pub snapshot_id: String,
}

/// Result of committing a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCommit {
    /// Identifier of the committed change.
    pub change_id: String,
}

/// Per-file outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreResult {
    /// Files written back to their snapshot content (or deleted if new).
    pub restored_files: Vec<String>,
    /// Files that could not be restored.
    pub failed_files: Vec<String>,
    /// One message per failure.
    pub errors: Vec<String>,
}

/// Result of rolling back a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRollback {
    /// Every file was restored.
    pub success: bool,
    /// Per-file details.
    pub restore_result: RestoreResult,
}

/// Transaction failures.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// A change is already open for this root.
    #[error("a change is already open for {}", .0.display())]
    AlreadyOpen(PathBuf),
    /// No change is open for this root.
    #[error("no open change for {}", .0.display())]
    NoOpenChange(PathBuf),
    /// The id does not name the open change.
    #[error("unknown change id `{0}`")]
    UnknownChange(String),
    /// The snapshot could not be taken.
    #[error("failed to snapshot {}: {source}", path.display())]
    Snapshot {
        /// File or directory being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Snapshot and restore service for one or more roots.
pub trait ChangeTransaction: Send + Sync {
    /// Opens a change for `root`, snapshotting its current state.
    ///
    /// # Errors
    ///
    /// Returns an error if a change is already open or the snapshot fails.
    fn begin_change(&self, root: &Path, message: &str) -> Result<ChangeBegin, TransactionError>;

    /// Keeps the edits made since `begin_change`.
    ///
    /// # Errors
    ///
    /// Returns an error if no change is open.
    fn commit_change(&self, root: &Path) -> Result<ChangeCommit, TransactionError>;

    /// Restores the snapshot of the open change (which must be `id` when
    /// given).
    ///
    /// # Errors
    ///
    /// Returns an error if no matching change is open. Per-file restore
    /// failures are reported in the result, not as an error.
    fn rollback_change(
        &self,
        root: &Path,
        id: Option<&str>,
    ) -> Result<ChangeRollback, TransactionError>;
}

struct OpenChange {
    id: String,
    message: String,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

/// In-memory snapshots of a root's source files.
///
/// Only files with a source extension are captured. Hidden and git-ignored
/// files are left alone.
#[derive(Default)]
pub struct MemorySnapshot {
    open: Mutex<HashMap<PathBuf, OpenChange>>,
    next_id: AtomicU64,
}

impl MemorySnapshot {
    /// Creates an empty snapshot store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn source_files(root: &Path) -> Result<Vec<PathBuf>, TransactionError> {
        let mut files = Vec::new();
        for entry in ignore::WalkBuilder::new(root).require_git(false).build() {
            let entry = entry.map_err(|e| TransactionError::Snapshot {
                path: root.to_path_buf(),
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk failed")),
            })?;
            let is_source = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| PROBE_EXTENSIONS.contains(&e));
            if is_source && entry.file_type().is_some_and(|t| t.is_file()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn key(root: &Path) -> PathBuf {
        root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
    }

    fn label(root: &Path, path: &Path) -> String {
        path.strip_prefix(root).map_or_else(|_| path.display().to_string(), to_slash)
    }
}

impl ChangeTransaction for MemorySnapshot {
    fn begin_change(&self, root: &Path, message: &str) -> Result<ChangeBegin, TransactionError> {
        let root = Self::key(root);
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if open.contains_key(&root) {
            return Err(TransactionError::AlreadyOpen(root));
        }

        let mut files = BTreeMap::new();
        for path in Self::source_files(&root)? {
            let content = std::fs::read(&path).map_err(|source| TransactionError::Snapshot {
                path: path.clone(),
                source,
            })?;
            files.insert(path, content);
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("change-{n}");
        debug!("Opened {id} ({} files): {message}", files.len());
        open.insert(
            root,
            OpenChange {
                id: id.clone(),
                message: message.to_string(),
                files,
            },
        );
        Ok(ChangeBegin {
            id,
            snapshot_id: format!("snapshot-{n}"),
        })
    }

    fn commit_change(&self, root: &Path) -> Result<ChangeCommit, TransactionError> {
        let root = Self::key(root);
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        let change = open
            .remove(&root)
            .ok_or(TransactionError::NoOpenChange(root))?;
        debug!("Committed {}: {}", change.id, change.message);
        Ok(ChangeCommit {
            change_id: change.id,
        })
    }

    fn rollback_change(
        &self,
        root: &Path,
        id: Option<&str>,
    ) -> Result<ChangeRollback, TransactionError> {
        let root = Self::key(root);
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        match (open.get(&root), id) {
            (None, _) => return Err(TransactionError::NoOpenChange(root)),
            (Some(change), Some(id)) if change.id != id => {
                return Err(TransactionError::UnknownChange(id.to_string()));
            }
            _ => {}
        }
        let Some(change) = open.remove(&root) else {
            return Err(TransactionError::NoOpenChange(root));
        };

        let mut result = RestoreResult::default();
        for (path, content) in &change.files {
            let label = Self::label(&root, path);
            let unchanged = std::fs::read(path).is_ok_and(|current| &current == content);
            if unchanged {
                continue;
            }
            match std::fs::write(path, content) {
                Ok(()) => result.restored_files.push(label),
                Err(e) => {
                    result.errors.push(format!("{label}: {e}"));
                    result.failed_files.push(label);
                }
            }
        }

        // Files created while the change was open.
        if let Ok(current) = Self::source_files(&root) {
            for path in current {
                if change.files.contains_key(&path) {
                    continue;
                }
                let label = Self::label(&root, &path);
                match std::fs::remove_file(&path) {
                    Ok(()) => result.restored_files.push(label),
                    Err(e) => {
                        result.errors.push(format!("{label}: {e}"));
                        result.failed_files.push(label);
                    }
                }
            }
        }

        if !result.failed_files.is_empty() {
            warn!(
                "Rollback of {} left {} file(s) unrestored",
                change.id,
                result.failed_files.len()
            );
        }
        Ok(ChangeRollback {
            success: result.failed_files.is_empty(),
            restore_result: result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn rollback_restores_and_removes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.ts"), "original\n").unwrap();

        let tx = MemorySnapshot::new();
        let begin = tx.begin_change(dir.path(), "test").unwrap();
        fs::write(dir.path().join("src/a.ts"), "edited\n").unwrap();
        fs::write(dir.path().join("src/new.ts"), "new\n").unwrap();

        let rollback = tx.rollback_change(dir.path(), Some(&begin.id)).unwrap();
        assert!(rollback.success);
        assert_eq!(
            fs::read_to_string(dir.path().join("src/a.ts")).unwrap(),
            "original\n"
        );
        assert!(!dir.path().join("src/new.ts").exists());
        assert_eq!(rollback.restore_result.restored_files, vec!["src/a.ts", "src/new.ts"]);
    }

    #[test]
    fn one_open_change_per_root() {
        let dir = TempDir::new().unwrap();
        let tx = MemorySnapshot::new();
        tx.begin_change(dir.path(), "first").unwrap();
        assert!(matches!(
            tx.begin_change(dir.path(), "second"),
            Err(TransactionError::AlreadyOpen(_))
        ));
        let commit = tx.commit_change(dir.path()).unwrap();
        assert_eq!(commit.change_id, "change-1");
        assert!(matches!(
            tx.commit_change(dir.path()),
            Err(TransactionError::NoOpenChange(_))
        ));
    }

    #[test]
    fn rollback_checks_id() {
        let dir = TempDir::new().unwrap();
        let tx = MemorySnapshot::new();
        tx.begin_change(dir.path(), "x").unwrap();
        assert!(matches!(
            tx.rollback_change(dir.path(), Some("change-99")),
            Err(TransactionError::UnknownChange(_))
        ));
        assert!(tx.rollback_change(dir.path(), None).unwrap().success);
    }
}
