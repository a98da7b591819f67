//! Auto-correction of mechanically fixable violations.
//!
//! [`AutoCorrectEngine::run`] applies every bound [`ImportFix`] inside one
//! change transaction, re-checks the whole tree once, and keeps the edits only
//! if every targeted violation is gone and nothing new appeared. Anything else
//! rolls the tree back to its snapshot.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use arch_guard_core::paths::normalize;
use arch_guard_core::{sort_violations, ImportFix, Violation, ViolationKey};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::check::{GuardError, GuardManifest, Pipeline};
use crate::transaction::{ChangeTransaction, TransactionError};

/// One recorded action of a correction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionStep {
    /// What was attempted.
    pub action: String,
    /// Whether it succeeded.
    pub success: bool,
    /// Details.
    pub message: String,
}

/// Outcome of a correction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoCorrectResult {
    /// The edits were verified and committed.
    pub fixed: bool,
    /// The tree was restored to its snapshot.
    pub rolled_back: bool,
    /// Steps in the order they ran.
    pub steps: Vec<CorrectionStep>,
    /// Number of retried write attempts.
    pub retried_count: u32,
    /// Committed change id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_id: Option<String>,
    /// Violations still present after the run.
    pub remaining_violations: Vec<Violation>,
}

/// Correction failures.
#[derive(Debug, thiserror::Error)]
pub enum CorrectError {
    /// Another run holds this root.
    #[error("a correction run is already in progress for {}", .0.display())]
    Busy(PathBuf),
    /// The root does not exist.
    #[error("cannot open root {}: {source}", path.display())]
    Root {
        /// Requested root.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The tree could not be checked.
    #[error(transparent)]
    Guard(#[from] GuardError),
    /// The transaction service failed.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// The rollback left files unrestored.
    #[error("rollback incomplete; unrestored files: {}", failed_files.join(", "))]
    RollbackIncomplete {
        /// Files that kept the edited content.
        failed_files: Vec<String>,
        /// One message per failure.
        errors: Vec<String>,
    },
}

enum StepError {
    /// Transient; worth another attempt.
    Io(std::io::Error),
    /// Will fail the same way again.
    Refused(String),
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Refused(reason) => f.write_str(reason),
        }
    }
}

/// Releases a root from the busy set on drop.
struct RootLease<'a> {
    busy: &'a Mutex<HashSet<PathBuf>>,
    root: PathBuf,
}

impl Drop for RootLease<'_> {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.root);
    }
}

/// Applies bound corrections transactionally.
pub struct AutoCorrectEngine<T> {
    transactions: T,
    busy: Mutex<HashSet<PathBuf>>,
}

impl<T: ChangeTransaction> AutoCorrectEngine<T> {
    /// Creates an engine over a transaction service.
    #[must_use]
    pub fn new(transactions: T) -> Self {
        Self {
            transactions,
            busy: Mutex::new(HashSet::new()),
        }
    }

    /// The transaction service.
    #[must_use]
    pub fn transactions(&self) -> &T {
        &self.transactions
    }

    fn lease(&self, root: &Path) -> Result<RootLease<'_>, CorrectError> {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(root.to_path_buf()) {
            return Err(CorrectError::Busy(root.to_path_buf()));
        }
        Ok(RootLease {
            busy: &self.busy,
            root: root.to_path_buf(),
        })
    }

    /// Corrects the auto-correctable subset of `violations` under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if another run holds the root, the transaction
    /// service cannot open or roll back the change, or a rollback cannot
    /// restore every file. A failed verification or commit is not an error;
    /// it yields `rolled_back = true`.
    pub fn run(
        &self,
        violations: &[Violation],
        manifest: &GuardManifest,
        root: &Path,
    ) -> Result<AutoCorrectResult, CorrectError> {
        let mut targets: Vec<(&Violation, &ImportFix)> = violations
            .iter()
            .filter(|v| v.auto_correctable)
            .filter_map(|v| v.fix.as_ref().map(|fix| (v, fix)))
            .collect();
        if targets.is_empty() {
            debug!("Nothing to correct");
            return Ok(AutoCorrectResult {
                remaining_violations: violations.to_vec(),
                ..AutoCorrectResult::default()
            });
        }
        targets.sort_by(|a, b| a.0.file.cmp(&b.0.file).then(a.0.line.cmp(&b.0.line)));

        let root = root.canonicalize().map_err(|source| CorrectError::Root {
            path: root.to_path_buf(),
            source,
        })?;
        let _lease = self.lease(&root)?;
        let pipeline = Pipeline::new(&manifest.registry, &manifest.config, &root)?;
        let max_retries = manifest.config.guard.max_retries;

        let begin = self.transactions.begin_change(
            &root,
            &format!("arch-guard: correct {} violation(s)", targets.len()),
        )?;
        info!("Applying {} correction(s) in {}", targets.len(), begin.id);

        let mut result = AutoCorrectResult::default();
        for (violation, fix) in &targets {
            let action = format!(
                "{}:{} rewrite `{}` -> `{}`",
                violation.file, violation.line, fix.specifier, fix.replacement
            );
            let mut attempt = 0;
            let outcome = loop {
                match apply_fix(&root, violation, fix) {
                    Err(StepError::Io(e)) if attempt < max_retries => {
                        debug!("Retrying {action}: {e}");
                        attempt += 1;
                        result.retried_count += 1;
                    }
                    other => break other,
                }
            };
            result.steps.push(match outcome {
                Ok(()) => CorrectionStep {
                    action,
                    success: true,
                    message: format!("now imports {}", fix.via),
                },
                Err(e) => CorrectionStep {
                    action,
                    success: false,
                    message: e.to_string(),
                },
            });
        }

        let all_applied = result.steps.iter().all(|s| s.success);
        let verified = if all_applied {
            self.verify(&pipeline, violations, &targets, &mut result)
        } else {
            None
        };

        if let Some(remaining) = verified {
            match self.transactions.commit_change(&root) {
                Ok(commit) => {
                    info!("Committed {} correction(s) as {}", targets.len(), commit.change_id);
                    result.fixed = true;
                    result.change_id = Some(commit.change_id);
                    result.remaining_violations = remaining;
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Commit of {} failed: {e}", begin.id);
                    result.steps.push(CorrectionStep {
                        action: "commit".to_string(),
                        success: false,
                        message: e.to_string(),
                    });
                }
            }
        }

        warn!("Rolling back {}", begin.id);
        let rollback = self.transactions.rollback_change(&root, Some(&begin.id))?;
        if !rollback.success {
            return Err(CorrectError::RollbackIncomplete {
                failed_files: rollback.restore_result.failed_files,
                errors: rollback.restore_result.errors,
            });
        }
        result.steps.push(CorrectionStep {
            action: "rollback".to_string(),
            success: true,
            message: format!(
                "restored {} file(s)",
                rollback.restore_result.restored_files.len()
            ),
        });
        result.rolled_back = true;
        let mut original = violations.to_vec();
        sort_violations(&mut original);
        result.remaining_violations = original;
        Ok(result)
    }

    /// Re-checks the tree. Returns the remaining violations if every target is
    /// gone and no new violation appeared.
    fn verify(
        &self,
        pipeline: &Pipeline,
        original: &[Violation],
        targets: &[(&Violation, &ImportFix)],
        result: &mut AutoCorrectResult,
    ) -> Option<Vec<Violation>> {
        let (_, mut after) = match pipeline.scan() {
            Ok(scan) => scan,
            Err(e) => {
                result.steps.push(CorrectionStep {
                    action: "verify".to_string(),
                    success: false,
                    message: e.to_string(),
                });
                return None;
            }
        };

        let targeted: HashSet<ViolationKey> = targets.iter().map(|(v, _)| v.key()).collect();
        let known: HashSet<ViolationKey> = original.iter().map(Violation::key).collect();
        let lingering = after.iter().filter(|v| targeted.contains(&v.key())).count();
        let introduced = after.iter().filter(|v| !known.contains(&v.key())).count();

        let success = lingering == 0 && introduced == 0;
        result.steps.push(CorrectionStep {
            action: "verify".to_string(),
            success,
            message: if success {
                format!("{} violation(s) remain", after.len())
            } else {
                format!("{lingering} targeted violation(s) remain, {introduced} new violation(s)")
            },
        });
        if !success {
            return None;
        }
        sort_violations(&mut after);
        Some(after)
    }
}

/// Rewrites the specifier of one import in place.
fn apply_fix(root: &Path, violation: &Violation, fix: &ImportFix) -> Result<(), StepError> {
    let rel = normalize(Path::new(&violation.file))
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| StepError::Refused(format!("{} is outside the root", violation.file)))?;
    let path = root.join(rel);
    let resolved = path.canonicalize().map_err(StepError::Io)?;
    if !resolved.starts_with(root) {
        return Err(StepError::Refused(format!(
            "{} resolves outside the root",
            violation.file
        )));
    }

    let content = std::fs::read_to_string(&resolved).map_err(StepError::Io)?;
    let rewritten = rewrite_specifier(&content, violation.line, &fix.specifier, &fix.replacement)
        .ok_or_else(|| {
            StepError::Refused(format!(
                "specifier `{}` not found on line {}",
                fix.specifier, violation.line
            ))
        })?;
    std::fs::write(&resolved, rewritten).map_err(StepError::Io)
}

/// Replaces the first quoted occurrence of `from` on `line` (1-indexed).
fn rewrite_specifier(content: &str, line: usize, from: &str, to: &str) -> Option<String> {
    let mut out = String::with_capacity(content.len() + to.len());
    let mut found = false;
    for (i, text) in content.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            for quote in ['\'', '"', '`'] {
                let needle = format!("{quote}{from}{quote}");
                if let Some(pos) = text.find(&needle) {
                    out.push_str(&text[..pos]);
                    out.push(quote);
                    out.push_str(to);
                    out.push(quote);
                    out.push_str(&text[pos + needle.len()..]);
                    found = true;
                    break;
                }
            }
            if found {
                continue;
            }
        }
        out.push_str(text);
    }
    found.then_some(out)
}
