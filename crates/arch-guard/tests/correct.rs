//! Integration test: auto-correction commits verified edits and rolls back
//! everything else, leaving the tree byte-identical.

use arch_guard::transaction::{ChangeBegin, ChangeCommit, ChangeRollback};
use arch_guard::{
    check_directory, AutoCorrectEngine, ChangeTransaction, GuardConfig, GuardManifest, ImportFix,
    MemorySnapshot, PresetRegistry, RuleId, TransactionError,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    fs::create_dir_all(path.parent().expect("fixture path has a parent"))
        .expect("fixture dir should be created");
    fs::write(path, content).expect("fixture file should be written");
}

fn read(dir: &TempDir, rel: &str) -> String {
    fs::read_to_string(dir.path().join(rel)).expect("file should exist")
}

fn manifest() -> GuardManifest {
    GuardManifest::new(PresetRegistry::with_builtins(), GuardConfig::for_preset("fsd"))
}

/// Snapshots like [`MemorySnapshot`] but refuses every commit.
#[derive(Default)]
struct RefusingCommit {
    inner: MemorySnapshot,
}

impl ChangeTransaction for RefusingCommit {
    fn begin_change(&self, root: &Path, message: &str) -> Result<ChangeBegin, TransactionError> {
        self.inner.begin_change(root, message)
    }

    fn commit_change(&self, root: &Path) -> Result<ChangeCommit, TransactionError> {
        Err(TransactionError::NoOpenChange(root.to_path_buf()))
    }

    fn rollback_change(
        &self,
        root: &Path,
        id: Option<&str>,
    ) -> Result<ChangeRollback, TransactionError> {
        self.inner.rollback_change(root, id)
    }
}

/// `features/auth` only forwards `shared/session`, so the entity can import
/// the session directly.
fn shim_fixture() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/shared/session.ts", "export const session = 1;\n");
    write(&dir, "src/features/auth/index.ts", "export * from '../../shared/session';\n");
    write(&dir, "src/widgets/card.ts", "export const Card = 1;\n");
    write(
        &dir,
        "src/entities/user/model.ts",
        "import { session } from '../../features/auth';\nexport const user = session;\n",
    );
    dir
}

#[test]
fn verified_fix_is_committed() {
    let dir = shim_fixture();
    let manifest = manifest();
    let report = check_directory(&manifest.registry, &manifest.config, dir.path())
        .expect("check should succeed");
    assert_eq!(report.total_violations, 1);
    assert!(report.violations[0].auto_correctable);

    let engine = AutoCorrectEngine::new(MemorySnapshot::new());
    let result = engine
        .run(&report.violations, &manifest, dir.path())
        .expect("run should succeed");

    assert!(result.fixed);
    assert!(!result.rolled_back);
    assert_eq!(result.change_id.as_deref(), Some("change-1"));
    assert!(result.remaining_violations.is_empty());
    assert_eq!(result.retried_count, 0);
    assert!(result.steps.iter().all(|s| s.success));
    assert_eq!(
        read(&dir, "src/entities/user/model.ts"),
        "import { session } from '../../shared/session';\nexport const user = session;\n"
    );

    let after = check_directory(&manifest.registry, &manifest.config, dir.path())
        .expect("recheck should succeed");
    assert_eq!(after.total_violations, 0);
}

#[test]
fn failed_commit_rolls_the_edits_back() {
    let dir = shim_fixture();
    let before = read(&dir, "src/entities/user/model.ts");
    let manifest = manifest();
    let report = check_directory(&manifest.registry, &manifest.config, dir.path())
        .expect("check should succeed");

    let engine = AutoCorrectEngine::new(RefusingCommit::default());
    let result = engine
        .run(&report.violations, &manifest, dir.path())
        .expect("a refused commit is reported in the result");

    assert!(!result.fixed);
    assert!(result.rolled_back);
    assert!(result.change_id.is_none());
    assert_eq!(result.remaining_violations, report.violations);
    let commit = result
        .steps
        .iter()
        .find(|s| s.action == "commit")
        .expect("commit step");
    assert!(!commit.success);
    assert!(result.steps.iter().any(|s| s.action == "rollback" && s.success));
    assert_eq!(read(&dir, "src/entities/user/model.ts"), before);

    // The change was closed by the rollback, so a new run can open one.
    let again = engine
        .run(&report.violations, &manifest, dir.path())
        .expect("second run should succeed");
    assert!(again.rolled_back);
}

#[test]
fn fix_introducing_a_violation_is_rolled_back() {
    let dir = shim_fixture();
    let before = read(&dir, "src/entities/user/model.ts");
    let manifest = manifest();
    let report = check_directory(&manifest.registry, &manifest.config, dir.path())
        .expect("check should succeed");

    // Point the correction at another outward layer.
    let mut violations = report.violations.clone();
    violations[0].fix = Some(ImportFix {
        specifier: "../../features/auth".into(),
        replacement: "../../widgets/card".into(),
        via: "src/widgets/card.ts".into(),
    });

    let engine = AutoCorrectEngine::new(MemorySnapshot::new());
    let result = engine
        .run(&violations, &manifest, dir.path())
        .expect("run should succeed");

    assert!(!result.fixed);
    assert!(result.rolled_back);
    assert!(result.change_id.is_none());
    assert_eq!(result.remaining_violations.len(), 1);
    assert_eq!(result.remaining_violations[0].rule_id, RuleId::LayerBackwardImport);
    let verify = result
        .steps
        .iter()
        .find(|s| s.action == "verify")
        .expect("verify step");
    assert!(!verify.success);
    assert_eq!(read(&dir, "src/entities/user/model.ts"), before);
}

#[test]
fn failed_step_is_rolled_back_without_verifying() {
    let dir = shim_fixture();
    let before = read(&dir, "src/entities/user/model.ts");
    let manifest = manifest();
    let report = check_directory(&manifest.registry, &manifest.config, dir.path())
        .expect("check should succeed");

    let mut violations = report.violations.clone();
    violations[0].fix = Some(ImportFix {
        specifier: "../../features/missing".into(),
        replacement: "../../shared/session".into(),
        via: "src/shared/session.ts".into(),
    });

    let engine = AutoCorrectEngine::new(MemorySnapshot::new());
    let result = engine
        .run(&violations, &manifest, dir.path())
        .expect("run should succeed");

    assert!(result.rolled_back);
    assert!(!result.steps[0].success);
    assert!(result.steps.iter().all(|s| s.action != "verify"));
    assert_eq!(read(&dir, "src/entities/user/model.ts"), before);
}

#[test]
fn non_correctable_violations_are_left_alone() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/features/a.ts", "export const a = 1;\n");
    write(&dir, "src/entities/b.ts", "import { a } from '../features/a';\n");
    let manifest = manifest();
    let report = check_directory(&manifest.registry, &manifest.config, dir.path())
        .expect("check should succeed");
    assert!(!report.violations[0].auto_correctable);

    let engine = AutoCorrectEngine::new(MemorySnapshot::new());
    let result = engine
        .run(&report.violations, &manifest, dir.path())
        .expect("run should succeed");

    assert!(!result.fixed);
    assert!(!result.rolled_back);
    assert_eq!(result.remaining_violations, report.violations);
}

#[test]
fn renamed_or_partial_reexports_are_never_rewritten() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/shared/session.ts", "export const session = 1;\nexport const token = 2;\n");
    write(
        &dir,
        "src/features/auth/index.ts",
        "export { session as authSession } from '../../shared/session';\n",
    );
    write(&dir, "src/features/token/index.ts", "export { session } from '../../shared/session';\n");
    write(
        &dir,
        "src/entities/user/model.ts",
        "import { authSession } from '../../features/auth';\nimport { token } from '../../features/token';\n",
    );
    let before = read(&dir, "src/entities/user/model.ts");
    let manifest = manifest();
    let report = check_directory(&manifest.registry, &manifest.config, dir.path())
        .expect("check should succeed");
    assert_eq!(report.total_violations, 2);
    assert!(report.auto_correctable().is_empty());

    let engine = AutoCorrectEngine::new(MemorySnapshot::new());
    let result = engine
        .run(&report.violations, &manifest, dir.path())
        .expect("run should succeed");
    assert!(!result.fixed);
    assert!(result.steps.is_empty());
    assert_eq!(read(&dir, "src/entities/user/model.ts"), before);
}
