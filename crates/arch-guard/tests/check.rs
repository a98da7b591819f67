//! Integration test: one-shot checks end-to-end via `check_directory`.
//!
//! Builds small source trees in temporary directories and verifies the
//! report contract: counts, ordering, severity and pass/fail.

use arch_guard::{check_directory, GuardConfig, PresetRegistry, RuleId, Severity};
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    fs::create_dir_all(path.parent().expect("fixture path has a parent"))
        .expect("fixture dir should be created");
    fs::write(path, content).expect("fixture file should be written");
}

fn fsd() -> (PresetRegistry, GuardConfig) {
    (PresetRegistry::with_builtins(), GuardConfig::for_preset("fsd"))
}

// ── Happy-path: detects backward imports ──

#[test]
fn entities_importing_features_is_one_error() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/features/auth/index.ts", "export const login = () => {};\n");
    write(
        &dir,
        "src/entities/user/index.ts",
        "import { login } from '../../features/auth';\nexport const user = login;\n",
    );

    let (registry, config) = fsd();
    let report = check_directory(&registry, &config, dir.path()).expect("check should succeed");

    assert_eq!(report.files_analyzed, 2);
    assert_eq!(report.total_violations, 1);
    assert_eq!(report.by_severity.error, 1);
    assert_eq!(report.by_type.get("LAYER_BACKWARD_IMPORT"), Some(&1));

    let v = &report.violations[0];
    assert_eq!(v.rule_id, RuleId::LayerBackwardImport);
    assert_eq!(v.severity, Severity::Error);
    assert_eq!(v.file, "src/entities/user/index.ts");
    assert_eq!(v.line, 1);
    assert_eq!(v.from_layer, "entities");
    assert_eq!(v.to_layer, "features");
    assert!(!report.passes(false));
}

#[test]
fn features_importing_entities_is_clean() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/entities/user/index.ts", "export const user = 1;\n");
    write(
        &dir,
        "src/features/auth/index.ts",
        "import { user } from '../../entities/user';\nexport const login = user;\n",
    );

    let (registry, config) = fsd();
    let report = check_directory(&registry, &config, dir.path()).expect("check should succeed");

    assert_eq!(report.total_violations, 0);
    assert!(report.passes(true));
}

#[test]
fn each_outward_edge_is_reported_once_in_file_line_order() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/widgets/card.ts", "export const Card = 1;\n");
    write(&dir, "src/features/cart.ts", "export const cart = 1;\n");
    write(
        &dir,
        "src/shared/util.ts",
        "import { cart } from '../features/cart';\nimport { Card } from '../widgets/card';\n",
    );
    write(
        &dir,
        "src/entities/order.ts",
        "import { Card } from '../widgets/card';\n",
    );

    let (registry, config) = fsd();
    let report = check_directory(&registry, &config, dir.path()).expect("check should succeed");

    let found: Vec<(&str, usize, &str)> = report
        .violations
        .iter()
        .map(|v| (v.file.as_str(), v.line, v.to_layer.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![
            ("src/entities/order.ts", 1, "widgets"),
            ("src/shared/util.ts", 1, "features"),
            ("src/shared/util.ts", 2, "widgets"),
        ]
    );
}

// ── Determinism ──

#[test]
fn repeated_checks_are_identical() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/features/a.ts", "export const a = 1;\n");
    write(&dir, "src/entities/b.ts", "import { a } from '../features/a';\n");
    write(&dir, "src/shared/c.ts", "import { a } from '../features/a';\n");

    let (registry, config) = fsd();
    let first = check_directory(&registry, &config, dir.path()).expect("first check");
    let second = check_directory(&registry, &config, dir.path()).expect("second check");

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).expect("serialize"),
        serde_json::to_string(&second).expect("serialize")
    );
}

// ── Configuration ──

#[test]
fn aliases_resolve_to_in_tree_files() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/features/auth.ts", "export const a = 1;\n");
    write(&dir, "src/entities/user.ts", "import { a } from '@/features/auth';\n");

    let config = GuardConfig::parse(
        r#"
[guard]
preset = "fsd"

[aliases]
"@/" = "src/"
"#,
    )
    .expect("config should parse");
    let report = check_directory(&PresetRegistry::with_builtins(), &config, dir.path())
        .expect("check should succeed");

    assert_eq!(report.total_violations, 1);
    assert_eq!(report.violations[0].file, "src/entities/user.ts");
}

#[test]
fn custom_preset_from_config() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/ui/button.ts", "export const b = 1;\n");
    write(&dir, "src/core/model.ts", "import { b } from '../ui/button';\n");

    let config = GuardConfig::parse(
        r#"
[guard]
preset = "two-tier"

[[presets]]
name = "two-tier"
description = "Core below UI"
hierarchy = ["core", "ui"]
"#,
    )
    .expect("config should parse");
    let registry = config.registry().expect("registry should build");
    let report = check_directory(&registry, &config, dir.path()).expect("check should succeed");

    assert_eq!(report.total_violations, 1);
    assert_eq!(report.violations[0].from_layer, "core");
}

#[test]
fn excluded_and_unparsable_files_do_not_count() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/features/a.ts", "export const a = 1;\n");
    write(&dir, "src/entities/broken.ts", "import { a } from '../features/a'\nconst = ;\n");
    write(&dir, "dist/entities/out.js", "require('../../src/features/a');\n");

    let (registry, config) = fsd();
    let report = check_directory(&registry, &config, dir.path()).expect("check should succeed");

    assert_eq!(report.files_analyzed, 1);
    assert_eq!(report.total_violations, 0);
}

// ── Failure modes ──

#[test]
fn unknown_preset_fails_before_scanning() {
    let dir = TempDir::new().expect("tempdir");
    let config = GuardConfig::for_preset("onion");
    let err = check_directory(&PresetRegistry::with_builtins(), &config, dir.path())
        .expect_err("unknown preset should fail");
    assert!(err.to_string().contains("onion"));
}

#[test]
fn ci_mode_fails_on_warnings() {
    let dir = TempDir::new().expect("tempdir");
    write(&dir, "src/app/blog/page.tsx", "export default function Blog() { return null; }\n");
    write(
        &dir,
        "src/app/home/page.tsx",
        "import Blog from '../blog/page';\nexport default function Home() { return null; }\n",
    );

    let config = GuardConfig::for_preset("mandu");
    let report = check_directory(&PresetRegistry::with_builtins(), &config, dir.path())
        .expect("check should succeed");

    assert_eq!(report.by_severity.warn, 1);
    assert!(report.passes(false));
    assert!(!report.passes(true));
}
