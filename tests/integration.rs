//! Integration tests for the install lifecycle
//!
//! These drive `RecipeEngine` end to end with a fake `oommf.tcl` build
//! driver and a fake `tclsh`, so they only run on Unix.

#![cfg(unix)]

mod common;

use common::*;
use sci_recipe::engine::env::render_exports;
use sci_recipe::engine::lock::lock_prefix;
use sci_recipe::engine::phases::SourceLayout;
use sci_recipe::{InstallOptions, RecipeError, Source};
use std::os::unix::fs::PermissionsExt;

fn from_dir(dir: &std::path::Path) -> InstallOptions {
    InstallOptions {
        source: Source::Directory(dir.to_path_buf()),
        ..InstallOptions::default()
    }
}

// =============================================================================
// Layout detection and phases
// =============================================================================

#[test]
fn test_install_release_tarball_layout() {
    let env = TestEnv::new();
    let src = env.path("src/oommf-20a2");
    oommf_tree(&src, None);
    fake_tclsh(&env.tcl, None);

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let outcome = engine.install(&recipe, &from_dir(&src)).unwrap();

    assert_eq!(outcome.layout, SourceLayout::Root);
    assert_eq!(outcome.version, "20a2_20200608");
    assert_eq!(driver_calls(&src), ["pimake distclean", "pimake upgrade", "pimake"]);

    let entry = env.installed("bin/oommf.tcl");
    assert!(entry.is_file());
    assert_eq!(entry.metadata().unwrap().permissions().mode() & 0o777, 0o755);
    assert!(env.installed("usr/bin/oommf/oommf.tcl").is_file());
    assert!(env.installed("usr/bin/oommf/app/oxs/examples/stdprob3.mif").is_file());

    let report = outcome.report.expect("checks should run");
    assert_eq!(report.len(), 3);
    assert!(report.passed(), "{:?}", report);
}

#[test]
fn test_install_repository_archive_layout() {
    let env = TestEnv::new();
    let src = env.path("src/oommf-20a2_20200608");
    oommf_tree(&src.join("oommf"), None);
    std::fs::write(src.join("README.md"), "mirror\n").unwrap();
    fake_tclsh(&env.tcl, None);

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let outcome = engine.install(&recipe, &from_dir(&src)).unwrap();

    assert_eq!(outcome.layout, SourceLayout::Nested("oommf".to_string()));
    assert_eq!(
        driver_calls(&src.join("oommf")),
        ["pimake distclean", "pimake upgrade", "pimake"]
    );
    // The nested directory is the tree that gets installed
    assert!(env.installed("usr/bin/oommf/oommf.tcl").is_file());
    assert!(!env.installed("usr/bin/oommf/README.md").exists());
    assert!(!env.installed("usr/bin/oommf/oommf").exists());
    assert!(env.installed("bin/oommf.tcl").is_file());
}

#[test]
fn test_root_layout_wins_when_both_exist() {
    let env = TestEnv::new();
    let src = env.path("src/both");
    oommf_tree(&src, None);
    oommf_tree(&src.join("oommf"), None);

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let options = InstallOptions {
        run_checks: false,
        ..from_dir(&src)
    };
    let outcome = engine.install(&recipe, &options).unwrap();

    assert_eq!(outcome.layout, SourceLayout::Root);
    assert!(driver_calls(&src.join("oommf")).is_empty());
}

#[test]
fn test_missing_marker_runs_no_phase() {
    let env = TestEnv::new();
    let src = env.path("src/empty");
    std::fs::create_dir_all(src.join("oommf")).unwrap();
    std::fs::write(src.join("README"), "not oommf\n").unwrap();

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let err = engine.install(&recipe, &from_dir(&src)).unwrap_err();

    match err {
        RecipeError::LayoutNotFound { marker, dir } => {
            assert_eq!(marker, "oommf.tcl");
            assert_eq!(dir, src);
        }
        other => panic!("expected LayoutNotFound, got {other}"),
    }
    assert!(!env.installed("usr/bin/oommf").exists());
    assert!(!env.installed("bin/oommf.tcl").exists());
    assert!(engine.receipt(&recipe).unwrap().is_none());
}

#[test]
fn test_failed_upgrade_stops_before_build() {
    let env = TestEnv::new();
    let src = env.path("src/oommf");
    oommf_tree(&src, Some("upgrade"));

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let err = engine.install(&recipe, &from_dir(&src)).unwrap_err();

    match err {
        RecipeError::ExternalCommand { cmd, code } => {
            assert_eq!(cmd, "./oommf.tcl pimake upgrade");
            assert_eq!(code, Some(1));
        }
        other => panic!("expected ExternalCommand, got {other}"),
    }
    assert_eq!(driver_calls(&src), ["pimake distclean", "pimake upgrade"]);
    assert!(!env.installed("usr/bin/oommf").exists());
}

#[test]
fn test_failed_build_installs_nothing() {
    let env = TestEnv::new();
    let src = env.path("src/oommf");
    oommf_tree(&src, Some(""));

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let err = engine.install(&recipe, &from_dir(&src)).unwrap_err();

    assert!(matches!(err, RecipeError::ExternalCommand { .. }));
    assert_eq!(driver_calls(&src).len(), 3);
    assert!(!env.installed("bin/oommf.tcl").exists());
}

#[test]
fn test_missing_sanity_dir_fails_install() {
    let env = TestEnv::new();
    let src = env.path("src/oommf");
    oommf_tree(&src, None);
    std::fs::remove_dir_all(src.join("app/oxs")).unwrap();

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let err = engine.install(&recipe, &from_dir(&src)).unwrap_err();

    match err {
        RecipeError::SanityCheck { path } => {
            assert_eq!(path, env.installed("usr/bin/oommf/app/oxs/examples"));
        }
        other => panic!("expected SanityCheck, got {other}"),
    }
    assert!(engine.receipt(&recipe).unwrap().is_none());
}

// =============================================================================
// Post-install checks and the test entry point
// =============================================================================

#[test]
fn test_failed_check_keeps_install() {
    let env = TestEnv::new();
    let src = env.path("src/oommf");
    oommf_tree(&src, None);
    fake_tclsh(&env.tcl, Some("+platform"));

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let outcome = engine.install(&recipe, &from_dir(&src)).unwrap();

    let report = outcome.report.unwrap();
    assert!(!report.passed());
    let failed: Vec<_> = report.failures().map(|o| o.name.as_str()).collect();
    assert_eq!(failed, ["platform"]);
    let message = report.outcomes[1].result.as_ref().unwrap_err().to_string();
    assert!(message.contains("OOMMF threads"), "{message}");

    assert!(env.installed("bin/oommf.tcl").is_file());
    assert_eq!(engine.receipt(&recipe).unwrap().unwrap().version, "20a2_20200608");
}

#[test]
fn test_skip_checks() {
    let env = TestEnv::new();
    let src = env.path("src/oommf");
    oommf_tree(&src, None);

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let options = InstallOptions {
        run_checks: false,
        ..from_dir(&src)
    };
    let outcome = engine.install(&recipe, &options).unwrap();
    assert!(outcome.report.is_none());
}

#[test]
fn test_entry_point_reports_every_check() {
    let env = TestEnv::new();
    let src = env.path("src/oommf");
    oommf_tree(&src, None);
    fake_tclsh(&env.tcl, Some("+version"));

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let options = InstallOptions {
        run_checks: false,
        ..from_dir(&src)
    };
    engine.install(&recipe, &options).unwrap();

    let report = engine.test(&recipe, None).unwrap();
    let results: Vec<_> = report.outcomes.iter().map(|o| (o.name.as_str(), o.passed())).collect();
    assert_eq!(
        results,
        [("version", false), ("platform", true), ("stdprob3", true)]
    );
}

#[test]
fn test_checks_see_run_environment() {
    let env = TestEnv::new();
    let src = env.path("src/oommf");
    oommf_tree(&src, None);
    fake_tclsh(&env.tcl, None);

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let outcome = engine.install(&recipe, &from_dir(&src)).unwrap();

    let version = &outcome.report.unwrap().outcomes[0];
    let root = env.installed("usr/bin/oommf");
    assert!(
        version.output.contains(&format!("root={}", root.display())),
        "{}",
        version.output
    );
    assert!(version.command.ends_with("bin/oommf.tcl +version"));
}

#[test]
fn test_without_tcl_prefix_checks_fail_but_install_succeeds() {
    let env = TestEnv::new();
    let src = env.path("src/oommf");
    oommf_tree(&src, None);

    let mut config = env.config();
    config.tclsh = env.path("missing/tclsh").display().to_string();
    let engine = sci_recipe::RecipeEngine::new(config);
    let recipe = engine.load("oommf").unwrap();
    let outcome = engine.install(&recipe, &from_dir(&src)).unwrap();

    let report = outcome.report.unwrap();
    assert_eq!(report.failures().count(), 3);
    assert!(env.installed("bin/oommf.tcl").is_file());
}

// =============================================================================
// Archives, environment and locking
// =============================================================================

#[test]
fn test_install_from_local_archive() {
    let env = TestEnv::new();
    let tree = env.path("tree");
    oommf_tree(&tree.join("oommf"), None);
    let archive = env.path("mini-1.0.tar.gz");
    tar_gz(&tree, "mini-1.0", &archive);
    write_local_recipe(&env.recipes, "mini", &archive);

    let engine = env.engine();
    let recipe = engine.load("mini").unwrap();
    let options = InstallOptions {
        source: Source::Archive(archive.clone()),
        ..InstallOptions::default()
    };
    let outcome = engine.install(&recipe, &options).unwrap();

    assert_eq!(outcome.layout, SourceLayout::Nested("oommf".to_string()));
    assert!(outcome.report.is_none());
    assert!(env.installed("usr/bin/mini/app/oxs/examples/stdprob3.mif").is_file());
    assert!(env.installed("bin/oommf.tcl").is_file());

    let receipt = engine.receipt(&recipe).unwrap().unwrap();
    assert_eq!(receipt.source, Some(archive.display().to_string()));
}

#[test]
fn test_archive_checksum_mismatch_stages_nothing() {
    let env = TestEnv::new();
    let tree = env.path("tree");
    oommf_tree(&tree, None);
    let archive = env.path("mini-1.0.tar.gz");
    tar_gz(&tree, "mini-1.0", &archive);
    write_local_recipe(&env.recipes, "mini", &archive);

    // Repack with different contents after the checksum was recorded
    std::fs::write(tree.join("README"), "tampered\n").unwrap();
    tar_gz(&tree, "mini-1.0", &archive);

    let engine = env.engine();
    let recipe = engine.load("mini").unwrap();
    let options = InstallOptions {
        source: Source::Archive(archive),
        ..InstallOptions::default()
    };
    let err = engine.install(&recipe, &options).unwrap_err();

    assert!(matches!(err, RecipeError::ChecksumMismatch { .. }));
    assert!(!env.build_dir.join("mini-1.0").exists());
    assert!(!env.installed("usr/bin/mini").exists());
}

#[test]
fn test_environment_exports() {
    let env = TestEnv::new();
    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();

    let exports = engine.environment(&recipe, None).unwrap();
    let root = env.installed("usr/bin/oommf");
    assert_eq!(exports["OOMMF_ROOT"], root.display().to_string());
    assert_eq!(exports["OOMMFTCL"], root.join("oommf.tcl").display().to_string());

    let rendered = render_exports(&exports);
    assert_eq!(rendered.lines().count(), 2);
    assert!(rendered.starts_with("export OOMMFTCL="));
}

#[test]
fn test_install_refused_while_prefix_locked() {
    let env = TestEnv::new();
    let src = env.path("src/oommf");
    oommf_tree(&src, None);

    let _held = lock_prefix(&env.prefix).unwrap();
    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    let err = engine.install(&recipe, &from_dir(&src)).unwrap_err();

    assert!(matches!(err, RecipeError::Locked { .. }));
    assert!(driver_calls(&src).is_empty());
}

#[test]
fn test_recipe_path_shadows_builtin() {
    let env = TestEnv::new();
    let archive = env.path("oommf.tar.gz");
    std::fs::write(&archive, b"placeholder").unwrap();
    write_local_recipe(&env.recipes, "oommf", &archive);

    let engine = env.engine();
    let recipe = engine.load("oommf").unwrap();
    assert_eq!(recipe.versions.len(), 1);
    assert!(engine.available().unwrap().contains(&"py-pyrect".to_string()));
}
