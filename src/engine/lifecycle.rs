//! Lifecycle orchestration for recipe installs
//!
//! The lifecycle flow:
//! 1. lock the prefix
//! 2. acquire - download or take local sources, verify, stage
//! 3. configure, build, install - via the phase driver
//! 4. write the install receipt
//! 5. post-install checks - failures are reported, the install stays

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::env::run_environment;
use super::lock::lock_prefix;
use super::paths::InstallPaths;
use super::phases::{acquire, PhaseDriver, SourceLayout};
use super::receipt::InstallReceipt;
use super::verify::{self, SmokeCheck, VerificationReport, VerifyConfig};
use crate::config::Config;
use crate::error::Result;
use crate::output;
use crate::recipe::{Recipe, VersionRecord};

/// Where install sources come from
#[derive(Debug, Clone, Default)]
pub enum Source {
    /// Download the version's URL (or reuse the cache)
    #[default]
    Download,
    /// A local archive, checked against the version's sha256
    Archive(PathBuf),
    /// An already extracted tree, used in place
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Version tag; the preferred version when unset
    pub version: Option<String>,
    pub source: Source,
    pub run_checks: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            version: None,
            source: Source::Download,
            run_checks: true,
        }
    }
}

/// What an install produced
#[derive(Debug)]
pub struct InstallOutcome {
    pub version: String,
    pub layout: SourceLayout,
    pub paths: InstallPaths,
    pub receipt: PathBuf,
    /// None when checks were skipped or the recipe has none
    pub report: Option<VerificationReport>,
}

/// Staging area: the configured build dir, or a temporary one kept alive by the guard
fn build_area(config: &Config) -> Result<(Option<TempDir>, PathBuf)> {
    match &config.build_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Ok((None, dir.clone()))
        }
        None => {
            let tmp = tempfile::Builder::new().prefix("sci-recipe-").tempdir()?;
            let path = tmp.path().to_path_buf();
            Ok((Some(tmp), path))
        }
    }
}

fn acquire_sources(
    config: &Config,
    recipe: &Recipe,
    version: &VersionRecord,
    source: &Source,
    build_dir: &Path,
) -> Result<(PathBuf, Option<String>)> {
    output::phase("acquire");
    match source {
        Source::Directory(dir) => {
            if !dir.is_dir() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("source directory {} does not exist", dir.display()),
                )
                .into());
            }
            output::detail(&format!("using source tree {}", dir.display()));
            Ok((dir.clone(), None))
        }
        Source::Archive(file) => {
            let archive = acquire::local_archive(file, version)?;
            let staged = acquire::stage(&archive, build_dir, recipe, version)?;
            Ok((staged, Some(file.display().to_string())))
        }
        Source::Download => {
            let archive = acquire::fetch(recipe, version, &config.cache_dir, config.http_timeout)?;
            let staged = acquire::stage(&archive, build_dir, recipe, version)?;
            Ok((staged, Some(recipe.source_url(version))))
        }
    }
}

/// Install a recipe into `config.prefix`
pub fn install(
    config: &Config,
    deps: &BTreeMap<String, PathBuf>,
    recipe: &Recipe,
    options: &InstallOptions,
) -> Result<InstallOutcome> {
    let version = recipe.resolve_version(options.version.as_deref())?;
    let paths = InstallPaths::resolve(&config.prefix, &recipe.build);

    output::action(&format!("Installing {}@{}", recipe.name(), version.tag));
    if version.deprecated {
        output::warning(&format!("{}@{} is deprecated", recipe.name(), version.tag));
    }

    let _lock = lock_prefix(&config.prefix)?;
    let (_scratch, build_dir) = build_area(config)?;

    let (stage_dir, source) = acquire_sources(config, recipe, version, &options.source, &build_dir)?;

    let mut driver = PhaseDriver::new(recipe, &stage_dir, paths.clone()).with_python(&config.python);
    let layout = driver.run_all()?;

    let receipt = InstallReceipt {
        name: recipe.name().to_string(),
        version: version.tag.clone(),
        sha256: version.sha256.clone(),
        source,
        install_root: paths.install_root.clone(),
        environment: run_environment(recipe, version, &paths),
    }
    .write(&config.prefix)?;

    let report = if options.run_checks {
        checks_for(config, deps, recipe, version, &paths).map(|(verify_config, checks)| {
            output::phase("check");
            let report = verify::run_checks(&verify_config, &checks);
            for failure in report.failures() {
                output::warning(&format!(
                    "{} (install of {} kept)",
                    failure.result.as_ref().err().map(|e| e.to_string()).unwrap_or_default(),
                    recipe.name()
                ));
            }
            report
        })
    } else {
        None
    };

    output::success(&format!("{}@{} installed", recipe.name(), version.tag));
    Ok(InstallOutcome {
        version: version.tag.clone(),
        layout,
        paths,
        receipt,
        report,
    })
}

/// The version that is (or would be) installed under the prefix
fn installed_version<'a>(
    config: &Config,
    recipe: &'a Recipe,
    requested: Option<&str>,
) -> Result<&'a VersionRecord> {
    if requested.is_none()
        && let Some(receipt) = InstallReceipt::read(&config.prefix, recipe.name())?
    {
        return recipe.version(&receipt.version);
    }
    recipe.resolve_version(requested)
}

/// Check program, environment and expanded checks; None when the recipe has no checks
fn checks_for(
    config: &Config,
    deps: &BTreeMap<String, PathBuf>,
    recipe: &Recipe,
    version: &VersionRecord,
    paths: &InstallPaths,
) -> Option<(VerifyConfig, Vec<SmokeCheck>)> {
    if recipe.checks.is_empty() {
        return None;
    }
    let fallback = match recipe.test.as_ref().map(|t| t.program.as_str()) {
        Some("tclsh") => config.tclsh.as_str(),
        Some(program) => program,
        None => return None,
    };
    let program = verify::resolve_program(recipe, deps, fallback)?;

    let path = if config.inherit_path {
        std::env::var("PATH").ok()
    } else {
        None
    };
    let env = verify::check_environment(&run_environment(recipe, version, paths), path.as_deref());

    Some((
        verify::verify_config(&program, env, paths),
        SmokeCheck::resolve_all(recipe, version, paths),
    ))
}

/// Run a recipe's smoke checks against what is installed under the prefix
pub fn test(
    config: &Config,
    deps: &BTreeMap<String, PathBuf>,
    recipe: &Recipe,
    version: Option<&str>,
) -> Result<VerificationReport> {
    let version = installed_version(config, recipe, version)?;
    let paths = InstallPaths::resolve(&config.prefix, &recipe.build);

    output::action(&format!("Testing {}@{}", recipe.name(), version.tag));
    Ok(match checks_for(config, deps, recipe, version, &paths) {
        Some((verify_config, checks)) => verify::run_checks(&verify_config, &checks),
        None => {
            output::info(&format!("{} declares no checks", recipe.name()));
            VerificationReport::default()
        }
    })
}

/// Run-time exports for the installed (or requested) version
pub fn environment(
    config: &Config,
    recipe: &Recipe,
    version: Option<&str>,
) -> Result<BTreeMap<String, String>> {
    let version = installed_version(config, recipe, version)?;
    let paths = InstallPaths::resolve(&config.prefix, &recipe.build);
    Ok(run_environment(recipe, version, &paths))
}

/// Download and verify without installing
pub fn fetch(
    config: &Config,
    recipe: &Recipe,
    version: Option<&str>,
    archive: Option<&Path>,
) -> Result<PathBuf> {
    let version = recipe.resolve_version(version)?;
    output::action(&format!("Fetching {}@{}", recipe.name(), version.tag));
    match archive {
        Some(file) => acquire::local_archive(file, version),
        None => acquire::fetch(recipe, version, &config.cache_dir, config.http_timeout),
    }
}
