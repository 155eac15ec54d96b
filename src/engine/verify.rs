//! Post-install smoke checks
//!
//! Each check runs the recipe's test program with fixed arguments, captures
//! stdout and stderr, and requires an allowed exit status plus every expected
//! substring. Checks get their environment from [`VerifyConfig`] only: the
//! child starts from an empty environment, so nothing leaks in from the
//! caller and nothing is written to the process environment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::paths::InstallPaths;
use super::util::{capture, display_cmd};
use crate::error::{Mismatch, RecipeError, Result};
use crate::output;
use crate::recipe::{Recipe, VersionRecord};

/// How checks are executed
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Program every check invokes, e.g. `<tcl>/bin/tclsh`
    pub program: PathBuf,
    /// Complete child environment
    pub env: BTreeMap<String, String>,
    pub work_dir: Option<PathBuf>,
}

/// A check with its templates expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeCheck {
    pub name: String,
    pub purpose: String,
    pub args: Vec<String>,
    pub expected: Vec<String>,
    pub status: Vec<i32>,
}

impl SmokeCheck {
    /// Expand a recipe's checks for one version installed at `paths`
    pub fn resolve_all(recipe: &Recipe, version: &VersionRecord, paths: &InstallPaths) -> Vec<Self> {
        recipe
            .checks
            .iter()
            .map(|check| Self {
                name: check.name.clone(),
                purpose: check.purpose.clone(),
                args: check
                    .args
                    .iter()
                    .map(|a| paths.expand(a, recipe, version))
                    .collect(),
                expected: recipe.expected_for(check, version).to_vec(),
                status: check.status.clone(),
            })
            .collect()
    }
}

/// Result of one check
#[derive(Debug)]
pub struct CheckOutcome {
    pub name: String,
    pub purpose: String,
    pub command: String,
    /// Captured stdout and stderr; empty when the program never started
    pub output: String,
    pub result: Result<()>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a whole check run, in check order
#[derive(Debug, Default)]
pub struct VerificationReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(CheckOutcome::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Compare captured output against a check's expectations
fn evaluate(check: &SmokeCheck, code: Option<i32>, output: &str) -> std::result::Result<(), Mismatch> {
    if !code.is_some_and(|c| check.status.contains(&c)) {
        return Err(Mismatch::Status {
            code,
            allowed: check.status.clone(),
        });
    }
    if let Some(missing) = check.expected.iter().find(|e| !output.contains(e.as_str())) {
        return Err(Mismatch::MissingSubstring(missing.clone()));
    }
    Ok(())
}

/// Run a single check
pub fn run_check(config: &VerifyConfig, check: &SmokeCheck) -> CheckOutcome {
    let command = display_cmd(&config.program.to_string_lossy(), &check.args);
    let captured = capture(
        &config.program,
        &check.args,
        &config.env,
        config.work_dir.as_deref(),
    );
    let (output, mismatch) = match captured {
        Ok(captured) => {
            let all = captured.combined();
            let verdict = evaluate(check, captured.code, &all);
            (all, verdict.err())
        }
        Err(e) => (String::new(), Some(Mismatch::NotStarted(e.to_string()))),
    };

    CheckOutcome {
        name: check.name.clone(),
        purpose: check.purpose.clone(),
        command,
        output,
        result: match mismatch {
            None => Ok(()),
            Some(mismatch) => Err(RecipeError::VerificationMismatch {
                check: check.name.clone(),
                mismatch,
            }),
        },
    }
}

/// Run every check; one failure never stops the rest
pub fn run_checks(config: &VerifyConfig, checks: &[SmokeCheck]) -> VerificationReport {
    let mut report = VerificationReport::default();
    for check in checks {
        let line = display_cmd(&config.program.to_string_lossy(), &check.args);
        output::detail(&format!("check {}: {}", check.name, output::truncate(&line, 60)));
        let outcome = run_check(config, check);
        let failure = outcome.result.as_ref().err().map(|e| e.to_string());
        output::check(&outcome.name, &outcome.purpose, failure.as_deref());
        report.outcomes.push(outcome);
    }
    report
}

/// Locate the check program: `<provider prefix>/bin/<program>` when the
/// providing dependency's prefix is known, else `fallback`
pub fn resolve_program(
    recipe: &Recipe,
    dep_prefixes: &BTreeMap<String, PathBuf>,
    fallback: &str,
) -> Option<PathBuf> {
    let test = recipe.test.as_ref()?;
    let from_provider = test
        .provider
        .as_ref()
        .and_then(|p| dep_prefixes.get(p))
        .map(|prefix| prefix.join("bin").join(&test.program));
    Some(from_provider.unwrap_or_else(|| PathBuf::from(fallback)))
}

/// Child environment: the run-time exports, plus PATH when asked for
pub fn check_environment(
    exports: &BTreeMap<String, String>,
    inherit_path: Option<&str>,
) -> BTreeMap<String, String> {
    let mut env = exports.clone();
    if let Some(path) = inherit_path {
        env.insert("PATH".to_string(), path.to_string());
    }
    env
}

/// Build a config for checks against an install at `paths`
pub fn verify_config(program: &Path, env: BTreeMap<String, String>, paths: &InstallPaths) -> VerifyConfig {
    VerifyConfig {
        program: program.to_path_buf(),
        env,
        work_dir: paths.prefix.is_dir().then(|| paths.prefix.clone()),
    }
}
