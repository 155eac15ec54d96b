//! Recipe definitions
//!
//! A recipe is a TOML document describing one package: where its sources
//! live, which versions exist, what it depends on, how the build driver is
//! invoked, what it exports at run time and how an install is smoke-tested.
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "oommf"
//! homepage = "https://math.nist.gov/oommf/"
//! url = "https://github.com/fangohr/oommf/archive/refs/tags/%(version)s.tar.gz"
//!
//! [[version]]
//! tag = "20a2_20200608"
//! sha256 = "a3113f2aca0b6249ee99b2f4874f31de601bd7af12498d84f28706b265fa50ab"
//! preferred = true
//!
//! [[depends]]
//! name = "tcl"
//! types = ["build", "test", "run"]
//!
//! [build]
//! system = "pimake"
//! app = "oommf"
//! marker = "oommf.tcl"
//! entry_point = "oommf.tcl"
//! source_subdir = "oommf"
//! ```
//!
//! Strings may contain `%(key)s` placeholders which are expanded with
//! [`substitute`].

pub mod catalog;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::error::{RecipeError, Result};

/// Usage context of a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepType {
    Build,
    Link,
    Run,
    Test,
}

impl DepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Link => "link",
            Self::Run => "run",
            Self::Test => "test",
        }
    }
}

/// A named dependency and the contexts it is needed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub types: BTreeSet<DepType>,
}

impl Dependency {
    pub fn needed_for(&self, ty: DepType) -> bool {
        self.types.contains(&ty)
    }
}

/// One downloadable version of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub tag: String,
    pub sha256: String,
    /// Overrides the recipe-level URL template for this version
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub preferred: bool,
    /// Per-check expected substrings replacing the check's defaults
    #[serde(default)]
    pub expect: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    /// Default source URL template, `%(version)s` is replaced by the tag
    pub url: String,
    #[serde(default)]
    pub maintainers: Vec<String>,
}

/// Which external build driver handles the phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    /// OOMMF's Tcl build driver, `oommf.tcl pimake`
    Pimake,
    /// `pip install` of a Python source tree
    Python,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSection {
    pub system: BuildSystem,
    /// Directory name under `<prefix>/usr/bin` for trees copied whole
    #[serde(default)]
    pub app: Option<String>,
    /// File whose presence identifies the source root
    pub marker: String,
    /// File copied to `<prefix>/bin` after the tree is installed
    #[serde(default)]
    pub entry_point: Option<String>,
    /// Subdirectory probed when the marker is not at the top level
    #[serde(default)]
    pub source_subdir: Option<String>,
    /// Where a tree with the marker at the top level usually comes from
    #[serde(default)]
    pub root_origin: Option<String>,
    /// Where a tree with the marker under `source_subdir` usually comes from
    #[serde(default)]
    pub nested_origin: Option<String>,
}

/// Paths that must exist under the prefix once install finishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitySection {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub dirs: Vec<String>,
}

/// The program that runs smoke checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSection {
    pub program: String,
    /// Dependency whose `bin/` directory holds `program`
    #[serde(default)]
    pub provider: Option<String>,
}

fn default_status() -> Vec<i32> {
    vec![0]
}

/// One smoke check run after install and by the `test` entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub expected: Vec<String>,
    #[serde(default = "default_status")]
    pub status: Vec<i32>,
}

/// A complete package recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub package: PackageSection,
    #[serde(rename = "version")]
    pub versions: Vec<VersionRecord>,
    #[serde(default, rename = "depends")]
    pub dependencies: Vec<Dependency>,
    pub build: BuildSection,
    #[serde(default)]
    pub sanity: SanitySection,
    #[serde(default)]
    pub run_env: BTreeMap<String, String>,
    #[serde(default)]
    pub test: Option<TestSection>,
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckSpec>,
}

impl Recipe {
    /// Parse and validate a recipe from TOML text
    pub fn from_toml(text: &str, origin: &str) -> Result<Self> {
        let recipe: Recipe = toml::from_str(text).map_err(|source| RecipeError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text, &path.display().to_string())
    }

    pub fn name(&self) -> &str {
        &self.package.name
    }

    fn invalid(&self, reason: impl Into<String>) -> RecipeError {
        RecipeError::InvalidRecipe {
            recipe: self.package.name.clone(),
            reason: reason.into(),
        }
    }

    /// Check the invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.package.name.trim().is_empty() {
            return Err(self.invalid("package name is empty"));
        }
        if self.versions.is_empty() {
            return Err(self.invalid("no versions declared"));
        }

        let mut tags = HashSet::new();
        for v in &self.versions {
            if !tags.insert(v.tag.as_str()) {
                return Err(self.invalid(format!("duplicate version '{}'", v.tag)));
            }
            if v.sha256.len() != 64 || !v.sha256.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(self.invalid(format!("version '{}' has a malformed sha256", v.tag)));
            }
        }

        let preferred: Vec<_> = self.versions.iter().filter(|v| v.preferred).collect();
        if preferred.len() > 1 {
            return Err(self.invalid(format!(
                "more than one preferred version: {}",
                preferred.iter().map(|v| v.tag.as_str()).collect::<Vec<_>>().join(", ")
            )));
        }

        for dep in &self.dependencies {
            if dep.types.is_empty() {
                return Err(self.invalid(format!("dependency '{}' has no usage context", dep.name)));
            }
        }

        if self.build.system == BuildSystem::Pimake {
            if self.build.app.is_none() {
                return Err(self.invalid("pimake builds need build.app"));
            }
            if self.build.entry_point.is_none() {
                return Err(self.invalid("pimake builds need build.entry_point"));
            }
        }

        let mut checks = HashSet::new();
        for check in &self.checks {
            if !checks.insert(check.name.as_str()) {
                return Err(self.invalid(format!("duplicate check '{}'", check.name)));
            }
            if check.status.is_empty() {
                return Err(self.invalid(format!("check '{}' allows no exit status", check.name)));
            }
        }
        if !self.checks.is_empty() && self.test.is_none() {
            return Err(self.invalid("checks declared without a [test] program"));
        }
        for v in &self.versions {
            if let Some(name) = v.expect.keys().find(|k| !checks.contains(k.as_str())) {
                return Err(self.invalid(format!(
                    "version '{}' overrides unknown check '{}'",
                    v.tag, name
                )));
            }
        }

        Ok(())
    }

    /// Look up a version by tag
    pub fn version(&self, tag: &str) -> Result<&VersionRecord> {
        self.versions
            .iter()
            .find(|v| v.tag == tag)
            .ok_or_else(|| RecipeError::UnknownVersion {
                recipe: self.package.name.clone(),
                version: tag.to_string(),
            })
    }

    /// The flagged preferred version, else the first non-deprecated one
    pub fn preferred_version(&self) -> &VersionRecord {
        self.versions
            .iter()
            .find(|v| v.preferred)
            .or_else(|| self.versions.iter().find(|v| !v.deprecated))
            .unwrap_or(&self.versions[0])
    }

    /// The requested version, or the preferred one when none is requested
    pub fn resolve_version(&self, tag: Option<&str>) -> Result<&VersionRecord> {
        match tag {
            Some(tag) => self.version(tag),
            None => Ok(self.preferred_version()),
        }
    }

    /// Download URL for a version
    pub fn source_url(&self, version: &VersionRecord) -> String {
        match &version.url {
            Some(url) => url.clone(),
            None => substitute(
                &self.package.url,
                &[("version", version.tag.as_str()), ("name", self.name())],
            ),
        }
    }

    /// Dependencies needed in the given context
    pub fn dependencies_for(&self, ty: DepType) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(move |d| d.needed_for(ty))
    }

    /// Expected substrings for a check, honoring per-version overrides
    pub fn expected_for<'a>(&'a self, check: &'a CheckSpec, version: &'a VersionRecord) -> &'a [String] {
        version
            .expect
            .get(&check.name)
            .map(Vec::as_slice)
            .unwrap_or(&check.expected)
    }
}

/// Expand `%(key)s` placeholders. Unknown keys are left untouched.
pub fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("%({})s", key), value);
    }
    result
}
