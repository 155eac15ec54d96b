//! Recipe engine
//!
//! Ties recipe lookup, the install lifecycle and the smoke checks to one
//! resolved [`Config`] and a set of known dependency prefixes.

pub mod env;
mod lifecycle;
pub mod lock;
pub mod paths;
pub mod phases;
pub mod receipt;
pub mod util;
pub mod verify;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::recipe::{catalog, Recipe};

pub use lifecycle::{InstallOptions, InstallOutcome, Source};
pub use paths::InstallPaths;
pub use receipt::InstallReceipt;
pub use verify::VerificationReport;

/// Recipe execution engine
pub struct RecipeEngine {
    config: Config,
    /// Install prefixes of dependencies, by recipe name
    deps: BTreeMap<String, PathBuf>,
}

impl RecipeEngine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            deps: BTreeMap::new(),
        }
    }

    /// Record where a dependency (e.g. `tcl`) is installed
    pub fn with_dependency(mut self, name: impl Into<String>, prefix: impl Into<PathBuf>) -> Self {
        self.deps.insert(name.into(), prefix.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the prefix path
    pub fn prefix(&self) -> &Path {
        &self.config.prefix
    }

    pub fn dependency_prefixes(&self) -> &BTreeMap<String, PathBuf> {
        &self.deps
    }

    /// Load a recipe by name or `.toml` path
    pub fn load(&self, name: &str) -> Result<Recipe> {
        catalog::load(name, self.config.recipes_path.as_deref())
    }

    pub fn available(&self) -> Result<Vec<String>> {
        catalog::available(self.config.recipes_path.as_deref())
    }

    pub fn paths(&self, recipe: &Recipe) -> InstallPaths {
        InstallPaths::resolve(&self.config.prefix, &recipe.build)
    }

    /// Download (or check a local archive) into the cache without installing
    pub fn fetch(&self, recipe: &Recipe, version: Option<&str>, archive: Option<&Path>) -> Result<PathBuf> {
        lifecycle::fetch(&self.config, recipe, version, archive)
    }

    /// Execute a recipe (install a package)
    ///
    /// Follows the package lifecycle:
    /// 1. acquire - get and verify the sources
    /// 2. configure - detect the layout, prepare the tree
    /// 3. build
    /// 4. install - copy into the prefix, sanity check
    /// 5. post-install checks, unless disabled
    pub fn install(&self, recipe: &Recipe, options: &InstallOptions) -> Result<InstallOutcome> {
        lifecycle::install(&self.config, &self.deps, recipe, options)
    }

    /// Run the smoke checks against an existing install
    pub fn test(&self, recipe: &Recipe, version: Option<&str>) -> Result<VerificationReport> {
        lifecycle::test(&self.config, &self.deps, recipe, version)
    }

    /// Run-time environment variables for an installed recipe
    pub fn environment(&self, recipe: &Recipe, version: Option<&str>) -> Result<BTreeMap<String, String>> {
        lifecycle::environment(&self.config, recipe, version)
    }

    pub fn receipt(&self, recipe: &Recipe) -> Result<Option<InstallReceipt>> {
        InstallReceipt::read(&self.config.prefix, recipe.name())
    }
}
