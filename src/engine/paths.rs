//! Install path resolution
//!
//! Everything here is a pure function of the prefix; nothing touches the
//! filesystem.

use std::path::{Path, PathBuf};

use crate::recipe::{substitute, BuildSection, Recipe, VersionRecord};

/// Directory a vendored application tree is copied into: `<prefix>/usr/bin/<app>`
pub fn install_root(prefix: &Path, app: &str) -> PathBuf {
    prefix.join("usr").join("bin").join(app)
}

/// `<prefix>/bin`
pub fn bin_dir(prefix: &Path) -> PathBuf {
    prefix.join("bin")
}

/// Paths derived from a prefix for one recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    pub prefix: PathBuf,
    /// Where the built tree lives; the prefix itself for recipes without an app tree
    pub install_root: PathBuf,
    pub bin_dir: PathBuf,
    /// `<prefix>/bin/<entry point>` when the recipe has one
    pub entry_point: Option<PathBuf>,
}

impl InstallPaths {
    pub fn resolve(prefix: &Path, build: &BuildSection) -> Self {
        let bin = bin_dir(prefix);
        Self {
            prefix: prefix.to_path_buf(),
            install_root: match &build.app {
                Some(app) => install_root(prefix, app),
                None => prefix.to_path_buf(),
            },
            entry_point: build.entry_point.as_ref().map(|e| bin.join(e)),
            bin_dir: bin,
        }
    }

    /// Expand `%(key)s` placeholders against these paths
    ///
    /// Keys: `name`, `version`, `prefix`, `install_root`, `bin_dir`, `entry_point`.
    pub fn expand(&self, template: &str, recipe: &Recipe, version: &VersionRecord) -> String {
        let prefix = self.prefix.to_string_lossy().to_string();
        let root = self.install_root.to_string_lossy().to_string();
        let bin = self.bin_dir.to_string_lossy().to_string();
        let entry = self
            .entry_point
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        substitute(
            template,
            &[
                ("name", recipe.name()),
                ("version", version.tag.as_str()),
                ("prefix", prefix.as_str()),
                ("install_root", root.as_str()),
                ("bin_dir", bin.as_str()),
                ("entry_point", entry.as_str()),
            ],
        )
    }
}
