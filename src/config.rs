//! Configuration file loading
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. The config file
//! 3. CLI flags and their environment variables (applied by the binary)
//!
//! The config file is searched at:
//! 1. the path given with `--config`
//! 2. `$SCI_RECIPE_CONFIG`
//! 3. `$XDG_CONFIG_HOME/sci-recipe/config.toml` (or the platform equivalent)
//!
//! ```toml
//! prefix = "/opt/sci"
//! cache_dir = "/var/cache/sci-recipe"
//! tclsh = "/usr/bin/tclsh8.6"
//! inherit_path = true
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RecipeError, Result};

const DEFAULT_PREFIX: &str = "/usr/local";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    prefix: Option<PathBuf>,
    build_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    recipes_path: Option<PathBuf>,
    tclsh: Option<String>,
    python: Option<String>,
    inherit_path: Option<bool>,
    http_timeout_secs: Option<u64>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: PathBuf,
    /// Where sources are staged; a temporary directory when unset
    pub build_dir: Option<PathBuf>,
    /// Where downloaded archives are kept
    pub cache_dir: PathBuf,
    pub recipes_path: Option<PathBuf>,
    /// Fallback check program when no provider prefix is known
    pub tclsh: String,
    pub python: String,
    /// Pass the caller's PATH to smoke checks
    pub inherit_path: bool,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from(DEFAULT_PREFIX),
            build_dir: None,
            cache_dir: default_cache_dir(),
            recipes_path: None,
            tclsh: "tclsh".to_string(),
            python: "python3".to_string(),
            inherit_path: true,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("sci-recipe")
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match Self::locate(explicit) {
            Some(path) => {
                let text = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&text, &path.display().to_string())
            }
            None => Ok(Self::default()),
        }
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var("SCI_RECIPE_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|d| d.join("sci-recipe/config.toml"))
            .filter(|p| p.is_file())
    }

    /// Parse a config document and apply it over the defaults
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self> {
        let file: ConfigToml = toml::from_str(text).map_err(|source| RecipeError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        let mut config = Self::default();
        if let Some(prefix) = file.prefix {
            config.prefix = prefix;
        }
        if file.build_dir.is_some() {
            config.build_dir = file.build_dir;
        }
        if let Some(cache_dir) = file.cache_dir {
            config.cache_dir = cache_dir;
        }
        if file.recipes_path.is_some() {
            config.recipes_path = file.recipes_path;
        }
        if let Some(tclsh) = file.tclsh {
            config.tclsh = tclsh;
        }
        if let Some(python) = file.python {
            config.python = python;
        }
        if let Some(inherit) = file.inherit_path {
            config.inherit_path = inherit;
        }
        if let Some(secs) = file.http_timeout_secs {
            // Clamp to reasonable range (5-300 seconds)
            config.http_timeout = Duration::from_secs(secs.clamp(5, 300));
        }
        Ok(config)
    }
}
