//! Install receipts
//!
//! A small JSON record under `<prefix>/.sci-recipe/` saying which version of
//! a recipe was installed there and what it exports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{RecipeError, Result};

const RECEIPT_DIR: &str = ".sci-recipe";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub sha256: String,
    /// None when the sources came from a local directory
    pub source: Option<String>,
    pub install_root: PathBuf,
    pub environment: BTreeMap<String, String>,
}

pub fn receipt_path(prefix: &Path, name: &str) -> PathBuf {
    prefix.join(RECEIPT_DIR).join(format!("{}.json", name))
}

impl InstallReceipt {
    pub fn write(&self, prefix: &Path) -> Result<PathBuf> {
        let path = receipt_path(prefix, &self.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Read the receipt for `name`, if that recipe is installed under `prefix`
    pub fn read(prefix: &Path, name: &str) -> Result<Option<Self>> {
        let path = receipt_path(prefix, name);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| RecipeError::InvalidRecipe {
                recipe: name.to_string(),
                reason: format!("corrupt install receipt {}: {}", path.display(), e),
            })
    }
}
