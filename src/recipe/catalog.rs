//! Recipe lookup
//!
//! Recipes are found, in order, as an explicit `.toml` path, as
//! `<name>.toml` in the recipes directory, and finally among the recipes
//! compiled into the binary.

use std::path::{Path, PathBuf};

use super::Recipe;
use crate::error::{RecipeError, Result};

const BUILTIN: &[(&str, &str)] = &[
    ("oommf", include_str!("../../recipes/oommf.toml")),
    ("py-pyrect", include_str!("../../recipes/py-pyrect.toml")),
];

/// Names of the recipes shipped with the crate
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(name, _)| *name)
}

/// Parse a built-in recipe, if one exists under that name
pub fn builtin(name: &str) -> Option<Result<Recipe>> {
    BUILTIN
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(n, text)| Recipe::from_toml(text, &format!("built-in recipe '{}'", n)))
}

/// Load a recipe by name or path
pub fn load(name: &str, recipes_path: Option<&Path>) -> Result<Recipe> {
    let as_path = Path::new(name);
    if as_path.extension().is_some_and(|e| e == "toml") && as_path.is_file() {
        return Recipe::from_file(as_path);
    }

    if let Some(dir) = recipes_path {
        let candidate = dir.join(format!("{}.toml", name));
        if candidate.is_file() {
            return Recipe::from_file(&candidate);
        }
    }

    builtin(name).unwrap_or_else(|| Err(RecipeError::UnknownRecipe(name.to_string())))
}

/// All recipe names visible from the given search path, sorted and deduplicated
pub fn available(recipes_path: Option<&Path>) -> Result<Vec<String>> {
    let mut names: Vec<String> = builtin_names().map(String::from).collect();

    if let Some(dir) = recipes_path
        && dir.is_dir()
    {
        for entry in std::fs::read_dir(dir)? {
            let path: PathBuf = entry?.path();
            if path.extension().is_some_and(|e| e == "toml")
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string_lossy().to_string());
            }
        }
    }

    names.sort();
    names.dedup();
    Ok(names)
}
