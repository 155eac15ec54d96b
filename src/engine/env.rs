//! Run-time environment exports
//!
//! Computed fresh from the install paths on every query.

use std::collections::BTreeMap;

use super::paths::InstallPaths;
use crate::recipe::{Recipe, VersionRecord};

/// Variables a recipe exports to its users, e.g. `OOMMF_ROOT` and `OOMMFTCL`
pub fn run_environment(
    recipe: &Recipe,
    version: &VersionRecord,
    paths: &InstallPaths,
) -> BTreeMap<String, String> {
    recipe
        .run_env
        .iter()
        .map(|(name, template)| (name.clone(), paths.expand(template, recipe, version)))
        .collect()
}

/// Render exports as POSIX shell `export` lines
pub fn render_exports(env: &BTreeMap<String, String>) -> String {
    env.iter()
        .map(|(name, value)| format!("export {}={}\n", name, shell_quote(value)))
        .collect()
}

fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:,@".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
