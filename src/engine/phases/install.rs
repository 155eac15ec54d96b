//! Install phase helpers
//!
//! Copy the built tree into PREFIX, expose the entry point in PREFIX/bin and
//! check that the result looks like an install.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::engine::util::{display_cmd, run_in};
use crate::error::{RecipeError, Result};
use crate::output;
use crate::recipe::SanitySection;

fn copy_err(path: &Path) -> impl FnOnce(std::io::Error) -> RecipeError + '_ {
    move |source| RecipeError::InstallCopy {
        path: path.to_path_buf(),
        source,
    }
}

/// Resolve `path` through its deepest existing ancestor, keeping the
/// not-yet-created tail as written
fn resolve_partial(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize()?;
    for name in tail.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Recursively copy `src` into `dest`, returning the number of files copied
///
/// Symlinks are recreated rather than followed. Existing files are overwritten.
/// `dest` may not lie inside `src`, or the walk would copy its own output.
pub fn install_tree(src: &Path, dest: &Path) -> Result<usize> {
    let src_real = src.canonicalize().map_err(copy_err(src))?;
    let dest_real = resolve_partial(dest).map_err(copy_err(dest))?;
    if dest_real.starts_with(&src_real) {
        return Err(RecipeError::InstallCopy {
            path: dest.to_path_buf(),
            source: std::io::Error::other(format!(
                "install root lies inside the source tree {}",
                src.display()
            )),
        });
    }

    std::fs::create_dir_all(dest).map_err(copy_err(dest))?;

    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            RecipeError::InstallCopy {
                source: e.into_io_error().unwrap_or_else(|| std::io::Error::other("walk failed")),
                path,
            }
        })?;

        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| RecipeError::InstallCopy {
                path: entry.path().to_path_buf(),
                source: std::io::Error::other(e),
            })?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(copy_err(&target))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            std::fs::copy(entry.path(), &target).map_err(copy_err(entry.path()))?;
            copied += 1;
        }
    }

    output::detail(&format!("installed {} files to {}", copied, dest.display()));
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    let link = std::fs::read_link(src).map_err(copy_err(src))?;
    if target.symlink_metadata().is_ok() {
        std::fs::remove_file(target).map_err(copy_err(target))?;
    }
    std::os::unix::fs::symlink(&link, target).map_err(copy_err(target))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    std::fs::copy(src, target).map_err(copy_err(src))?;
    Ok(())
}

/// Copy `<install_root>/<entry>` to `<bin_dir>/<entry>` with mode 0755
pub fn install_entry_point(install_root: &Path, entry: &str, bin_dir: &Path) -> Result<PathBuf> {
    let src = install_root.join(entry);
    if !src.is_file() {
        return Err(RecipeError::InstallCopy {
            path: src,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "entry point missing"),
        });
    }

    std::fs::create_dir_all(bin_dir).map_err(copy_err(bin_dir))?;
    let dest = bin_dir.join(entry);
    std::fs::copy(&src, &dest).map_err(copy_err(&src))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755))
            .map_err(copy_err(&dest))?;
    }

    output::detail(&format!("install {} -> {}", src.display(), dest.display()));
    Ok(dest)
}

/// Fail if any declared file or directory is missing under the prefix
pub fn sanity_check(prefix: &Path, sanity: &SanitySection) -> Result<()> {
    for file in &sanity.files {
        let path = prefix.join(file);
        if !path.is_file() {
            return Err(RecipeError::SanityCheck { path });
        }
    }
    for dir in &sanity.dirs {
        let path = prefix.join(dir);
        if !path.is_dir() {
            return Err(RecipeError::SanityCheck { path });
        }
    }
    Ok(())
}

/// `python -m pip install` the tree at `source_root` into `prefix`
pub fn pip_install(python: &str, source_root: &Path, prefix: &Path) -> Result<()> {
    let prefix_arg = format!("--prefix={}", prefix.display());
    let args = [
        "-m",
        "pip",
        "install",
        prefix_arg.as_str(),
        "--no-deps",
        "--no-build-isolation",
        "--no-index",
        ".",
    ];
    let label = display_cmd(python, &args);
    run_in(source_root, Path::new(python), &args, &label)
}
