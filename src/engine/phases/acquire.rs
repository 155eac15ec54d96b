//! Acquire phase: download, checksum and stage sources
//!
//! Archives are cached under the configured cache directory as
//! `<name>-<version>.tar.gz` and reused when their checksum still matches.

use crate::error::{RecipeError, Result};
use crate::output;
use crate::recipe::{Recipe, VersionRecord};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if actual != expected.to_lowercase() {
        return Err(RecipeError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_lowercase(),
            actual,
        });
    }
    Ok(())
}

/// Download `url` to `dest`, returning the number of bytes written
pub fn download(url: &str, dest: &Path, timeout: Duration) -> Result<u64> {
    let fail = |reason: String| RecipeError::Download {
        url: url.to_string(),
        reason,
    };

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let filename = dest
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let pb = output::download_progress(&format!("downloading {}", filename));

    let response = ureq::get(url)
        .timeout(timeout)
        .set("User-Agent", "sci-recipe")
        .call()
        .map_err(|e| {
            pb.finish_and_clear();
            fail(e.to_string())
        })?;

    if let Some(len) = response
        .header("content-length")
        .and_then(|s| s.parse().ok())
    {
        output::upgrade_to_bytes(&pb, len);
    }

    // Write to a side file so an interrupted download never looks cached
    let partial = dest.with_extension("part");
    let written = copy_body(response.into_reader(), &partial, &pb, &fail);
    pb.finish_and_clear();

    let total = match written {
        Ok(total) => total,
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            return Err(e);
        }
    };
    std::fs::rename(&partial, dest)?;
    Ok(total)
}

fn copy_body(
    mut reader: impl Read,
    partial: &Path,
    pb: &indicatif::ProgressBar,
    fail: &dyn Fn(String) -> RecipeError,
) -> Result<u64> {
    let mut file = File::create(partial)?;
    let mut buffer = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = reader
            .read(&mut buffer)
            .map_err(|e| fail(format!("read error: {}", e)))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])?;
        total += n as u64;
        pb.set_position(total);
    }
    file.flush()?;
    Ok(total)
}

/// Cached archive path for a version
pub fn cache_path(cache_dir: &Path, recipe: &Recipe, version: &VersionRecord) -> PathBuf {
    cache_dir.join(format!("{}-{}.tar.gz", recipe.name(), version.tag))
}

/// Make a verified archive for `version` available, downloading if needed
pub fn fetch(
    recipe: &Recipe,
    version: &VersionRecord,
    cache_dir: &Path,
    timeout: Duration,
) -> Result<PathBuf> {
    let archive = cache_path(cache_dir, recipe, version);

    if archive.is_file() {
        if verify_sha256(&archive, &version.sha256).is_ok() {
            output::detail(&format!("using cached {}", archive.display()));
            return Ok(archive);
        }
        output::warning(&format!("discarding corrupt cache entry {}", archive.display()));
        std::fs::remove_file(&archive)?;
    }

    let url = recipe.source_url(version);
    let bytes = download(&url, &archive, timeout)?;
    output::detail(&format!("downloaded {} ({} bytes)", url, bytes));

    if let Err(e) = verify_sha256(&archive, &version.sha256) {
        let _ = std::fs::remove_file(&archive);
        return Err(e);
    }
    output::detail("sha256 verified");
    Ok(archive)
}

/// Use an archive the caller already has, after checking it
pub fn local_archive(path: &Path, version: &VersionRecord) -> Result<PathBuf> {
    verify_sha256(path, &version.sha256)?;
    output::detail(&format!("using {} (sha256 verified)", path.display()));
    Ok(path.to_path_buf())
}

/// Extract an archive into `<build_dir>/<name>-<version>` and return the source path
///
/// When the archive holds a single top-level directory, that directory is
/// the source path.
pub fn stage(
    archive: &Path,
    build_dir: &Path,
    recipe: &Recipe,
    version: &VersionRecord,
) -> Result<PathBuf> {
    let name = archive.to_string_lossy().to_lowercase();
    if !(name.ends_with(".tar.gz") || name.ends_with(".tgz")) {
        return Err(RecipeError::Extract {
            archive: archive.to_path_buf(),
            reason: "unsupported archive format (expected .tar.gz or .tgz)".to_string(),
        });
    }

    let dest = build_dir.join(format!("{}-{}", recipe.name(), version.tag));
    if dest.exists() {
        std::fs::remove_dir_all(&dest)?;
    }
    std::fs::create_dir_all(&dest)?;

    let pb = output::spinner(&format!("extracting {}", archive.display()));
    let result = extract_tar_gz(archive, &dest);
    pb.finish_and_clear();
    result?;

    let source = single_top_dir(&dest)?.unwrap_or(dest);
    output::detail(&format!("staged {}", source.display()));
    Ok(source)
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    let fail = |reason: String| RecipeError::Extract {
        archive: archive_path.to_path_buf(),
        reason,
    };

    let decoder = flate2::read::GzDecoder::new(BufReader::new(File::open(archive_path)?));
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries().map_err(|e| fail(e.to_string()))? {
        let mut entry = entry.map_err(|e| fail(e.to_string()))?;
        let path = entry.path().map_err(|e| fail(e.to_string()))?.into_owned();

        if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return Err(fail(format!("unsafe path in archive: {}", path.display())));
        }
        if path.as_os_str().is_empty() || path == Path::new(".") {
            continue;
        }

        // unpack_in refuses entries that would escape `dest` through links
        let unpacked = entry.unpack_in(dest).map_err(|e| fail(e.to_string()))?;
        if !unpacked {
            return Err(fail(format!("unsafe path in archive: {}", path.display())));
        }
    }
    Ok(())
}

fn single_top_dir(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?;
    let first = match entries.next() {
        Some(entry) => entry?.path(),
        None => return Ok(None),
    };
    if entries.next().is_some() || !first.is_dir() {
        return Ok(None);
    }
    Ok(Some(first))
}
