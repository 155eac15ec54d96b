//! Prefix lock management
//!
//! One install at a time per prefix. The lock is an exclusive `fs2` lock on
//! `<prefix>/.sci-recipe.lock`. The kernel drops it when the holder exits,
//! so a lock file left behind by a dead install is simply locked again.
//! The file itself is never removed: unlinking it would let a second caller
//! lock a fresh inode while the first still holds the old one.

use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{RecipeError, Result};

const LOCK_FILE: &str = ".sci-recipe.lock";

/// Take the install lock for `prefix`, creating the prefix if needed
pub fn lock_prefix(prefix: &Path) -> Result<PrefixLock> {
    std::fs::create_dir_all(prefix)?;
    let lock_path = prefix.join(LOCK_FILE);

    let file = File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;

    if file.try_lock_exclusive().is_err() {
        return Err(RecipeError::Locked {
            prefix: prefix.to_path_buf(),
            lock: lock_path,
        });
    }

    Ok(PrefixLock {
        file,
        path: lock_path,
    })
}

/// RAII guard for the prefix lock
#[derive(Debug)]
pub struct PrefixLock {
    file: File,
    path: PathBuf,
}

impl PrefixLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PrefixLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
