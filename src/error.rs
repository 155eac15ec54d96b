//! Error types for recipe loading, install phases and smoke checks.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::engine::phases::{Phase, PhaseState};

/// Errors that can occur while loading or executing a recipe.
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("cannot find '{marker}' in {} or any known subdirectory", dir.display())]
    LayoutNotFound { marker: String, dir: PathBuf },

    #[error("command failed: {cmd} (exit code: {code:?})")]
    ExternalCommand { cmd: String, code: Option<i32> },

    #[error("command failed to start: {cmd}: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("install failed for {}: {source}", path.display())]
    InstallCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("check '{check}' failed: {mismatch}")]
    VerificationMismatch { check: String, mismatch: Mismatch },

    #[error("sha256 verification failed for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("download failed: {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("cannot extract {}: {reason}", archive.display())]
    Extract { archive: PathBuf, reason: String },

    #[error("recipe '{recipe}' has no version '{version}'")]
    UnknownVersion { recipe: String, version: String },

    #[error("recipe not found: {0}")]
    UnknownRecipe(String),

    #[error("invalid recipe '{recipe}': {reason}")]
    InvalidRecipe { recipe: String, reason: String },

    #[error("cannot parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot run {phase} while {state}")]
    PhaseOrder { phase: Phase, state: PhaseState },

    #[error("sanity check failed: {} is missing", path.display())]
    SanityCheck { path: PathBuf },

    #[error("prefix {} is locked by another install; if this is incorrect, delete {}", prefix.display(), lock.display())]
    Locked { prefix: PathBuf, lock: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a smoke check did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// The program exited with a status outside the allowed set.
    Status { code: Option<i32>, allowed: Vec<i32> },
    /// An expected substring was absent from the captured output.
    MissingSubstring(String),
    /// The program could not be started at all.
    NotStarted(String),
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { code, allowed } => {
                write!(f, "exit code {:?} not in {:?}", code, allowed)
            }
            Self::MissingSubstring(s) => write!(f, "expected '{}' in output", s),
            Self::NotStarted(reason) => write!(f, "could not start: {}", reason),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecipeError>;
