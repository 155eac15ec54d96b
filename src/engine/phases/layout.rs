//! Source layout detection
//!
//! Release tarballs from NIST unpack with `oommf.tcl` at the top level.
//! GitHub archives wrap the same tree in an `oommf/` directory. Candidates
//! are probed in a fixed order and the first one holding the marker wins.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{RecipeError, Result};
use crate::recipe::BuildSection;

/// Where the marker file was found, relative to the staged directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLayout {
    Root,
    Nested(String),
}

impl SourceLayout {
    pub fn relative_path(&self) -> &Path {
        match self {
            Self::Root => Path::new("."),
            Self::Nested(dir) => Path::new(dir),
        }
    }

    /// Absolute source root under the staged directory
    pub fn source_root(&self, stage_dir: &Path) -> PathBuf {
        match self {
            Self::Root => stage_dir.to_path_buf(),
            Self::Nested(dir) => stage_dir.join(dir),
        }
    }
}

impl fmt::Display for SourceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "."),
            Self::Nested(dir) => write!(f, "{}", dir),
        }
    }
}

/// Ordered list of candidate layouts to probe for a marker file
#[derive(Debug, Clone)]
pub struct LayoutProbe {
    marker: String,
    candidates: Vec<SourceLayout>,
}

impl LayoutProbe {
    /// Probe only the top level
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            candidates: vec![SourceLayout::Root],
        }
    }

    /// Also probe a subdirectory, after every earlier candidate
    pub fn with_nested(mut self, subdir: impl Into<String>) -> Self {
        self.candidates.push(SourceLayout::Nested(subdir.into()));
        self
    }

    pub fn for_build(build: &BuildSection) -> Self {
        let probe = Self::new(&build.marker);
        match &build.source_subdir {
            Some(subdir) => probe.with_nested(subdir),
            None => probe,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// First candidate whose directory holds the marker file
    pub fn detect(&self, stage_dir: &Path) -> Result<SourceLayout> {
        self.candidates
            .iter()
            .find(|c| c.source_root(stage_dir).join(&self.marker).is_file())
            .cloned()
            .ok_or_else(|| RecipeError::LayoutNotFound {
                marker: self.marker.clone(),
                dir: stage_dir.to_path_buf(),
            })
    }
}
