//! Phase modules - first-class concepts in the install lifecycle
//!
//! [`PhaseDriver`] runs configure, build and install in that order, each at
//! most once. A failed phase leaves the driver in [`PhaseState::Failed`] and
//! every later call is refused.

pub mod acquire;
pub mod build;
pub mod install;
pub mod layout;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::engine::paths::InstallPaths;
use crate::error::{RecipeError, Result};
use crate::output;
use crate::recipe::{BuildSection, BuildSystem, Recipe};

pub use layout::{LayoutProbe, SourceLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configure,
    Build,
    Install,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Install => "install",
        }
    }

    /// The state a driver must be in before this phase may run
    fn requires(&self) -> PhaseState {
        match self {
            Self::Configure => PhaseState::Pending,
            Self::Build => PhaseState::Configured,
            Self::Install => PhaseState::Built,
        }
    }

    fn reaches(&self) -> PhaseState {
        match self {
            Self::Configure => PhaseState::Configured,
            Self::Build => PhaseState::Built,
            Self::Install => PhaseState::Installed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Pending,
    Configured,
    Built,
    Installed,
    Failed,
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Configured => "configured",
            Self::Built => "built",
            Self::Installed => "installed",
            Self::Failed => "failed",
        })
    }
}

/// Drives one install attempt of one recipe through its phases
pub struct PhaseDriver<'a> {
    recipe: &'a Recipe,
    stage_dir: PathBuf,
    paths: InstallPaths,
    python: String,
    state: PhaseState,
    source_root: Option<PathBuf>,
}

impl<'a> PhaseDriver<'a> {
    pub fn new(recipe: &'a Recipe, stage_dir: &Path, paths: InstallPaths) -> Self {
        Self {
            recipe,
            stage_dir: stage_dir.to_path_buf(),
            paths,
            python: "python3".to_string(),
            state: PhaseState::Pending,
            source_root: None,
        }
    }

    /// Interpreter used by Python recipes
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// Source root resolved by configure
    pub fn source_root(&self) -> Option<&Path> {
        self.source_root.as_deref()
    }

    fn enter(&self, phase: Phase) -> Result<()> {
        if self.state != phase.requires() {
            return Err(RecipeError::PhaseOrder {
                phase,
                state: self.state,
            });
        }
        output::phase(phase.as_str());
        Ok(())
    }

    fn finish<T>(&mut self, phase: Phase, result: Result<T>) -> Result<T> {
        self.state = match &result {
            Ok(_) => phase.reaches(),
            Err(_) => PhaseState::Failed,
        };
        result
    }

    fn entry_point(&self) -> Result<&'a str> {
        self.recipe
            .build
            .entry_point
            .as_deref()
            .ok_or_else(|| RecipeError::InvalidRecipe {
                recipe: self.recipe.name().to_string(),
                reason: "pimake builds need build.entry_point".to_string(),
            })
    }

    fn resolved_root(&self) -> PathBuf {
        // Set by configure, which must have succeeded to get here
        self.source_root
            .clone()
            .unwrap_or_else(|| self.stage_dir.clone())
    }

    /// Detect the source layout, then prepare the tree for building
    pub fn configure(&mut self) -> Result<SourceLayout> {
        self.enter(Phase::Configure)?;
        let result = self.run_configure();
        self.finish(Phase::Configure, result)
    }

    fn run_configure(&mut self) -> Result<SourceLayout> {
        let layout = LayoutProbe::for_build(&self.recipe.build).detect(&self.stage_dir)?;
        let root = layout.source_root(&self.stage_dir);
        output::detail(&format!(
            "found '{}' in {} ({})",
            self.recipe.build.marker,
            root.display(),
            layout_note(&self.recipe.build, &layout)
        ));
        self.source_root = Some(root.clone());

        if self.recipe.build.system == BuildSystem::Pimake {
            build::configure_pimake(&root, self.entry_point()?)?;
        }
        Ok(layout)
    }

    pub fn build(&mut self) -> Result<()> {
        self.enter(Phase::Build)?;
        let result = match self.recipe.build.system {
            BuildSystem::Pimake => self
                .entry_point()
                .and_then(|entry| build::build_pimake(&self.resolved_root(), entry)),
            BuildSystem::Python => Ok(()),
        };
        self.finish(Phase::Build, result)
    }

    /// Copy the result into the prefix and run the sanity checks
    pub fn install(&mut self) -> Result<()> {
        self.enter(Phase::Install)?;
        let result = self.run_install();
        self.finish(Phase::Install, result)
    }

    fn run_install(&self) -> Result<()> {
        let root = self.resolved_root();
        match self.recipe.build.system {
            BuildSystem::Pimake => {
                install::install_tree(&root, &self.paths.install_root)?;
                install::install_entry_point(
                    &self.paths.install_root,
                    self.entry_point()?,
                    &self.paths.bin_dir,
                )?;
            }
            BuildSystem::Python => {
                install::pip_install(&self.python, &root, &self.paths.prefix)?;
            }
        }
        install::sanity_check(&self.paths.prefix, &self.recipe.sanity)
    }

    /// configure, build, install; stops at the first failure
    pub fn run_all(&mut self) -> Result<SourceLayout> {
        let layout = self.configure()?;
        self.build()?;
        self.install()?;
        Ok(layout)
    }
}

/// Describe where a tree with this layout probably came from
fn layout_note(build: &BuildSection, layout: &SourceLayout) -> String {
    let (origin, fallback) = match layout {
        SourceLayout::Root => (&build.root_origin, "looks like a release tarball"),
        SourceLayout::Nested(_) => (&build.nested_origin, "looks like a repository archive"),
    };
    match origin {
        Some(origin) => format!("looks like source from {}", origin),
        None => fallback.to_string(),
    }
}
