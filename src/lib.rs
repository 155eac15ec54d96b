//! Recipe executor for scientific software packages
//!
//! Recipes are TOML documents describing how to acquire, build, install and
//! smoke-test a package into a prefix. Two recipes ship with the crate:
//! `oommf`, built with its own Tcl `pimake` driver and installed as a whole
//! tree under `<prefix>/usr/bin/oommf`, and `py-pyrect`, a plain `pip`
//! install.
//!
//! # Example
//!
//! ```no_run
//! use sci_recipe::{Config, InstallOptions, RecipeEngine};
//!
//! let engine = RecipeEngine::new(Config::load(None)?).with_dependency("tcl", "/opt/tcl");
//! let recipe = engine.load("oommf")?;
//! let outcome = engine.install(&recipe, &InstallOptions::default())?;
//! println!("installed {} ({})", outcome.version, outcome.layout);
//! # Ok::<(), sci_recipe::RecipeError>(())
//! ```
//!
//! # Install lifecycle
//!
//! - acquire: download (or take a local archive), verify sha256, extract
//! - configure: find the source root by its marker file, `pimake distclean`
//!   and `pimake upgrade`
//! - build: `pimake`
//! - install: copy the tree, copy the entry point to `<prefix>/bin`, sanity check
//! - check: run the recipe's smoke checks; failures are reported, never rolled back

pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod recipe;

pub use config::Config;
pub use engine::{
    InstallOptions, InstallOutcome, InstallPaths, InstallReceipt, RecipeEngine, Source,
    VerificationReport,
};
pub use error::{RecipeError, Result};
pub use recipe::Recipe;
