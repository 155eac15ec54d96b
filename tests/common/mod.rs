//! Common test utilities: scratch prefixes, fake OOMMF source trees and a
//! fake `tclsh` that answers the smoke checks.

#![allow(dead_code)]

use sci_recipe::{Config, RecipeEngine};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch layout for one test
pub struct TestEnv {
    pub dir: TempDir,
    pub prefix: PathBuf,
    pub build_dir: PathBuf,
    pub recipes: PathBuf,
    pub tcl: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("prefix");
        let build_dir = dir.path().join("build");
        let recipes = dir.path().join("recipes");
        let tcl = dir.path().join("tcl");
        std::fs::create_dir_all(&recipes).unwrap();
        std::fs::create_dir_all(tcl.join("bin")).unwrap();
        Self {
            dir,
            prefix,
            build_dir,
            recipes,
            tcl,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            prefix: self.prefix.clone(),
            build_dir: Some(self.build_dir.clone()),
            cache_dir: self.dir.path().join("cache"),
            recipes_path: Some(self.recipes.clone()),
            inherit_path: false,
            ..Config::default()
        }
    }

    /// Engine with the fake tcl registered as the `tcl` dependency
    pub fn engine(&self) -> RecipeEngine {
        RecipeEngine::new(self.config()).with_dependency("tcl", &self.tcl)
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn installed(&self, rel: &str) -> PathBuf {
        self.prefix.join(rel)
    }
}

pub fn write_executable(path: &Path, script: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, script).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Build driver that logs each invocation to `calls.log` beside itself and
/// exits 1 when its target equals `fail_on` (`""` for the default target)
pub fn fake_driver(fail_on: Option<&str>) -> String {
    let fail = fail_on
        .map(|t| format!("[ \"$2\" = \"{}\" ] && exit 1\n", t))
        .unwrap_or_default();
    format!(
        "#!/bin/sh\necho \"$*\" >> \"$(dirname \"$0\")/calls.log\"\n{}exit 0\n",
        fail
    )
}

/// An OOMMF-like source tree: `<root>/oommf.tcl` plus the app directories
/// the sanity check looks for
pub fn oommf_tree(root: &Path, fail_on: Option<&str>) {
    write_executable(&root.join("oommf.tcl"), &fake_driver(fail_on));
    let examples = root.join("app/oxs/examples");
    std::fs::create_dir_all(&examples).unwrap();
    std::fs::write(examples.join("stdprob3.mif"), "# MIF 2.1\n").unwrap();
    std::fs::write(root.join("README"), "OOMMF\n").unwrap();
}

/// Lines logged by the fake driver under `root`
pub fn driver_calls(root: &Path) -> Vec<String> {
    std::fs::read_to_string(root.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

/// Answers all three OOMMF checks; `broken` names a subcommand that prints nothing
pub fn fake_tclsh(tcl_prefix: &Path, broken: Option<&str>) {
    let broken = broken.unwrap_or("none");
    let script = format!(
        r#"#!/bin/sh
[ "$2" = "{broken}" ] && exit 0
case "$2" in
  +version)
    echo "oommf.tcl 2.0a2 root=$OOMMF_ROOT"
    ;;
  +platform)
    echo "OOMMF threads: Yes"
    echo "OOMMF release: 2.0a2"
    echo "OOMMF API index: 20200608"
    echo "Temp file directory: /tmp"
    ;;
  boxsi)
    echo "Mesh geometry: 32 x 32 x 32 = 32 768 cells" >&2
    echo "End \"stdprob3.mif\""
    ;;
  *)
    exit 2
    ;;
esac
"#
    );
    write_executable(&tcl_prefix.join("bin/tclsh"), &script);
}

/// Pack `src` as `<top>/...` into a gzipped tarball at `dest`
pub fn tar_gz(src: &Path, top: &str, dest: &Path) {
    let file = std::fs::File::create(dest).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(top, src).unwrap();
    builder.into_inner().unwrap().finish().unwrap();
}

/// A pimake recipe named `name` whose only version is `archive`
pub fn write_local_recipe(recipes: &Path, name: &str, archive: &Path) -> PathBuf {
    let sha256 = sci_recipe::engine::phases::acquire::sha256_file(archive).unwrap();
    let text = format!(
        r#"[package]
name = "{name}"
url = "file://{archive}"

[[version]]
tag = "1.0"
sha256 = "{sha256}"

[build]
system = "pimake"
app = "{name}"
marker = "oommf.tcl"
entry_point = "oommf.tcl"
source_subdir = "oommf"

[sanity]
files = ["bin/oommf.tcl"]
dirs = ["usr/bin/{name}/app/oxs/examples"]

[run_env]
OOMMF_ROOT = "%(install_root)s"
"#,
        archive = archive.display()
    );
    let path = recipes.join(format!("{}.toml", name));
    std::fs::write(&path, text).unwrap();
    path
}
