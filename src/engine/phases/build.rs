//! Configure and build commands
//!
//! OOMMF ships its own Tcl build driver; every step is one `oommf.tcl pimake`
//! invocation run from the source root. Python recipes have nothing to do
//! here and do all their work in install.

use std::path::Path;

use crate::engine::util::{display_cmd, run_in};
use crate::error::Result;

/// Run `./<entry> pimake [target]` in `source_root`
pub fn pimake(source_root: &Path, entry: &str, target: Option<&str>) -> Result<()> {
    let mut args = vec!["pimake"];
    args.extend(target);
    let label = display_cmd(&format!("./{}", entry), &args);
    run_in(source_root, &source_root.join(entry), &args, &label)
}

/// Clean and upgrade the tree; both must succeed
pub fn configure_pimake(source_root: &Path, entry: &str) -> Result<()> {
    pimake(source_root, entry, Some("distclean"))?;
    pimake(source_root, entry, Some("upgrade"))
}

/// Default pimake target
pub fn build_pimake(source_root: &Path, entry: &str) -> Result<()> {
    pimake(source_root, entry, None)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::RecipeError;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// A stand-in build driver that appends its arguments to `calls.log`
    fn fake_driver(dir: &Path, fail_on: Option<&str>) {
        let fail = fail_on
            .map(|t| format!("[ \"$2\" = \"{}\" ] && exit 1\n", t))
            .unwrap_or_default();
        let script = format!(
            "#!/bin/sh\necho \"$*\" >> \"$(dirname \"$0\")/calls.log\"\n{}exit 0\n",
            fail
        );
        let path = dir.join("oommf.tcl");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn calls(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_configure_runs_distclean_then_upgrade() {
        let dir = TempDir::new().unwrap();
        fake_driver(dir.path(), None);

        configure_pimake(dir.path(), "oommf.tcl").unwrap();
        assert_eq!(calls(dir.path()), ["pimake distclean", "pimake upgrade"]);
    }

    #[test]
    fn test_failed_distclean_skips_upgrade() {
        let dir = TempDir::new().unwrap();
        fake_driver(dir.path(), Some("distclean"));

        let err = configure_pimake(dir.path(), "oommf.tcl").unwrap_err();
        match err {
            RecipeError::ExternalCommand { cmd, code } => {
                assert_eq!(cmd, "./oommf.tcl pimake distclean");
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls(dir.path()), ["pimake distclean"]);
    }

    #[test]
    fn test_build_runs_default_target() {
        let dir = TempDir::new().unwrap();
        fake_driver(dir.path(), None);

        build_pimake(dir.path(), "oommf.tcl").unwrap();
        assert_eq!(calls(dir.path()), ["pimake"]);
    }
}
