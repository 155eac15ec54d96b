//! External command execution
//!
//! Build driver commands stream their output to the terminal; smoke checks
//! capture it so it can be searched.

use crate::error::{RecipeError, Result};
use crate::output;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};

/// Output of a finished command
#[derive(Debug, Clone)]
pub struct Captured {
    /// Exit code, or None if terminated by signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut all = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        all.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') && !self.stderr.is_empty() {
            all.push('\n');
        }
        all.push_str(&self.stderr);
        all
    }
}

/// Render a command line for messages
pub fn display_cmd<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg.as_ref());
    }
    line
}

/// Run a command in `dir`, streaming its output, and fail on non-zero exit
///
/// `label` is how the command is shown to the user, e.g. `./oommf.tcl pimake`.
pub fn run_in<S: AsRef<OsStr>>(dir: &Path, program: &Path, args: &[S], label: &str) -> Result<()> {
    let shown = output::truncate(label, 60);
    let pb = output::spinner(&format!("run: {}", shown));

    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status();

    pb.finish_and_clear();

    let status = status.map_err(|source| RecipeError::Spawn {
        cmd: label.to_string(),
        source,
    })?;

    if !status.success() {
        output::detail(&format!("run: {} [FAILED]", shown));
        return Err(RecipeError::ExternalCommand {
            cmd: label.to_string(),
            code: status.code(),
        });
    }

    output::detail(&format!("run: {}", shown));
    Ok(())
}

/// Run a command with exactly the given environment and capture its output
pub fn capture(
    program: &Path,
    args: &[String],
    env: &BTreeMap<String, String>,
    dir: Option<&Path>,
) -> std::io::Result<Captured> {
    let mut cmd = Command::new(program);
    cmd.args(args).env_clear().envs(env).stdin(Stdio::null());
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let out = cmd.output()?;
    Ok(Captured {
        code: out.status.code(),
        stdout: String::from_utf8_lossy(&out.stdout).to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).to_string(),
    })
}
