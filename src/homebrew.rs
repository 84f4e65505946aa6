//! Thin wrapper over the `brew` command line.

use crate::error::{InstallError, Result};
use crate::platform::HostEnv;
use crate::system::run_inherited;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const DEFAULT_BIN_DIR: &str = "/opt/homebrew/bin";

/// Homebrew is only considered on macOS, and only when `brew` is on `PATH`.
pub fn is_available(env: &HostEnv) -> bool {
    env.is_macos() && env.find_executable("brew").is_some()
}

fn brew_output(args: &[&str]) -> Result<String> {
    let output = Command::new("brew")
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;
    if !output.status.success() {
        return Err(InstallError::CommandFailed {
            command: format!("brew {}", args.join(" ")),
            status: output.status.to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Formula whose name is exactly `name` in `brew search` output.
pub fn search_formula(name: &str) -> Result<String> {
    let out = brew_output(&["search", name])?;
    if has_exact_formula(&out, name) {
        Ok(name.to_string())
    } else {
        Err(InstallError::FormulaNotFound(name.to_string()))
    }
}

fn has_exact_formula(search_output: &str, name: &str) -> bool {
    search_output.lines().any(|line| line.trim() == name)
}

/// Directory brew links formula executables into: the one holding `brew`
/// itself, else the Apple Silicon default.
pub fn bin_dir(env: &HostEnv) -> PathBuf {
    env.find_executable("brew")
        .and_then(|brew| brew.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BIN_DIR))
}

pub fn install_formula(formula: &str) -> Result<()> {
    tracing::info!("Installing {} with Homebrew", formula);
    run_inherited("brew", ["install", formula])
}

pub fn installed_version(formula: &str) -> Result<String> {
    let out = brew_output(&["list", "--versions", formula])?;
    parse_brew_versions(&out)
        .ok_or_else(|| InstallError::FormulaNotFound(formula.to_string()))
}

/// Second field of `brew list --versions` output (`name version ...`).
fn parse_brew_versions(out: &str) -> Option<String> {
    out.split_whitespace().nth(1).map(str::to_string)
}

pub fn is_installed_via_brew(formula: &str) -> bool {
    brew_output(&["list", formula]).is_ok()
}

pub fn uninstall(formula: &str) -> Result<()> {
    run_inherited("brew", ["uninstall", formula])
}
