//! Where an extracted executable goes, and how it gets there.

use crate::error::{InstallError, Result};
use crate::extract::set_executable;
use crate::platform::HostEnv;
use crate::system::run_inherited;
use crate::types::InstallMethod;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SYSTEM_BIN_DIR: &str = "/usr/local/bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub target: PathBuf,
    pub method: InstallMethod,
    pub elevated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBinary {
    pub path: PathBuf,
    pub method: InstallMethod,
    pub elevated: bool,
    pub in_path: bool,
}

fn user_bin_dir(home: &Path) -> PathBuf {
    home.join(".local").join("bin")
}

fn autonomix_bin_dir(home: &Path) -> PathBuf {
    home.join(".autonomix").join("bin")
}

fn require_home(env: &HostEnv) -> Result<&Path> {
    env.home.as_deref().ok_or_else(|| {
        InstallError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            "could not determine home directory",
        ))
    })
}

/// Picks the target path for `app_name`.
///
/// `Auto` prefers `~/.local/bin` when it exists and is on `PATH`, otherwise
/// `/usr/local/bin`. Explicit methods map to fixed directories; only the
/// system directory needs elevation.
pub fn plan_install_path(
    env: &HostEnv,
    app_name: &str,
    requested: InstallMethod,
) -> Result<InstallPlan> {
    let system = InstallPlan {
        target: Path::new(SYSTEM_BIN_DIR).join(app_name),
        method: InstallMethod::SystemPath,
        elevated: true,
    };

    let plan = match requested {
        InstallMethod::Auto => match env.home.as_deref().map(user_bin_dir) {
            Some(local_bin) if local_bin.is_dir() && env.is_on_path(&local_bin) => InstallPlan {
                target: local_bin.join(app_name),
                method: InstallMethod::UserPath,
                elevated: false,
            },
            _ => system,
        },
        InstallMethod::SystemPath => system,
        InstallMethod::UserPath => InstallPlan {
            target: user_bin_dir(require_home(env)?).join(app_name),
            method: InstallMethod::UserPath,
            elevated: false,
        },
        InstallMethod::AutonomixPath | InstallMethod::Homebrew => InstallPlan {
            target: autonomix_bin_dir(require_home(env)?).join(app_name),
            method: InstallMethod::AutonomixPath,
            elevated: false,
        },
    };

    tracing::debug!(
        "Planned {} for {} ({}, elevated: {})",
        plan.target.display(),
        app_name,
        plan.method,
        plan.elevated
    );
    Ok(plan)
}

/// Places `source` at the planned target with mode 0755.
pub fn write_binary(env: &HostEnv, plan: &InstallPlan, source: &Path) -> Result<InstalledBinary> {
    if plan.elevated {
        write_elevated(source, &plan.target)?;
    } else {
        write_atomic(source, &plan.target)?;
    }

    let in_path = plan
        .target
        .parent()
        .map(|dir| env.is_on_path(dir))
        .unwrap_or(false);

    tracing::info!("Installed binary to {}", plan.target.display());
    Ok(InstalledBinary {
        path: plan.target.clone(),
        method: plan.method,
        elevated: plan.elevated,
        in_path,
    })
}

fn write_atomic(source: &Path, target: &Path) -> Result<()> {
    let parent = target.parent().ok_or_else(|| {
        InstallError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", target.display()),
        ))
    })?;
    fs::create_dir_all(parent)?;

    let staged = NamedTempFile::new_in(parent)?;
    fs::copy(source, staged.path())?;
    set_executable(staged.path())?;
    staged.persist(target).map_err(|e| InstallError::Io(e.error))?;
    Ok(())
}

fn write_elevated(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        if !parent.is_dir() {
            run_inherited("sudo", [Path::new("mkdir"), Path::new("-p"), parent])?;
        }
    }
    run_inherited("sudo", [Path::new("cp"), source, target])?;
    run_inherited("sudo", [Path::new("chmod"), Path::new("755"), target])?;
    Ok(())
}

/// What to tell the user after a binary install.
pub fn install_instructions(installed: &InstalledBinary) -> String {
    let name = installed
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if installed.in_path {
        return format!(
            "Installed at: {}\nReady to use: {}",
            installed.path.display(),
            name
        );
    }

    let dir = installed
        .path
        .parent()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    format!(
        "Installed at: {}\nAdd to your PATH:\n  export PATH=\"{}:$PATH\"",
        installed.path.display(),
        dir
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::tests::host;
    use crate::platform::{HostArch, HostOs};
    use tempfile::TempDir;

    fn env_with_home(home: &Path) -> HostEnv {
        let mut env = host(HostOs::Linux, HostArch::Amd64);
        env.home = Some(home.to_path_buf());
        env
    }

    #[test]
    fn test_auto_prefers_local_bin_on_path() {
        let home = TempDir::new().unwrap();
        let local_bin = home.path().join(".local/bin");
        fs::create_dir_all(&local_bin).unwrap();

        let mut env = env_with_home(home.path());
        env.path_dirs.push(local_bin.clone());

        let plan = plan_install_path(&env, "app", InstallMethod::Auto).unwrap();
        assert_eq!(plan.target, local_bin.join("app"));
        assert_eq!(plan.method, InstallMethod::UserPath);
        assert!(!plan.elevated);
    }

    #[test]
    fn test_auto_falls_back_to_system_dir() {
        let home = TempDir::new().unwrap();
        let local_bin = home.path().join(".local/bin");

        // On PATH but missing.
        let mut env = env_with_home(home.path());
        env.path_dirs.push(local_bin.clone());
        let plan = plan_install_path(&env, "app", InstallMethod::Auto).unwrap();
        assert_eq!(plan.target, PathBuf::from("/usr/local/bin/app"));
        assert!(plan.elevated);

        // Present but not on PATH; a prefix of a PATH entry does not count.
        fs::create_dir_all(&local_bin).unwrap();
        env.path_dirs = vec![local_bin.join("extra")];
        let plan = plan_install_path(&env, "app", InstallMethod::Auto).unwrap();
        assert_eq!(plan.method, InstallMethod::SystemPath);
    }

    #[test]
    fn test_explicit_methods_use_fixed_locations() {
        let env = env_with_home(Path::new("/home/tester"));

        let user = plan_install_path(&env, "app", InstallMethod::UserPath).unwrap();
        assert_eq!(user.target, PathBuf::from("/home/tester/.local/bin/app"));
        assert!(!user.elevated);

        let own = plan_install_path(&env, "app", InstallMethod::AutonomixPath).unwrap();
        assert_eq!(own.target, PathBuf::from("/home/tester/.autonomix/bin/app"));
        assert!(!own.elevated);

        let system = plan_install_path(&env, "app", InstallMethod::SystemPath).unwrap();
        assert_eq!(system.target, PathBuf::from("/usr/local/bin/app"));
        assert!(system.elevated);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_binary_creates_parents_and_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let home = TempDir::new().unwrap();
        let source = home.path().join("extracted");
        fs::write(&source, b"payload").unwrap();

        let env = env_with_home(home.path());
        let plan = plan_install_path(&env, "app", InstallMethod::AutonomixPath).unwrap();
        let installed = write_binary(&env, &plan, &source).unwrap();

        assert_eq!(fs::read(&installed.path).unwrap(), b"payload");
        let mode = fs::metadata(&installed.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(!installed.in_path);
        assert!(install_instructions(&installed).contains("export PATH="));
    }

    #[test]
    fn test_write_binary_replaces_existing_file() {
        let home = TempDir::new().unwrap();
        let local_bin = home.path().join(".local/bin");
        fs::create_dir_all(&local_bin).unwrap();
        fs::write(local_bin.join("app"), b"old").unwrap();
        let source = home.path().join("new");
        fs::write(&source, b"new").unwrap();

        let mut env = env_with_home(home.path());
        env.path_dirs.push(local_bin.clone());
        let plan = plan_install_path(&env, "app", InstallMethod::Auto).unwrap();
        let installed = write_binary(&env, &plan, &source).unwrap();

        assert_eq!(fs::read(local_bin.join("app")).unwrap(), b"new");
        assert!(installed.in_path);
        assert!(install_instructions(&installed).contains("Ready to use: app"));
    }
}
