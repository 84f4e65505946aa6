//! Probes of the host's package managers.

use crate::error::{InstallError, Result};
use crate::package::PackageType;
use crate::platform::HostEnv;
use std::ffi::OsStr;
use std::process::{Command, Stdio};

/// Package format the host's package manager installs.
///
/// The os-release `ID` decides when it is recognised; otherwise the first of
/// `pacman`, `dpkg`, `rpm` found on `PATH` does.
pub fn preferred_package_type(env: &HostEnv) -> PackageType {
    if let Some(id) = env.os_release_id.as_deref() {
        match id {
            "arch" | "manjaro" | "endeavouros" | "garuda" => return PackageType::Pacman,
            "debian" | "ubuntu" | "linuxmint" | "pop" | "elementary" => return PackageType::Deb,
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" => return PackageType::Rpm,
            _ => {}
        }
    }

    for (tool, kind) in [
        ("pacman", PackageType::Pacman),
        ("dpkg", PackageType::Deb),
        ("rpm", PackageType::Rpm),
    ] {
        if env.find_executable(tool).is_some() {
            return kind;
        }
    }
    PackageType::Unknown
}

/// An application found on the host, and who installed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub version: String,
    pub package_type: PackageType,
}

/// Spellings a package manager might know an application by, deduplicated
/// and in probe order.
pub fn name_variants(app_name: &str) -> Vec<String> {
    let lower = app_name.to_lowercase();
    let mut candidates = vec![app_name.to_string(), lower.clone()];

    candidates.push(lower.replace([' ', '_'], "-"));

    for suffix in ["-cli", " cli", "_cli", "cli"] {
        if let Some(trimmed) = lower.strip_suffix(suffix) {
            let trimmed = trimmed.trim_end_matches(['-', '_', ' ']).trim();
            if !trimmed.is_empty() {
                candidates.push(trimmed.to_string());
            }
        }
    }

    let mut unique: Vec<String> = Vec::new();
    for candidate in candidates {
        if !candidate.is_empty() && !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// Looks for an existing installation of `app_name` through snap, flatpak,
/// dpkg, pacman and rpm, then falls back to `PATH`.
pub fn check_installed(env: &HostEnv, app_name: &str) -> Option<InstalledPackage> {
    for name in name_variants(app_name) {
        let probes: [(fn(&str) -> Option<String>, PackageType); 5] = [
            (check_snap, PackageType::Snap),
            (check_flatpak, PackageType::Flatpak),
            (check_dpkg, PackageType::Deb),
            (check_pacman, PackageType::Pacman),
            (check_rpm, PackageType::Rpm),
        ];
        for (probe, package_type) in probes {
            if let Some(version) = probe(&name) {
                tracing::debug!("{} found via {} ({})", name, package_type, version);
                return Some(InstalledPackage {
                    version,
                    package_type,
                });
            }
        }

        if let Some(version) = check_binary(env, &name) {
            tracing::debug!("{} found on PATH ({})", name, version);
            return Some(InstalledPackage {
                version,
                package_type: PackageType::Unknown,
            });
        }
    }
    None
}

fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Runs a command attached to the user's terminal, so prompts from `sudo`
/// or a package manager stay interactive. Blocks until it exits.
pub fn run_inherited<I, S>(program: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let command_line = std::iter::once(program.to_string())
        .chain(args.iter().map(|a| a.as_ref().to_string_lossy().to_string()))
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!("Running `{}`", command_line);

    let status = Command::new(program)
        .args(&args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        return Err(InstallError::CommandFailed {
            command: command_line,
            status: status.to_string(),
        });
    }
    Ok(())
}

fn check_snap(name: &str) -> Option<String> {
    let out = command_stdout("snap", &["list", name])?;
    parse_snap_list(&out)
}

fn parse_snap_list(out: &str) -> Option<String> {
    let row = out.lines().nth(1)?;
    row.split_whitespace().nth(1).map(str::to_string)
}

fn check_flatpak(name: &str) -> Option<String> {
    let out = command_stdout(
        "flatpak",
        &["list", "--app", "--columns=application,name,version"],
    )?;
    parse_flatpak_list(&out, name)
}

fn parse_flatpak_list(out: &str, name: &str) -> Option<String> {
    let wanted = name.to_lowercase();
    let id_suffix = format!(".{}", wanted);
    out.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return None;
        }
        let app_id = fields[0].to_lowercase();
        let app_name = fields[1].to_lowercase();
        if app_name == wanted || app_id.ends_with(&id_suffix) {
            Some(fields[2].to_string())
        } else {
            None
        }
    })
}

fn check_dpkg(name: &str) -> Option<String> {
    command_stdout("dpkg-query", &["-W", "-f=${Version}", name])
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_pacman(name: &str) -> Option<String> {
    let out = command_stdout("pacman", &["-Q", name])?;
    out.split_whitespace().nth(1).map(str::to_string)
}

fn check_rpm(name: &str) -> Option<String> {
    command_stdout("rpm", &["-q", "--qf", "%{VERSION}", name])
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_binary(env: &HostEnv, name: &str) -> Option<String> {
    let path = env.find_executable(name)?;
    let path_str = path.to_string_lossy().to_string();

    for flag in ["--version", "-v", "version"] {
        if let Some(out) = command_stdout(&path_str, &[flag]) {
            if let Some(first) = out.lines().map(str::trim).find(|l| !l.is_empty()) {
                return Some(first.to_string());
            }
        }
    }
    Some("detected".to_string())
}
