//! Installation strategy orchestration.
//!
//! One attempt walks `NotStarted -> TryingPackage -> TryingHomebrew (macOS)
//! -> TryingBinary -> Succeeded | Failed`. Each strategy either succeeds with
//! an [`InstallOutcome`] or hands over to the next one; only the error of the
//! last strategy tried is reported.

use crate::assets::{get_compatible_assets, resolve_binary, BinaryCandidate};
use crate::download::download_asset;
use crate::error::{InstallError, Result};
use crate::extract::extract;
use crate::homebrew;
use crate::package::PackageType;
use crate::paths::{install_instructions, plan_install_path, write_binary};
use crate::platform::HostEnv;
use crate::system::{preferred_package_type, run_inherited};
use crate::types::{InstallMethod, InstallOutcome, Release, Strategy};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    NotStarted,
    TryingPackage,
    TryingHomebrew,
    TryingBinary,
    Succeeded,
    Failed,
}

impl InstallState {
    fn strategy(&self) -> Option<Strategy> {
        match self {
            InstallState::TryingPackage => Some(Strategy::Package),
            InstallState::TryingHomebrew => Some(Strategy::Homebrew),
            InstallState::TryingBinary => Some(Strategy::Binary),
            _ => None,
        }
    }
}

/// The three ways of getting an application onto the host.
#[async_trait]
pub trait Strategies: Send + Sync {
    fn env(&self) -> &HostEnv;

    async fn install_package(&self, release: &Release, app_name: &str) -> Result<InstallOutcome>;

    async fn install_homebrew(&self, release: &Release, app_name: &str) -> Result<InstallOutcome>;

    async fn install_binary(
        &self,
        release: &Release,
        app_name: &str,
        method: InstallMethod,
    ) -> Result<InstallOutcome>;
}

/// Trace of one install attempt.
#[derive(Debug)]
pub struct Attempt {
    pub states: Vec<InstallState>,
    pub result: Result<InstallOutcome>,
}

impl Attempt {
    /// Immutable outcome for the caller to apply to its own records.
    pub fn into_outcome(self) -> InstallOutcome {
        let last_tried = self
            .states
            .iter()
            .rev()
            .find_map(|s| s.strategy())
            .unwrap_or(Strategy::Binary);
        InstallOutcome::from_result(last_tried, self.result)
    }
}

pub struct Installer<S> {
    strategies: S,
}

impl<S: Strategies> Installer<S> {
    pub fn new(strategies: S) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &S {
        &self.strategies
    }

    /// States an attempt will pass through, in order.
    ///
    /// An explicit method forces exactly one strategy.
    pub fn chain(&self, method: InstallMethod) -> Vec<InstallState> {
        match method {
            InstallMethod::Homebrew => vec![InstallState::TryingHomebrew],
            InstallMethod::SystemPath | InstallMethod::UserPath | InstallMethod::AutonomixPath => {
                vec![InstallState::TryingBinary]
            }
            InstallMethod::Auto => {
                let mut chain = vec![InstallState::TryingPackage];
                if self.strategies.env().is_macos() {
                    chain.push(InstallState::TryingHomebrew);
                }
                chain.push(InstallState::TryingBinary);
                chain
            }
        }
    }

    pub async fn attempt(&self, release: &Release, app_name: &str, method: InstallMethod) -> Attempt {
        let mut states = vec![InstallState::NotStarted];
        let mut last_error: Option<InstallError> = None;

        for state in self.chain(method) {
            states.push(state);
            let result = match state {
                InstallState::TryingPackage => {
                    self.strategies.install_package(release, app_name).await
                }
                InstallState::TryingHomebrew => {
                    self.strategies.install_homebrew(release, app_name).await
                }
                InstallState::TryingBinary => {
                    self.strategies.install_binary(release, app_name, method).await
                }
                _ => continue,
            };

            match result {
                Ok(outcome) => {
                    tracing::info!("{} installed via {}", app_name, outcome.method);
                    states.push(InstallState::Succeeded);
                    return Attempt {
                        states,
                        result: Ok(outcome),
                    };
                }
                Err(e) => {
                    let strategy = state.strategy().unwrap_or(Strategy::Binary);
                    if e.is_archive_miss() {
                        tracing::warn!("{} release archive does not ship it: {}", app_name, e);
                    } else {
                        tracing::debug!("{} strategy failed for {}: {}", strategy, app_name, e);
                    }
                    last_error = Some(e.in_strategy(strategy));
                }
            }
        }

        states.push(InstallState::Failed);
        let error = last_error.unwrap_or(InstallError::NoBinaryAssets);
        Attempt {
            states,
            result: Err(error.actionable()),
        }
    }

    /// One attempt, reduced to the outcome the caller records.
    pub async fn install_update(
        &self,
        release: &Release,
        app_name: &str,
        method: InstallMethod,
    ) -> InstallOutcome {
        self.attempt(release, app_name, method).await.into_outcome()
    }
}

/// Where distribution packages put their executables.
const PACKAGE_BIN_DIR: &str = "/usr/bin";

/// The executable a package manager installed for `app_name`: whatever `PATH`
/// resolves, else the name under the manager's own bin directory.
fn installed_executable(env: &HostEnv, app_name: &str, bin_dir: &Path) -> PathBuf {
    env.find_executable(app_name)
        .unwrap_or_else(|| bin_dir.join(app_name))
}

/// Privileged package-manager invocation for a downloaded package.
pub fn package_command(package_type: PackageType, package: &Path) -> Result<Vec<OsString>> {
    let package = if package.is_absolute() {
        package.to_path_buf()
    } else {
        std::env::current_dir()?.join(package)
    };
    let mut args: Vec<OsString> = match package_type {
        PackageType::Deb => vec!["apt-get".into(), "install".into(), "-y".into()],
        PackageType::Rpm => vec!["rpm".into(), "-Uvh".into()],
        PackageType::Pacman => vec!["pacman".into(), "-U".into(), "--noconfirm".into()],
        _ => return Err(InstallError::NoPackageManager),
    };
    args.push(package.into_os_string());
    Ok(args)
}

/// Copies an already downloaded binary asset into place.
pub fn place_binary(
    env: &HostEnv,
    release: &Release,
    candidate: &BinaryCandidate,
    downloaded: &Path,
    scratch: &Path,
    method: InstallMethod,
) -> Result<InstallOutcome> {
    let executable = extract(downloaded, &candidate.extracted_name, &scratch.join("extract"))?;
    let plan = plan_install_path(env, &candidate.extracted_name, method)?;
    let installed = write_binary(env, &plan, &executable)?;

    Ok(InstallOutcome::success(
        Strategy::Binary,
        release.version(),
        Some(installed.path.clone()),
        install_instructions(&installed),
    ))
}

/// Strategies backed by the real host: package managers, `brew` and the
/// filesystem.
pub struct SystemStrategies {
    env: HostEnv,
    http: reqwest::Client,
}

impl SystemStrategies {
    pub fn new(env: HostEnv, http: reqwest::Client) -> Self {
        Self { env, http }
    }
}

#[async_trait]
impl Strategies for SystemStrategies {
    fn env(&self) -> &HostEnv {
        &self.env
    }

    async fn install_package(&self, release: &Release, app_name: &str) -> Result<InstallOutcome> {
        let package_type = preferred_package_type(&self.env);
        let assets = get_compatible_assets(release, &self.env)?;
        let asset = assets
            .first()
            .ok_or(InstallError::NoCompatibleAsset(package_type))?;

        let scratch = TempDir::new()?;
        let downloaded = download_asset(&self.http, asset, scratch.path()).await?;
        let args = package_command(package_type, &downloaded)?;

        println!("Installing {}...", asset.name);
        run_inherited("sudo", &args)?;

        Ok(InstallOutcome::success(
            Strategy::Package,
            release.version(),
            Some(installed_executable(&self.env, app_name, Path::new(PACKAGE_BIN_DIR))),
            format!("Installed via {}", package_type.display_name()),
        ))
    }

    async fn install_homebrew(&self, release: &Release, app_name: &str) -> Result<InstallOutcome> {
        if !homebrew::is_available(&self.env) {
            return Err(InstallError::HomebrewUnavailable);
        }

        let formula = homebrew::search_formula(app_name)?;
        homebrew::install_formula(&formula)?;

        let version = homebrew::installed_version(&formula).unwrap_or_else(|e| {
            tracing::debug!("Could not read brew version for {}: {}", formula, e);
            release.version()
        });

        Ok(InstallOutcome::success(
            Strategy::Homebrew,
            version,
            Some(installed_executable(&self.env, app_name, &homebrew::bin_dir(&self.env))),
            format!("Installed {} via Homebrew", formula),
        ))
    }

    async fn install_binary(
        &self,
        release: &Release,
        _app_name: &str,
        method: InstallMethod,
    ) -> Result<InstallOutcome> {
        let candidate = resolve_binary(release, &self.env)?;

        let scratch = TempDir::new()?;
        let downloaded =
            download_asset(&self.http, &candidate.asset, &scratch.path().join("download")).await?;
        place_binary(&self.env, release, &candidate, &downloaded, scratch.path(), method)
    }
}
