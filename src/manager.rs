//! Operations on the tracked-application store.

use crate::github::ReleaseSource;
use crate::homebrew;
use crate::install::{Installer, Strategies};
pub use crate::repo_url::normalize_repo_url;
use crate::repo_url::RepoRef;
use crate::system::{run_inherited, InstalledPackage};
use crate::types::{AppStore, InstallMethod, InstallOutcome, Release, Strategy, TrackedApp};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddResult {
    Added(TrackedApp),
    /// The repository was already tracked; the store is untouched.
    AlreadyTracked(TrackedApp),
}

impl AddResult {
    pub fn app(&self) -> &TrackedApp {
        match self {
            AddResult::Added(app) | AddResult::AlreadyTracked(app) => app,
        }
    }
}

/// Starts tracking the repository at `url`.
///
/// Duplicates are detected before any network access. The new record picks up
/// an existing installation through `probe`, tried with the app name and then
/// the repository name.
pub async fn add_app<P>(
    store: &mut AppStore,
    source: &dyn ReleaseSource,
    probe: P,
    url: &str,
) -> Result<AddResult>
where
    P: Fn(&str) -> Option<InstalledPackage>,
{
    let repo_url = normalize_repo_url(url);
    if let Some(existing) = store.find_by_repo(&repo_url) {
        tracing::debug!("{} is already tracked as {}", repo_url, existing.name);
        return Ok(AddResult::AlreadyTracked(existing.clone()));
    }

    let repo = RepoRef::parse(&repo_url)?;
    let release = source
        .latest_release(&repo_url)
        .await
        .with_context(|| format!("Failed to fetch release for {}", repo_url))?;

    let name = app_name_for(&repo, &release);
    let mut app = TrackedApp::new(name.clone(), repo.url());
    app.latest_version = release.tag_name.clone();
    app.last_checked = Utc::now().to_rfc3339();

    let existing = probe(&name).or_else(|| {
        if repo.repo != name {
            probe(&repo.repo)
        } else {
            None
        }
    });
    if let Some(found) = existing {
        tracing::info!(
            "{} is already installed ({}, {})",
            name,
            found.version,
            found.package_type
        );
        app.installed_version = found.version;
    }

    store.apps.push(app.clone());
    Ok(AddResult::Added(app))
}

/// Release titles like `v1.2.0` or `Release 1.2.0` say nothing about the
/// tool; those fall back to the repository name.
fn app_name_for(repo: &RepoRef, release: &Release) -> String {
    match release.name.as_deref().map(str::trim) {
        Some(name)
            if !name.is_empty()
                && !name.starts_with('v')
                && !name.to_lowercase().contains("release")
                && name != release.tag_name =>
        {
            name.to_string()
        }
        _ => repo.repo.clone(),
    }
}

/// Runs one install attempt for `app_name`. The caller applies the outcome.
pub async fn install_app<S: Strategies>(
    installer: &Installer<S>,
    release: &Release,
    app_name: &str,
    method: InstallMethod,
) -> InstallOutcome {
    installer.install_update(release, app_name, method).await
}

/// Writes `outcome` into the record called `name`.
pub fn record_outcome(store: &mut AppStore, name: &str, outcome: &InstallOutcome) -> Result<()> {
    let app = store
        .find_mut(name)
        .ok_or_else(|| anyhow!("App '{}' not found", name))?;
    app.apply_outcome(outcome);
    Ok(())
}

/// Uninstalls `name` the way it was installed and stops tracking it.
///
/// Package-manager installs are left in place. Uninstall problems are logged
/// and do not keep the record around.
pub fn remove_app(store: &mut AppStore, name: &str) -> Result<TrackedApp> {
    let index = store
        .apps
        .iter()
        .position(|a| a.name == name)
        .ok_or_else(|| anyhow!("App '{}' not found", name))?;

    let app = &store.apps[index];
    match app.install_method {
        Some(Strategy::Homebrew) => {
            println!("Uninstalling via Homebrew...");
            if let Err(e) = homebrew::uninstall(&app.name) {
                tracing::warn!("brew uninstall failed: {}", e);
            }
        }
        Some(Strategy::Binary) => {
            if let Some(path) = app.binary_path.as_deref() {
                println!("Removing binary: {}", path);
                if let Err(e) = remove_binary(Path::new(path)) {
                    tracing::warn!("Failed to remove {}: {}", path, e);
                }
            }
        }
        Some(Strategy::Package) | None => {
            tracing::debug!("{} is not managed by autonomix; only untracking", app.name);
        }
    }

    Ok(store.apps.remove(index))
}

fn remove_binary(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("{} already gone", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            tracing::info!("Retrying removal of {} with sudo", path.display());
            run_inherited("sudo", [Path::new("rm"), Path::new("-f"), path])?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Drops every record whose last install failed; returns their names.
pub fn clean_failed(store: &mut AppStore) -> Vec<String> {
    let mut removed = Vec::new();
    store.apps.retain(|app| {
        if app.is_failed() {
            removed.push(app.name.clone());
            false
        } else {
            true
        }
    });
    removed
}

/// Strips a leading `v` and a Debian/RPM package revision (`0.1.1-1`,
/// `2.0-3.el9`).
pub fn normalize_version(version: &str) -> String {
    let v = version.trim();
    let v = v.strip_prefix('v').unwrap_or(v);
    if let Some(idx) = v.rfind('-') {
        let suffix = &v[idx + 1..];
        let is_revision = !suffix.is_empty()
            && (suffix.chars().all(|c| c.is_ascii_digit()) || suffix.contains("el"));
        if idx > 0 && is_revision {
            return v[..idx].to_string();
        }
    }
    v.to_string()
}

fn parse_lenient(version: &str) -> Option<semver::Version> {
    if let Ok(parsed) = semver::Version::parse(version) {
        return Some(parsed);
    }
    let parts: Vec<&str> = version.split('.').collect();
    let padded = match parts.len() {
        1 => format!("{}.0.0", version),
        2 => format!("{}.0", version),
        _ => return None,
    };
    semver::Version::parse(&padded).ok()
}

/// Whether the recorded latest release is newer than what is installed.
pub fn update_available(app: &TrackedApp) -> bool {
    if app.installed_version.is_empty() || app.latest_version.is_empty() {
        return false;
    }
    let installed = normalize_version(&app.installed_version);
    let latest = normalize_version(&app.latest_version);

    match (parse_lenient(&installed), parse_lenient(&latest)) {
        (Some(i), Some(l)) => l > i,
        _ => installed != latest,
    }
}
