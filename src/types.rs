use crate::error::InstallError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(rename = "browser_download_url", alias = "download_url")]
    pub download_url: String,
    #[serde(rename = "size", default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Tag with any leading `v` removed, as recorded in the store.
    pub fn version(&self) -> String {
        self.tag_name.trim_start_matches('v').to_string()
    }
}

/// Where the caller wants a binary to land. `Auto` is only ever a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    #[default]
    Auto,
    #[serde(rename = "system")]
    #[value(name = "system")]
    SystemPath,
    #[serde(rename = "user")]
    #[value(name = "user")]
    UserPath,
    Homebrew,
    #[serde(rename = "autonomix")]
    #[value(name = "autonomix")]
    AutonomixPath,
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallMethod::Auto => "auto",
            InstallMethod::SystemPath => "system",
            InstallMethod::UserPath => "user",
            InstallMethod::Homebrew => "homebrew",
            InstallMethod::AutonomixPath => "autonomix",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for InstallMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(InstallMethod::Auto),
            "system" | "system-path" => Ok(InstallMethod::SystemPath),
            "user" | "user-path" => Ok(InstallMethod::UserPath),
            "homebrew" | "brew" => Ok(InstallMethod::Homebrew),
            "autonomix" | "autonomix-path" => Ok(InstallMethod::AutonomixPath),
            other => Err(format!("unknown install method '{}'", other)),
        }
    }
}

/// The strategy that produced an install outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Package,
    Homebrew,
    Binary,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Package => write!(f, "package"),
            Strategy::Homebrew => write!(f, "homebrew"),
            Strategy::Binary => write!(f, "binary"),
        }
    }
}

/// Result of a single install attempt. Built once, never mutated.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InstallOutcome {
    pub method: Strategy,
    pub version: String,
    pub path: Option<PathBuf>,
    pub succeeded: bool,
    pub message: String,
}

impl InstallOutcome {
    pub fn success(
        method: Strategy,
        version: impl Into<String>,
        path: Option<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            method,
            version: version.into(),
            path,
            succeeded: true,
            message: message.into(),
        }
    }

    /// Failed outcome attributed to the strategy named in the error, or
    /// `fallback` when the error carries no strategy context.
    pub fn failure(fallback: Strategy, error: &InstallError) -> Self {
        Self {
            method: error.strategy().unwrap_or(fallback),
            version: String::new(),
            path: None,
            succeeded: false,
            message: error.user_message(),
        }
    }

    pub fn from_result(fallback: Strategy, result: Result<InstallOutcome, InstallError>) -> Self {
        match result {
            Ok(outcome) => outcome,
            Err(e) => Self::failure(fallback, &e),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Installed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TrackedApp {
    pub name: String,
    pub repo_url: String,
    #[serde(rename = "version", default)]
    pub installed_version: String,
    #[serde(rename = "latest", default)]
    pub latest_version: String,
    #[serde(default)]
    pub last_checked: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_method: Option<Strategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_status: Option<InstallStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_error: Option<String>,
}

impl TrackedApp {
    pub fn new(name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo_url: repo_url.into(),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.install_status == Some(InstallStatus::Failed)
    }

    /// Write an install outcome back into the record.
    ///
    /// Method and path are set together or not at all. A failed outcome keeps the
    /// previous install intact and only records the status and error text.
    pub fn apply_outcome(&mut self, outcome: &InstallOutcome) {
        if !outcome.succeeded {
            self.install_status = Some(InstallStatus::Failed);
            self.install_error = Some(if outcome.message.is_empty() {
                format!("{} install failed", outcome.method)
            } else {
                outcome.message.clone()
            });
            return;
        }

        if !outcome.version.is_empty() {
            self.installed_version = outcome.version.clone();
        }
        match &outcome.path {
            Some(path) => {
                self.install_method = Some(outcome.method);
                self.binary_path = Some(path.to_string_lossy().to_string());
            }
            None => {
                self.install_method = None;
                self.binary_path = None;
            }
        }
        self.install_status = Some(InstallStatus::Installed);
        self.install_error = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub default_method: InstallMethod,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
}

pub fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_method: InstallMethod::default(),
            github_api_url: default_github_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppStore {
    #[serde(default)]
    pub apps: Vec<TrackedApp>,
    #[serde(default)]
    pub settings: Settings,
}

impl AppStore {
    pub fn find(&self, name: &str) -> Option<&TrackedApp> {
        self.apps.iter().find(|a| a.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut TrackedApp> {
        self.apps.iter_mut().find(|a| a.name == name)
    }

    pub fn find_by_repo(&self, repo_url: &str) -> Option<&TrackedApp> {
        self.apps
            .iter()
            .find(|a| a.repo_url.eq_ignore_ascii_case(repo_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_successful_outcome_sets_method_and_path_together() {
        let mut app = TrackedApp::new("app", "https://github.com/o/app");
        app.install_error = Some("old".to_string());
        let outcome = InstallOutcome::success(
            Strategy::Binary,
            "1.0.0",
            Some(PathBuf::from("/home/u/.local/bin/app")),
            "ok",
        );
        app.apply_outcome(&outcome);

        assert_eq!(app.installed_version, "1.0.0");
        assert_eq!(app.install_method, Some(Strategy::Binary));
        assert_eq!(app.binary_path.as_deref(), Some("/home/u/.local/bin/app"));
        assert_eq!(app.install_status, Some(InstallStatus::Installed));
        assert!(app.install_error.is_none());
    }

    #[test]
    fn test_apply_outcome_without_path_leaves_method_unset() {
        let mut app = TrackedApp::new("app", "https://github.com/o/app");
        app.install_method = Some(Strategy::Binary);
        app.binary_path = Some("/old/app".to_string());
        let outcome = InstallOutcome::success(Strategy::Package, "2.0.0", None, "ok");
        app.apply_outcome(&outcome);

        assert_eq!(app.installed_version, "2.0.0");
        assert_eq!(app.install_status, Some(InstallStatus::Installed));
        assert!(app.install_method.is_none());
        assert!(app.binary_path.is_none());
    }

    #[test]
    fn test_apply_failed_outcome_records_error() {
        let mut app = TrackedApp::new("app", "https://github.com/o/app");
        let outcome = InstallOutcome::failure(Strategy::Binary, &InstallError::NoBinaryAssets);
        app.apply_outcome(&outcome);

        assert!(app.is_failed());
        assert!(app.install_error.as_deref().unwrap().contains("no binary assets"));
        assert!(app.install_method.is_none());
        assert!(app.binary_path.is_none());
    }

    #[test]
    fn test_store_reads_legacy_layout() {
        let json = r#"{
            "apps": [
                {
                    "name": "gh",
                    "repo_url": "https://github.com/cli/cli",
                    "version": "2.40.0",
                    "latest": "v2.41.0",
                    "last_checked": "",
                    "install_method": "package",
                    "install_status": "installed"
                }
            ]
        }"#;
        let store: AppStore = serde_json::from_str(json).unwrap();
        assert_eq!(store.apps.len(), 1);
        assert_eq!(store.apps[0].install_method, Some(Strategy::Package));
        assert_eq!(store.settings, Settings::default());
    }

    #[test]
    fn test_install_method_parse() {
        assert_eq!("brew".parse::<InstallMethod>(), Ok(InstallMethod::Homebrew));
        assert_eq!("System".parse::<InstallMethod>(), Ok(InstallMethod::SystemPath));
        assert!("elsewhere".parse::<InstallMethod>().is_err());
    }
}
