//! Error taxonomy for release resolution and installation.
//!
//! Component errors are wrapped in [`InstallError::Strategy`] so the strategy
//! that produced them stays visible; only the orchestrator decides whether an
//! error ends the fallback chain.

use crate::package::PackageType;
use crate::types::Strategy;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Raw OS error for "No space left on device" on Linux and macOS.
const ENOSPC: i32 = 28;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("network error: {0}")]
    Network(String),

    #[error("release not found for {0}")]
    ReleaseNotFound(String),

    #[error("GitHub API rate limit exceeded for {0}; set GITHUB_TOKEN or try again later")]
    RateLimited(String),

    #[error("could not detect system package manager")]
    NoPackageManager,

    #[error(
        "no {package_type} packages found for {arch}. Available types: {}",
        join_types(.available)
    )]
    NoCompatibleArchitecture {
        package_type: PackageType,
        arch: String,
        available: Vec<PackageType>,
    },

    #[error("no compatible {0} assets found")]
    NoCompatibleAsset(PackageType),

    #[error("no binary assets found")]
    NoBinaryAssets,

    #[error("binary {binary} not found in release archive {}", .archive.display())]
    ArchiveBinaryNotFound { binary: String, archive: PathBuf },

    #[error("permission denied ({0}); retry with sudo or install under your home directory with --binary")]
    PermissionDenied(String),

    #[error("no space left on device ({0}); free some disk space and retry")]
    InsufficientSpace(String),

    #[error("`{command}` failed: {status}")]
    CommandFailed { command: String, status: String },

    #[error("homebrew not installed")]
    HomebrewUnavailable,

    #[error("no formula found for {0}")]
    FormulaNotFound(String),

    #[error("repository already tracked: {0}")]
    AlreadyTracked(String),

    #[error("invalid repository URL: {0}")]
    InvalidRepository(String),

    #[error("{strategy} install failed: {source}")]
    Strategy {
        strategy: Strategy,
        #[source]
        source: Box<InstallError>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InstallError>;

fn join_types(types: &[PackageType]) -> String {
    if types.is_empty() {
        return "none".to_string();
    }
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl InstallError {
    /// Attach strategy context. Already-wrapped errors keep their original
    /// strategy.
    pub fn in_strategy(self, strategy: Strategy) -> Self {
        match self {
            InstallError::Strategy { .. } => self,
            other => InstallError::Strategy {
                strategy,
                source: Box::new(other),
            },
        }
    }

    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            InstallError::Strategy { strategy, .. } => Some(*strategy),
            _ => None,
        }
    }

    /// The innermost error, without strategy context.
    pub fn root(&self) -> &InstallError {
        match self {
            InstallError::Strategy { source, .. } => source.root(),
            other => other,
        }
    }

    /// Terminal for the asset it came from; the caller must move on to the
    /// next strategy rather than retry the same archive.
    pub fn is_archive_miss(&self) -> bool {
        matches!(self.root(), InstallError::ArchiveBinaryNotFound { .. })
    }

    /// Rewrite permission and disk-space failures into their actionable
    /// variants, keeping any strategy context.
    pub fn actionable(self) -> Self {
        match self {
            InstallError::Strategy { strategy, source } => InstallError::Strategy {
                strategy,
                source: Box::new(source.actionable()),
            },
            other => match classify(&other) {
                Some(rewritten) => rewritten,
                None => other,
            },
        }
    }

    /// Message shown to the user: the most specific error, rewritten when it
    /// is a permission or disk-space failure.
    pub fn user_message(&self) -> String {
        let root = self.root();
        classify(root)
            .map(|e| e.to_string())
            .unwrap_or_else(|| root.to_string())
    }
}

fn classify(error: &InstallError) -> Option<InstallError> {
    match error {
        InstallError::PermissionDenied(_) | InstallError::InsufficientSpace(_) => None,
        InstallError::Io(io_err) => {
            if io_err.kind() == io::ErrorKind::PermissionDenied {
                return Some(InstallError::PermissionDenied(io_err.to_string()));
            }
            if io_err.raw_os_error() == Some(ENOSPC) {
                return Some(InstallError::InsufficientSpace(io_err.to_string()));
            }
            classify_text(&io_err.to_string())
        }
        other => classify_text(&other.to_string()),
    }
}

fn classify_text(text: &str) -> Option<InstallError> {
    let lower = text.to_lowercase();
    if lower.contains("permission denied") {
        Some(InstallError::PermissionDenied(text.to_string()))
    } else if lower.contains("no space left") {
        Some(InstallError::InsufficientSpace(text.to_string()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_context_is_not_doubled() {
        let err = InstallError::NoBinaryAssets
            .in_strategy(Strategy::Binary)
            .in_strategy(Strategy::Package);
        assert_eq!(err.strategy(), Some(Strategy::Binary));
        assert!(matches!(err.root(), InstallError::NoBinaryAssets));
        assert_eq!(err.to_string(), "binary install failed: no binary assets found");
    }

    #[test]
    fn test_permission_denied_is_rewritten() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "open /usr/local/bin/app");
        let err = InstallError::from(io_err)
            .in_strategy(Strategy::Binary)
            .actionable();
        assert_eq!(err.strategy(), Some(Strategy::Binary));
        assert!(matches!(err.root(), InstallError::PermissionDenied(_)));
        assert!(err.user_message().contains("--binary"));
    }

    #[test]
    fn test_disk_full_is_rewritten_from_text() {
        let err = InstallError::CommandFailed {
            command: "sudo cp app /usr/local/bin/app".to_string(),
            status: "cp: error writing: No space left on device".to_string(),
        };
        assert!(matches!(
            err.actionable(),
            InstallError::InsufficientSpace(_)
        ));
    }

    #[test]
    fn test_incompatible_architecture_lists_seen_types() {
        let err = InstallError::NoCompatibleArchitecture {
            package_type: PackageType::Deb,
            arch: "arm64".to_string(),
            available: vec![PackageType::Deb, PackageType::Rpm],
        };
        assert_eq!(
            err.to_string(),
            "no deb packages found for arm64. Available types: deb, rpm"
        );
    }
}
