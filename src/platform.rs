//! Host description and the keyword vocabulary release maintainers use for it.
//!
//! Every classifier takes a [`HostEnv`] instead of reading process globals, so
//! tests can describe any host without touching the real environment.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DARWIN_KEYWORDS: &[&str] = &["darwin", "macos", "osx"];
const LINUX_KEYWORDS: &[&str] = &["linux"];
const AMD64_KEYWORDS: &[&str] = &["amd64", "x86_64", "x64"];
const ARM64_KEYWORDS: &[&str] = &["arm64", "aarch64", "armv8"];

/// Tokens that satisfy the architecture check on any host.
pub const UNIVERSAL_KEYWORDS: &[&str] = &["all", "noarch", "any"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    MacOs,
    Other(String),
}

impl HostOs {
    pub fn from_consts(os: &str) -> Self {
        match os {
            "linux" => HostOs::Linux,
            "macos" => HostOs::MacOs,
            other => HostOs::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostArch {
    Amd64,
    Arm64,
    Other(String),
}

impl HostArch {
    pub fn from_consts(arch: &str) -> Self {
        match arch {
            "x86_64" => HostArch::Amd64,
            "aarch64" => HostArch::Arm64,
            other => HostArch::Other(other.to_string()),
        }
    }

    /// Short name used in user-facing messages.
    pub fn label(&self) -> &str {
        match self {
            HostArch::Amd64 => "amd64",
            HostArch::Arm64 => "arm64",
            HostArch::Other(name) => name,
        }
    }
}

/// Snapshot of everything the engine needs to know about the running host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnv {
    pub os: HostOs,
    pub arch: HostArch,
    pub home: Option<PathBuf>,
    pub path_dirs: Vec<PathBuf>,
    pub os_release_id: Option<String>,
}

impl HostEnv {
    pub fn detect() -> Self {
        let path_dirs = env::var_os("PATH")
            .map(|p| env::split_paths(&p).collect())
            .unwrap_or_default();

        let env = HostEnv {
            os: HostOs::from_consts(env::consts::OS),
            arch: HostArch::from_consts(env::consts::ARCH),
            home: dirs::home_dir(),
            path_dirs,
            os_release_id: read_os_release_id(Path::new("/etc/os-release")),
        };
        tracing::debug!(
            "Host: os={:?} arch={:?} os_release_id={:?}",
            env.os,
            env.arch,
            env.os_release_id
        );
        env
    }

    pub fn is_macos(&self) -> bool {
        self.os == HostOs::MacOs
    }

    /// Exact segment match against the `PATH` entries.
    pub fn is_on_path(&self, dir: &Path) -> bool {
        self.path_dirs.iter().any(|p| p == dir)
    }

    /// First `PATH` entry holding a regular file called `name`.
    pub fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.path_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    pub fn classifier(&self) -> PlatformClassifier {
        PlatformClassifier::for_host(&self.os, &self.arch)
    }
}

/// Reads the `ID=` line of an os-release file.
pub fn read_os_release_id(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    parse_os_release_id(&content)
}

fn parse_os_release_id(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("ID=")?;
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if value.is_empty() {
            None
        } else {
            Some(value.to_lowercase())
        }
    })
}

/// Matches asset names against the host's OS and architecture aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformClassifier {
    os_keywords: &'static [&'static str],
    arch_keywords: &'static [&'static str],
}

impl PlatformClassifier {
    pub fn for_host(os: &HostOs, arch: &HostArch) -> Self {
        let os_keywords = match os {
            HostOs::MacOs => DARWIN_KEYWORDS,
            HostOs::Linux => LINUX_KEYWORDS,
            HostOs::Other(_) => &[],
        };
        let arch_keywords = match arch {
            HostArch::Amd64 => AMD64_KEYWORDS,
            HostArch::Arm64 => ARM64_KEYWORDS,
            HostArch::Other(_) => &[],
        };
        Self {
            os_keywords,
            arch_keywords,
        }
    }

    /// Every alias this host answers to, universal tokens included.
    pub fn keywords(&self) -> BTreeSet<&'static str> {
        self.os_keywords
            .iter()
            .chain(self.arch_keywords.iter())
            .chain(UNIVERSAL_KEYWORDS.iter())
            .copied()
            .collect()
    }

    pub fn matches_os(&self, asset_name: &str) -> bool {
        let name = asset_name.to_lowercase();
        self.os_keywords.iter().any(|kw| name.contains(kw))
    }

    /// Architecture alias or universal token. An unsupported OS matches
    /// nothing at all.
    pub fn matches_arch(&self, asset_name: &str) -> bool {
        if self.os_keywords.is_empty() {
            return false;
        }
        let name = asset_name.to_lowercase();
        self.arch_keywords
            .iter()
            .chain(UNIVERSAL_KEYWORDS.iter())
            .any(|kw| name.contains(kw))
    }

    pub fn matches_platform(&self, asset_name: &str) -> bool {
        let matched = self.matches_os(asset_name) && self.matches_arch(asset_name);
        tracing::trace!("Asset '{}': platform_match={}", asset_name, matched);
        matched
    }
}
