use crate::error::{InstallError, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn github_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:https?://)?(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)")
            .expect("static regex is valid")
    })
}

/// A GitHub repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Parse any of:
    /// - "https://github.com/owner/repo"
    /// - "github.com/owner/repo/releases/tag/v1.0"
    /// - "https://github.com/owner/repo.git"
    /// - "owner/repo"
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(InstallError::InvalidRepository(
                "repository URL cannot be empty".to_string(),
            ));
        }

        if let Some(caps) = github_pattern().captures(trimmed) {
            return Ok(Self::from_parts(&caps[1], &caps[2]));
        }

        let parts: Vec<&str> = trimmed.trim_matches('/').split('/').collect();
        if parts.len() == 2
            && !trimmed.contains("://")
            && parts.iter().all(|p| !p.is_empty() && *p != "." && *p != "..")
        {
            return Ok(Self::from_parts(parts[0], parts[1]));
        }

        Err(InstallError::InvalidRepository(trimmed.to_string()))
    }

    fn from_parts(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.trim_end_matches(".git").to_string(),
        }
    }

    /// Canonical URL the store keys records by.
    pub fn url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }

    /// Get: "owner/repo"
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Canonical form of a repository URL. Inputs that are not GitHub URLs are
/// returned trimmed but otherwise untouched.
pub fn normalize_repo_url(url: &str) -> String {
    RepoRef::parse(url)
        .map(|r| r.url())
        .unwrap_or_else(|_| url.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_variants() {
        for input in [
            "https://github.com/owner/tool",
            "http://github.com/owner/tool/",
            "github.com/owner/tool",
            "https://github.com/owner/tool.git",
            "https://github.com/owner/tool/releases/tag/v1.2.3",
            "owner/tool",
        ] {
            assert_eq!(normalize_repo_url(input), "https://github.com/owner/tool", "{}", input);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RepoRef::parse("").is_err());
        assert!(RepoRef::parse("https://gitlab.com/owner/tool").is_err());
        assert!(RepoRef::parse("just-a-name").is_err());
    }

    #[test]
    fn test_full_name() {
        let r = RepoRef::parse("https://github.com/BurntSushi/ripgrep").unwrap();
        assert_eq!(r.full_name(), "BurntSushi/ripgrep");
        assert_eq!(r.to_string(), "BurntSushi/ripgrep");
    }
}
