//! GitHub release metadata source.

use crate::error::{InstallError, Result};
use crate::repo_url::RepoRef;
use crate::types::Release;
use async_trait::async_trait;
use reqwest::StatusCode;

/// Supplies the latest release of a repository.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest_release(&self, repo_url: &str) -> Result<Release>;
}

pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("autonomix/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok()
            .filter(|t| !t.is_empty());
        if token.is_some() {
            tracing::debug!("Using GitHub token from environment");
        }

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Shared HTTP client, also used for asset downloads.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn build_release_url(&self, repo: &RepoRef) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base,
            repo.full_name()
        )
    }
}

#[async_trait]
impl ReleaseSource for GitHubClient {
    async fn latest_release(&self, repo_url: &str) -> Result<Release> {
        let repo = RepoRef::parse(repo_url)?;
        let url = self.build_release_url(&repo);
        tracing::debug!("Fetching GitHub release info from: {}", url);

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| InstallError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let rate_limit_exhausted = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == "0");
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(classify_status(&repo, status, rate_limit_exhausted, &body));
        }

        let release: Release = response
            .json()
            .await
            .map_err(|e| InstallError::Network(format!("invalid release payload: {}", e)))?;
        tracing::debug!(
            "Latest release of {} is {} ({} assets)",
            repo,
            release.tag_name,
            release.assets.len()
        );
        Ok(release)
    }
}

fn classify_status(
    repo: &RepoRef,
    status: StatusCode,
    rate_limit_exhausted: bool,
    body: &str,
) -> InstallError {
    if status == StatusCode::NOT_FOUND {
        return InstallError::ReleaseNotFound(repo.full_name());
    }
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && (rate_limit_exhausted || body.to_lowercase().contains("rate limit")))
    {
        return InstallError::RateLimited(repo.full_name());
    }
    InstallError::Network(format!("GitHub API request failed: {} - {}", status, body))
}
