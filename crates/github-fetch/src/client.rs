//! GitHub contents client
//!
//! Resolves `<owner>/<repo>` plus a path inside the repository to raw file
//! content through the contents API.

use async_trait::async_trait;
use source_store::{RemoteFetcher, StoreResult};
use tracing::{debug, instrument, warn};

use crate::config::GithubConfig;
use crate::error::FetchError;
use crate::Result;

const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// Remote fetcher backed by the GitHub contents API
pub struct GithubFetcher {
    config: GithubConfig,
    http_client: reqwest::Client,
}

impl GithubFetcher {
    /// Create a new fetcher
    pub fn new(config: GithubConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(GithubFetcher {
            config,
            http_client,
        })
    }

    /// Create fetcher from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GithubConfig::from_env())
    }

    /// Contents API URL for a file inside `owner_repo`.
    pub fn contents_url(&self, owner_repo: &str, rest_path: &str) -> Result<String> {
        let mut parts = owner_repo.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                Ok(format!(
                    "{}/repos/{}/{}/contents/{}",
                    self.config.api_url,
                    owner,
                    repo,
                    rest_path.trim_start_matches('/')
                ))
            }
            _ => Err(FetchError::InvalidRepo(owner_repo.to_string())),
        }
    }

    /// Fetch raw file content
    #[instrument(skip(self))]
    pub async fn fetch_raw(&self, owner_repo: &str, rest_path: &str) -> Result<String> {
        let url = self.contents_url(owner_repo, rest_path)?;

        let mut request = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, RAW_MEDIA_TYPE);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "GitHub fetch failed");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        debug!(url = %url, bytes = body.len(), "fetched remote source");
        Ok(body)
    }
}

#[async_trait]
impl RemoteFetcher for GithubFetcher {
    async fn fetch(&self, owner_repo: &str, rest_path: &str) -> StoreResult<String> {
        Ok(self.fetch_raw(owner_repo, rest_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> GithubFetcher {
        GithubFetcher::new(GithubConfig::new("https://api.github.com")).unwrap()
    }

    #[test]
    fn test_contents_url() {
        let url = fetcher()
            .contents_url("acme/lib", "contracts/Utils.sol")
            .unwrap();
        assert_eq!(
            url,
            "https://api.github.com/repos/acme/lib/contents/contracts/Utils.sol"
        );
    }

    #[test]
    fn test_contents_url_rejects_bad_repo() {
        let f = fetcher();
        assert!(matches!(
            f.contents_url("acme", "A.sol"),
            Err(FetchError::InvalidRepo(_))
        ));
        assert!(matches!(
            f.contents_url("acme/lib/extra", "A.sol"),
            Err(FetchError::InvalidRepo(_))
        ));
        assert!(matches!(
            f.contents_url("/lib", "A.sol"),
            Err(FetchError::InvalidRepo(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_repo_fails_before_network() {
        let err = fetcher().fetch("not-a-repo", "A.sol").await.unwrap_err();
        assert!(err.to_string().contains("not-a-repo"));
    }
}
