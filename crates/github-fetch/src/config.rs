use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default public API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API base URL (GitHub Enterprise installs use their own)
    pub api_url: String,
    /// Personal access token (optional for public repositories)
    pub token: Option<String>,
    /// User-Agent header; GitHub rejects requests without one
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Option<Duration>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok(),
            user_agent: format!("solc-relay-github-fetch/{}", env!("CARGO_PKG_VERSION")),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl GithubConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific API endpoint
    pub fn new(api_url: &str) -> Self {
        GithubConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: None,
            ..Self::default()
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set request timeout; `None` waits indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = GithubConfig::new("https://ghe.example.com/api/v3/");
        assert_eq!(config.api_url, "https://ghe.example.com/api/v3");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_builders() {
        let config = GithubConfig::new(DEFAULT_API_URL)
            .with_token("ghp_test")
            .with_timeout(None);
        assert_eq!(config.token.as_deref(), Some("ghp_test"));
        assert!(config.timeout.is_none());
        assert!(config.user_agent.starts_with("solc-relay-github-fetch/"));
    }
}
