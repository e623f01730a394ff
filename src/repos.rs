use reqwest::header::ACCEPT;
use thiserror::Error;
use tracing::debug;

use crate::config::GithubConfig;
use crate::models::{RepositoryList, RepositorySummary};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum RepoFetchError {
    #[error("repository request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fetches the public repositories of one GitHub account. One request per
/// call: no retries, no caching.
#[derive(Debug, Clone)]
pub struct RepoClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RepoClient {
    /// `Ok(None)` when no account is configured.
    pub fn from_config(config: &GithubConfig) -> Result<Option<Self>, RepoFetchError> {
        if config.user.trim().is_empty() {
            return Ok(None);
        }
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Some(Self::new(
            http,
            repos_endpoint(&config.api_base, config.user.trim()),
        )))
    }

    pub fn new(http: reqwest::Client, endpoint: String) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn fetch(&self) -> Result<RepositoryList, RepoFetchError> {
        let repos: Vec<RepositorySummary> = self
            .http
            .get(&self.endpoint)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(count = repos.len(), endpoint = %self.endpoint, "fetched repositories");
        Ok(RepositoryList { repos })
    }
}

pub fn repos_endpoint(api_base: &str, user: &str) -> String {
    format!("{}/users/{}/repos?sort=updated", api_base.trim_end_matches('/'), user)
}
