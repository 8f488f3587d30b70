//! Release metadata source: the GitHub REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use installer_schema::Release;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Default upstream API base.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Failure modes of a [`ReleaseSource`].
#[derive(Error, Debug)]
pub enum FetchError {
    /// The repository, release or tag does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Any other non-2xx status, network failure or undecodable body.
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A remote source of release metadata.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch `owner/repo` at `tag`, or the latest release when `tag` is `None`.
    async fn fetch_release(
        &self,
        owner: &str,
        repo: &str,
        tag: Option<&str>,
    ) -> Result<Release, FetchError>;

    /// Find the owner of the best known repository named `program`.
    async fn find_owner(&self, _program: &str) -> Result<Option<String>, FetchError> {
        Ok(None)
    }
}

/// [`ReleaseSource`] backed by `api.github.com` (or a compatible base URL).
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    client: Client,
    api_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct SearchResults {
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    name: String,
    owner: SearchOwner,
}

#[derive(Deserialize)]
struct SearchOwner {
    login: String,
}

impl GitHubReleases {
    /// Build a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(api_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, FetchError> {
        debug!(url, "upstream request");
        let mut req = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/vnd.github.v3+json");
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(token) = &self.token {
            req = req.header(header::AUTHORIZATION, format!("token {token}"));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(format!("url {url}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Transport(format!("{status} {}", body.trim())));
        }

        resp.json::<T>()
            .await
            .map_err(|e| FetchError::Transport(format!("download failed: {url}: {e}")))
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    async fn fetch_release(
        &self,
        owner: &str,
        repo: &str,
        tag: Option<&str>,
    ) -> Result<Release, FetchError> {
        let url = match tag {
            Some(tag) => format!("{}/repos/{owner}/{repo}/releases/tags/{tag}", self.api_url),
            None => format!("{}/repos/{owner}/{repo}/releases/latest", self.api_url),
        };
        self.get(&url, &[]).await
    }

    async fn find_owner(&self, program: &str) -> Result<Option<String>, FetchError> {
        let url = format!("{}/search/repositories", self.api_url);
        let q = format!("{program} in:name");
        let results: SearchResults = self
            .get(&url, &[("q", q.as_str()), ("sort", "stars"), ("per_page", "10")])
            .await?;
        Ok(results
            .items
            .into_iter()
            .find(|item| item.name.eq_ignore_ascii_case(program))
            .map(|item| item.owner.login))
    }
}
