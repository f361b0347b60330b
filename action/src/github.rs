//! GitHub client for retrieving the diff of a push.
//!
//! The compare endpoint returns the unified diff between two commits when
//! asked for the `application/vnd.github.v3.diff` media type.
//!
//! # Example
//!
//! ```rust,ignore
//! use todoticket_action::github::GithubClient;
//!
//! let client = GithubClient::new("https://api.github.com", "ghp_token")?;
//! let diff = client.fetch_diff("acme/app", "base123", "head456").await?;
//! ```

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, error};

/// Timeout for GitHub API requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Media type selecting the unified diff representation.
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

/// User agent sent with every request; GitHub rejects requests without one.
const CLIENT_USER_AGENT: &str = concat!("todoticket/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur when talking to GitHub.
#[derive(Debug, Error)]
pub enum GithubError {
    /// The request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// GitHub could not be reached.
    #[error("github unavailable: {0}")]
    Unavailable(String),

    /// GitHub answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be read.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client configuration error.
    #[error("client configuration error: {0}")]
    Configuration(String),
}

/// Client for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http_client: Client,
    api_url: String,
    token: String,
}

impl GithubClient {
    /// Creates a new GitHub client.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::Configuration`] if the HTTP client cannot be created.
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, GithubError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GithubError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Fetches the unified diff of `base...head` in `repository` (`owner/repo`).
    ///
    /// # Errors
    ///
    /// - [`GithubError::Timeout`] - The request timed out
    /// - [`GithubError::Unavailable`] - GitHub is unreachable
    /// - [`GithubError::Status`] - GitHub returned a non-success status
    /// - [`GithubError::InvalidResponse`] - The body could not be read
    pub async fn fetch_diff(
        &self,
        repository: &str,
        base: &str,
        head: &str,
    ) -> Result<String, GithubError> {
        let url = format!(
            "{}/repos/{}/compare/{}...{}",
            self.api_url, repository, base, head
        );

        debug!(url = %url, "Fetching diff from GitHub");

        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, DIFF_MEDIA_TYPE)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GithubError::Timeout(REQUEST_TIMEOUT)
                } else if e.is_connect() {
                    GithubError::Unavailable(format!("connection failed: {e}"))
                } else {
                    GithubError::Unavailable(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Failed to get diff");
            return Err(GithubError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let diff = response
            .text()
            .await
            .map_err(|e| GithubError::InvalidResponse(format!("failed to read diff: {e}")))?;

        debug!(bytes = diff.len(), "Fetched diff");

        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DIFF: &str = "diff --git a/a.rs b/a.rs\n@@ -1 +1 @@\n+// TODO x\n";

    fn create_test_client(mock_server: &MockServer) -> GithubClient {
        GithubClient::new(mock_server.uri(), "ghp_test").expect("client")
    }

    #[tokio::test]
    async fn fetch_diff_sends_token_and_media_type() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/app/compare/base1...head2"))
            .and(header("Authorization", "token ghp_test"))
            .and(header("Accept", DIFF_MEDIA_TYPE))
            .respond_with(ResponseTemplate::new(200).set_body_string(DIFF))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let diff = client
            .fetch_diff("acme/app", "base1", "head2")
            .await
            .expect("diff");

        assert_eq!(diff, DIFF);
    }

    #[tokio::test]
    async fn fetch_diff_sends_user_agent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(header("User-Agent", CLIENT_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let diff = client.fetch_diff("acme/app", "a", "b").await.expect("diff");

        assert!(diff.is_empty());
    }

    #[tokio::test]
    async fn fetch_diff_reports_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let err = client.fetch_diff("acme/app", "a", "b").await.unwrap_err();

        assert!(matches!(
            err,
            GithubError::Status { status: 404, ref body } if body == "Not Found"
        ));
    }

    #[tokio::test]
    async fn fetch_diff_unreachable_server() {
        let client = GithubClient::new("http://127.0.0.1:1", "t").expect("client");
        let err = client.fetch_diff("acme/app", "a", "b").await.unwrap_err();

        assert!(matches!(err, GithubError::Unavailable(_)));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = GithubClient::new("https://api.github.com/", "t").expect("client");
        assert_eq!(client.api_url, "https://api.github.com");
    }
}
