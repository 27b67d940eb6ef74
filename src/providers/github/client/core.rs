use std::time::Duration;

use chrono::Utc;
use graphql_client::QueryBody;
use log::{debug, info, warn};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::Token;
use crate::error::{PrLensError, Result};

/// Extra wait on top of the advertised rate-limit reset.
const RATE_LIMIT_BUFFER_SECS: i64 = 5;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Base delay, doubled on every retry.
    pub backoff: Duration,
    /// Wait used when a rate-limit response carries no reset header.
    pub rate_limit_fallback: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff: Duration::from_secs(2),
            rate_limit_fallback: Duration::from_secs(60),
        }
    }
}

/// Cursor pagination block shared by every connection GitHub returns.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

pub struct GitHubClient {
    pub client: Client,
    pub api_url: Url,
    pub graphql_url: Url,
    pub token: Option<Token>,
    pub config: ClientConfig,
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<Token>, config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("prlens/0.1.0")
            .timeout(config.timeout)
            .build()
            .map_err(|e| PrLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut api_url = Url::parse(base_url)
            .map_err(|e| PrLensError::Config(format!("Invalid base URL: {e}")))?;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        let graphql_url = api_url
            .join("graphql")
            .map_err(|e| PrLensError::Config(format!("Invalid GraphQL URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            graphql_url,
            token,
            config,
        })
    }

    pub fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    pub fn rest_url(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| PrLensError::Config(format!("Invalid REST URL '{path}': {e}")))
    }

    /// GET a REST resource, retrying transient failures.
    pub async fn rest_get<D: DeserializeOwned>(&self, path: &str) -> Result<D> {
        let url = self.rest_url(path)?;
        let response = self.send_with_retry(|| self.client.get(url.clone())).await?;
        Ok(response.json::<D>().await?)
    }

    /// POST a GraphQL query and return its `data`.
    ///
    /// GraphQL errors fail the call, except rate-limit errors which are
    /// waited out and retried like HTTP rate limits.
    pub async fn graphql_query<V, D>(
        &self,
        query: &'static str,
        operation_name: &'static str,
        variables: V,
    ) -> Result<D>
    where
        V: Serialize,
        D: DeserializeOwned,
    {
        let body = QueryBody {
            variables,
            query,
            operation_name,
        };

        let mut attempt = 0;
        loop {
            let response = self
                .send_with_retry(|| self.client.post(self.graphql_url.clone()).json(&body))
                .await?;
            let headers = response.headers().clone();
            let response_body: graphql_client::Response<D> = response.json().await?;

            if let Some(errors) = response_body.errors.filter(|e| !e.is_empty()) {
                let joined_errors = errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");

                if mentions_rate_limit(&joined_errors) && attempt < self.config.max_retries {
                    let wait = rate_limit_wait(&headers, self.config.rate_limit_fallback);
                    warn!("{operation_name} rate limited, waiting {}s", wait.as_secs());
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                    continue;
                }

                return Err(PrLensError::Api(format!("GraphQL errors: {joined_errors}")));
            }

            return response_body.data.ok_or_else(|| {
                PrLensError::Api(format!("GraphQL response to {operation_name} contained no data"))
            });
        }
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = PrLensError::Api("request was never sent".to_string());

        for attempt in 0..=self.config.max_retries {
            match self.auth_request(build()).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    let url = response.url().clone();
                    let body = response.text().await.unwrap_or_default();

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(PrLensError::Unauthorized(format!(
                            "{url} returned {status}; check the GitHub token"
                        )));
                    }

                    if is_rate_limited(status, &body) {
                        let error = PrLensError::Api(format!("{url} rate limited: {body}"));
                        if attempt == self.config.max_retries {
                            return Err(error);
                        }
                        let wait = rate_limit_wait(&headers, self.config.rate_limit_fallback);
                        warn!("Rate limit exceeded, waiting {}s", wait.as_secs());
                        tokio::time::sleep(wait).await;
                        last_error = error;
                        continue;
                    }

                    let error = PrLensError::Api(format!("{url} returned {status}: {body}"));
                    if status.is_client_error() {
                        return Err(error);
                    }
                    last_error = error;
                }
                Err(e) => {
                    debug!("Request error: {e}");
                    last_error = PrLensError::Network(e);
                }
            }

            if attempt < self.config.max_retries {
                let wait = self.config.backoff * 2u32.saturating_pow(attempt);
                info!(
                    "Retrying in {}s... (attempt {}/{})",
                    wait.as_secs(),
                    attempt + 1,
                    self.config.max_retries
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(last_error)
    }
}

fn mentions_rate_limit(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("rate limit") || lower.contains("rate_limit")
}

fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && mentions_rate_limit(body))
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// How long to wait before retrying a rate-limited request.
///
/// Prefers `x-ratelimit-reset` (epoch seconds), then `retry-after`.
#[allow(clippy::cast_sign_loss)]
fn rate_limit_wait(headers: &HeaderMap, fallback: Duration) -> Duration {
    if let Some(reset) = header_i64(headers, "x-ratelimit-reset") {
        let secs = (reset - Utc::now().timestamp()).max(0) + RATE_LIMIT_BUFFER_SECS;
        return Duration::from_secs(secs as u64);
    }

    header_i64(headers, "retry-after")
        .filter(|secs| *secs >= 0)
        .map_or(fallback, |secs| Duration::from_secs(secs as u64))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::time::Instant;

    pub fn test_config() -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff: Duration::ZERO,
            rate_limit_fallback: Duration::ZERO,
        }
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = GitHubClient::new("https://ghe.example.com/api/v3", None, test_config()).unwrap();

        assert_eq!(client.api_url.as_str(), "https://ghe.example.com/api/v3/");
        assert_eq!(client.graphql_url.as_str(), "https://ghe.example.com/api/v3/graphql");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let result = GitHubClient::new("not a url", None, test_config());

        assert!(matches!(result, Err(PrLensError::Config(_))));
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(StatusCode::FORBIDDEN, "API rate limit exceeded for user"));
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, "Resource not accessible"));
        assert!(mentions_rate_limit("RATE_LIMITED: slow down"));
    }

    #[test]
    fn test_rate_limit_wait_uses_reset_header() {
        let mut headers = HeaderMap::new();
        let reset = Utc::now().timestamp() + 30;
        headers.insert("x-ratelimit-reset", HeaderValue::from(reset));

        let wait = rate_limit_wait(&headers, Duration::from_secs(60));

        assert!(wait.as_secs() >= 33 && wait.as_secs() <= 35);
    }

    #[test]
    fn test_rate_limit_wait_past_reset_waits_buffer_only() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-reset", HeaderValue::from(0_i64));

        assert_eq!(rate_limit_wait(&headers, Duration::from_secs(60)).as_secs(), 5);
    }

    #[test]
    fn test_rate_limit_wait_falls_back() {
        let mut headers = HeaderMap::new();
        assert_eq!(rate_limit_wait(&headers, Duration::from_secs(60)).as_secs(), 60);

        headers.insert("retry-after", HeaderValue::from_static("7"));
        assert_eq!(rate_limit_wait(&headers, Duration::from_secs(60)).as_secs(), 7);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/orgs/acme/memberships/alice")
            .with_status(401)
            .with_body(r#"{"message":"Bad credentials"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url(), Some(Token::from("bad")), test_config()).unwrap();
        let result: Result<serde_json::Value> = client.rest_get("orgs/acme/memberships/alice").await;

        assert!(matches!(result, Err(PrLensError::Unauthorized(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/orgs/acme/memberships/alice")
            .with_status(502)
            .expect(3)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();
        let result: Result<serde_json::Value> = client.rest_get("orgs/acme/memberships/alice").await;

        assert!(matches!(result, Err(PrLensError::Api(msg)) if msg.contains("502")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_graphql_errors_fail_the_call() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":null,"errors":[{"message":"Could not resolve to a User"}]}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();
        let result: Result<serde_json::Value> = client
            .graphql_query("query Q { viewer { login } }", "Q", serde_json::json!({}))
            .await;

        assert!(matches!(result, Err(PrLensError::Api(msg)) if msg.contains("Could not resolve")));
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("GET", "/orgs/acme/memberships/alice")
            .with_status(429)
            .with_body(r#"{"message":"API rate limit exceeded"}"#)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/orgs/acme/memberships/alice")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"state":"active"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();
        let result: serde_json::Value = client.rest_get("orgs/acme/memberships/alice").await.unwrap();

        assert_eq!(result["state"], "active");
        limited.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_on_last_attempt_fails_without_waiting() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/orgs/acme/memberships/alice")
            .with_status(429)
            .with_header("retry-after", "30")
            .expect(1)
            .create_async()
            .await;

        let config = ClientConfig {
            max_retries: 0,
            ..test_config()
        };
        let client = GitHubClient::new(&server.url(), None, config).unwrap();

        let started = Instant::now();
        let result: Result<serde_json::Value> = client.rest_get("orgs/acme/memberships/alice").await;

        assert!(matches!(result, Err(PrLensError::Api(msg)) if msg.contains("rate limited")));
        assert!(started.elapsed() < Duration::from_secs(5));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_graphql_rate_limit_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":null,"errors":[{"message":"API rate limit exceeded","type":"RATE_LIMITED"}]}"#)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"viewer":{"login":"alice"}}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();
        let result: serde_json::Value = client
            .graphql_query("query Q { viewer { login } }", "Q", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(result["viewer"]["login"], "alice");
        limited.assert_async().await;
        ok.assert_async().await;
    }
}
