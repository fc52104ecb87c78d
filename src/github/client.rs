// GitHub API HTTP client.
// Handles authentication, rate limiting, and request/response processing.

use std::sync::{Mutex, MutexGuard};

use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};

use crate::cache::lock::mutex_lock;
use crate::error::{Result, ShoalError};

use super::types::RateLimit;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const SOURCE: &str = "github::client";

/// GitHub API client with authentication and rate limit tracking.
///
/// Methods take `&self` so one client can serve concurrent requests.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    rate_limit: Mutex<RateLimit>,
}

impl GitHubClient {
    /// Create a new GitHub client with the given token.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, GITHUB_API_BASE)
    }

    /// Create a client against a different API host (GitHub Enterprise).
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ShoalError::Other(e.to_string()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("shoal"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(ShoalError::Api)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limit: Mutex::new(RateLimit::default()),
        })
    }

    /// Create a client from a token environment variable.
    pub fn from_env(var: &str, base_url: &str) -> Result<Self> {
        let token = std::env::var(var).map_err(|_| ShoalError::MissingToken(var.to_string()))?;
        Self::with_base_url(&token, base_url)
    }

    /// Get the current rate limit information.
    pub fn rate_limit(&self) -> RateLimit {
        self.lock_rate_limit().clone()
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Make a GET request to the GitHub API.
    pub async fn get(&self, endpoint: &str) -> Result<Response> {
        self.send(self.client.get(self.url(endpoint))).await
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_params<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        params: &T,
    ) -> Result<Response> {
        self.send(self.client.get(self.url(endpoint)).query(params))
            .await
    }

    /// Make a PUT request with a JSON body.
    pub async fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<Response> {
        self.send(self.client.put(self.url(endpoint)).json(body))
            .await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(ShoalError::Api)?;
        self.update_rate_limit(&response);
        self.check_response(response).await
    }

    fn lock_rate_limit(&self) -> MutexGuard<'_, RateLimit> {
        mutex_lock(&self.rate_limit, SOURCE, "rate_limit")
    }

    /// Update rate limit from response headers.
    fn update_rate_limit(&self, response: &Response) {
        let header = |name: &str| -> Option<u64> {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        };

        let mut rate_limit = self.lock_rate_limit();
        if let Some(limit) = header("x-ratelimit-limit") {
            rate_limit.limit = limit;
        }
        if let Some(remaining) = header("x-ratelimit-remaining") {
            rate_limit.remaining = remaining;
        }
        if let Some(reset) = header("x-ratelimit-reset") {
            rate_limit.reset = reset;
        }
    }

    /// Check response status and convert errors.
    async fn check_response(&self, response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(response),
            StatusCode::UNAUTHORIZED => Err(ShoalError::Unauthorized),
            StatusCode::NOT_FOUND => {
                let url = response.url().to_string();
                Err(ShoalError::NotFound(url))
            }
            StatusCode::CONFLICT => Err(ShoalError::Conflict(
                response.text().await.unwrap_or_default(),
            )),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                let (remaining, reset) = {
                    let rate_limit = self.lock_rate_limit();
                    (rate_limit.remaining, rate_limit.reset)
                };
                // Check if rate limited
                if remaining == 0 {
                    let reset_at = chrono::DateTime::from_timestamp(reset as i64, 0)
                        .map(|dt| dt.format("%H:%M:%S").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    Err(ShoalError::RateLimited { reset_at })
                } else {
                    Err(ShoalError::Other(format!(
                        "Forbidden: {}",
                        response.text().await.unwrap_or_default()
                    )))
                }
            }
            status => Err(ShoalError::Other(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let client =
            GitHubClient::with_base_url("token", "https://ghe.example.com/api/v3/").unwrap();
        assert_eq!(
            client.url("/repos/octo/hello"),
            "https://ghe.example.com/api/v3/repos/octo/hello"
        );
    }

    #[test]
    fn test_missing_token_env() {
        let err = GitHubClient::from_env("SHOAL_TEST_TOKEN_THAT_IS_NOT_SET", GITHUB_API_BASE)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ShoalError::MissingToken(ref var) if var == "SHOAL_TEST_TOKEN_THAT_IS_NOT_SET"
        ));
    }

    #[test]
    fn test_rate_limit_starts_empty() {
        let client = GitHubClient::new("token").unwrap();
        assert_eq!(client.rate_limit().remaining, 0);
    }

    #[test]
    fn test_rate_limit_survives_poisoned_lock() {
        let client = GitHubClient::new("token").unwrap();
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let mut rate_limit = client.rate_limit.lock().unwrap();
                    rate_limit.remaining = 7;
                    panic!("holder panicked");
                })
                .join();
        });

        assert!(client.rate_limit.is_poisoned());
        assert_eq!(client.rate_limit().remaining, 7);
    }
}
