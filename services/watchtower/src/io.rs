//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;

/// Per-request timeout, matching the platform's slowest healthy responses.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Transport retry policy: attempts on connect/timeout errors and on
/// gateway errors from the platform's reverse proxy.
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(600);
const RETRYABLE_STATUS: [u16; 3] = [502, 503, 504];

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        self.status == 200
    }
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request, optionally with a bearer token
    async fn get(&self, url: &str, bearer: Option<&str>) -> crate::Result<HttpResponse>;

    /// Send a POST request with form-encoded body
    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> crate::Result<HttpResponse>;

    /// Send a POST request with a JSON body, optionally with a bearer token
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client initialization");
        Self { client }
    }

    /// Send a request, retrying on connect/timeout failures and on
    /// 502/503/504 with exponential backoff.
    async fn execute(
        &self,
        what: &str,
        request: reqwest::RequestBuilder,
    ) -> crate::Result<HttpResponse> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let req = request.try_clone().ok_or_else(|| {
                crate::WatchtowerError::Http(format!("{} failed: request not cloneable", what))
            })?;

            match req.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if RETRYABLE_STATUS.contains(&status) && attempt < RETRY_ATTEMPTS {
                        tracing::debug!(
                            "{} -> {} (attempt {}), retrying in {:?}",
                            what,
                            status,
                            attempt,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                        continue;
                    }
                    let body = response.text().await.map_err(|e| {
                        crate::WatchtowerError::Http(format!("Reading response body: {}", e))
                    })?;
                    tracing::debug!("{} -> {} ({} bytes)", what, status, body.len());
                    return Ok(HttpResponse { status, body });
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < RETRY_ATTEMPTS => {
                    tracing::debug!(
                        "{} failed: {} (attempt {}), retrying in {:?}",
                        what,
                        e,
                        attempt,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    return Err(crate::WatchtowerError::Http(format!(
                        "{} failed: {}",
                        what, e
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, bearer: Option<&str>) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {}", url);
        let mut request = self.client.get(url).header("accept", "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.execute(&format!("GET {}", url), request).await
    }

    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> crate::Result<HttpResponse> {
        tracing::debug!("POST {}", url);
        let request = self
            .client
            .post(url)
            .header("accept", "application/json")
            .form(params);
        self.execute(&format!("POST {}", url), request).await
    }

    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> crate::Result<HttpResponse> {
        tracing::debug!("POST {}", url);
        let mut request = self.client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.execute(&format!("POST {}", url), request).await
    }
}
