//! JSON-over-HTTP client shared by the remote adapters.
//!
//! Wraps reqwest with:
//! - A base URL and percent-encoded path segments
//! - A default request timeout and user agent
//! - Status mapping: 404 on GET → `None`, other failures → `RemoteStatus`

use crate::config::NetworkConfig;
use crate::error::{Result, ScoretagError};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP client bound to one service.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    service: String,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(service: impl Into<String>, base_url: &str) -> Result<Self> {
        Self::with_timeout(service, base_url, NetworkConfig::REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        service: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ScoretagError::Config {
            message: format!("Invalid base URL '{}': {}", base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ScoretagError::Config {
                message: format!("Base URL '{}' cannot carry a path", base_url),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| ScoretagError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            base_url,
            service: service.into(),
            timeout,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded.
    pub fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| ScoretagError::Config {
                message: format!("Base URL '{}' cannot carry a path", self.base_url),
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// GET a JSON resource; `Ok(None)` on 404.
    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>> {
        let response = self.send(Method::GET, segments, None::<&()>).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.check(response).await?;
        self.decode(response).await.map(Some)
    }

    /// POST a JSON body and decode the JSON answer.
    pub async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, segments, Some(body)).await?;
        let response = self.check(response).await?;
        self.decode(response).await
    }

    /// PUT a JSON body and decode the JSON answer.
    pub async fn put_json<B, T>(&self, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.send(Method::PUT, segments, Some(body)).await?;
        let response = self.check(response).await?;
        self.decode(response).await
    }

    async fn send<B>(&self, method: Method, segments: &[&str], body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(segments)?;
        debug!("{} {} ({})", method, url, self.service);
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                ScoretagError::Timeout(self.timeout)
            } else {
                ScoretagError::Network {
                    message: format!("{} {} failed: {}", method, url, e),
                    source: Some(e),
                }
            }
        })
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ScoretagError::Timeout(self.timeout)
            } else {
                ScoretagError::from(e)
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ScoretagError::Json {
            message: format!("Invalid {} response: {}", self.service, e),
            source: Some(e),
        })
    }

    /// Map non-success statuses to errors.
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        Err(ScoretagError::RemoteStatus {
            service: self.service.clone(),
            status: status.as_u16(),
            message,
        })
    }
}
