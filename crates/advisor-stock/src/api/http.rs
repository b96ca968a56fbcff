//! Shared HTTP plumbing for upstream clients

use crate::error::{Result, StockError};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const USER_AGENT: &str = concat!("ph-advisor/", env!("CARGO_PKG_VERSION"));

/// reqwest client with a per-source request budget
///
/// "No such resource" answers (204, 404, 410) and empty bodies are `Ok(None)`:
/// the source is up but has nothing for this ticker. Throttling and every
/// other status are errors, so an outage is never mistaken for a miss.
#[derive(Clone)]
pub struct RateLimitedClient {
    source: &'static str,
    client: Client,
    rate_limiter: SharedRateLimiter,
}

impl RateLimitedClient {
    pub fn new(source: &'static str, timeout: Duration, requests_per_minute: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let quota =
            Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            source,
            client,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// GET and decode JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: HeaderMap,
    ) -> Result<Option<T>> {
        let request = self.client.get(url).query(query).headers(headers);
        match self.send(request, url).await? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// GET a text body (HTML pages)
    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<Option<String>> {
        let request = self.client.get(url).query(query);
        self.send(request, url).await
    }

    /// POST a JSON body and decode the JSON answer
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        headers: HeaderMap,
    ) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(url).json(body).headers(headers);
        match self.send(request, url).await? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Option<String>> {
        self.rate_limiter.until_ready().await;

        tracing::debug!(source = self.source, url, "upstream request");
        let response = request.send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => {}
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND | StatusCode::GONE => {
                tracing::debug!(source = self.source, url, %status, "upstream returned no data");
                return Ok(None);
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(StockError::RateLimitExceeded {
                    provider: self.source.to_string(),
                });
            }
            _ => {
                return Err(StockError::ApiError(format!("{} answered HTTP {status}", self.source)));
            }
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(body))
    }
}

impl std::fmt::Debug for RateLimitedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedClient")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
