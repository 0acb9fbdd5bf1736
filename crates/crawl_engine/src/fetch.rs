use std::time::Duration;

use crawl_core::NormalizedUrl;
use crawl_logging::crawl_warn;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use url::Url;

use crate::decode::decode_html;
use crate::rate_limit::RateLimiter;
use crate::{FailureKind, FetchError};

/// How long the fetcher waits before handing the page back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitStrategy {
    /// Wait until the page and its resources have fully loaded.
    FullLoad,
    /// Return as soon as the document content is available.
    ContentLoaded,
}

/// Markup returned by a [`Fetcher`], already decoded to UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Address the page was served from after redirects; links resolve
    /// against it.
    pub final_url: Url,
    pub html: String,
    pub content_type: Option<String>,
}

impl RawPage {
    pub fn new(final_url: Url, html: impl Into<String>) -> Self {
        Self {
            final_url,
            html: html.into(),
            content_type: Some("text/html".to_string()),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &NormalizedUrl,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<RawPage, FetchError>;

    /// Opaque description of rendering settings (viewport, blocked
    /// resources, user agent), logged at run start.
    fn describe(&self) -> String {
        "unspecified fetcher".to_string()
    }
}

/// Two-step wait policy: a full-load attempt, then one lighter retry when
/// the first attempt times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub full_load_timeout: Duration,
    pub content_loaded_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            full_load_timeout: Duration::from_secs(30),
            content_loaded_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub result: Result<RawPage, FetchError>,
    pub attempts: u8,
    pub wait: WaitStrategy,
}

/// Run `policy` against `fetcher`. Never returns an error for timeouts: a
/// second timeout is reported as a failed outcome.
///
/// Every attempt, the retry included, first claims a slot from `limiter` for
/// the URL's domain. Time spent waiting for the slot is not part of the
/// attempt's timeout budget.
pub async fn fetch_with_policy(
    fetcher: &dyn Fetcher,
    url: &NormalizedUrl,
    policy: FetchPolicy,
    limiter: &RateLimiter,
) -> FetchOutcome {
    limiter.acquire(url.domain()).await;
    let first = bounded_fetch(fetcher, url, WaitStrategy::FullLoad, policy.full_load_timeout).await;
    match first {
        Err(err) if err.is_timeout() => {
            crawl_warn!(
                "full-load wait timed out for {} ({}), retrying with content-loaded wait",
                url,
                err.message
            );
            limiter.acquire(url.domain()).await;
            let second = bounded_fetch(
                fetcher,
                url,
                WaitStrategy::ContentLoaded,
                policy.content_loaded_timeout,
            )
            .await;
            FetchOutcome {
                result: second,
                attempts: 2,
                wait: WaitStrategy::ContentLoaded,
            }
        }
        result => FetchOutcome {
            result,
            attempts: 1,
            wait: WaitStrategy::FullLoad,
        },
    }
}

// Fetchers are asked to honour the timeout; this enforces it if they don't.
async fn bounded_fetch(
    fetcher: &dyn Fetcher,
    url: &NormalizedUrl,
    wait: WaitStrategy,
    budget: Duration,
) -> Result<RawPage, FetchError> {
    match tokio::time::timeout(budget, fetcher.fetch(url, wait, budget)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::new(
            FailureKind::Timeout,
            format!("{wait:?} wait exceeded {}ms", budget.as_millis()),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: "DocCrawler/0.1 (documentation crawler)".to_string(),
        }
    }
}

/// Plain HTTP fetcher. No scripts run, so both wait strategies issue the
/// same GET and differ only in their timeout budget.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = Self::build_client(&settings)?;
        Ok(Self { settings, client })
    }

    fn build_client(settings: &FetchSettings) -> Result<reqwest::Client, FetchError> {
        let redirect_limit = settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &NormalizedUrl,
        _wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<RawPage, FetchError> {
        let response = self
            .client
            .get(url.as_url().clone())
            .header(USER_AGENT, self.settings.user_agent.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let decoded = decode_html(&bytes, content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;

        Ok(RawPage {
            final_url,
            html: decoded.html,
            content_type,
        })
    }

    fn describe(&self) -> String {
        format!(
            "http get (user agent {:?}, redirect limit {}, max {} bytes, no script execution, no resource loading)",
            self.settings.user_agent, self.settings.redirect_limit, self.settings.max_bytes
        )
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
