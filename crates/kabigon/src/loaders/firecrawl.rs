// ABOUTME: Firecrawl loader: delegates scraping to the Firecrawl API and returns its Markdown.
// ABOUTME: The API key is read from FIRECRAWL_API_KEY at load time; absence is a configuration error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::loader::Loader;
use crate::resource::{classify_request_error, parse_http_url};

pub const API_KEY_ENV: &str = "FIRECRAWL_API_KEY";
pub const DEFAULT_API_BASE: &str = "https://api.firecrawl.dev";

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
}

/// Scrapes pages through the Firecrawl service.
#[derive(Debug, Clone)]
pub struct FirecrawlLoader {
    api_base: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl Default for FirecrawlLoader {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl FirecrawlLoader {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Use an explicit key instead of the environment variable.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Point at another API host (self-hosted Firecrawl or a test server).
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn resolve_key(&self) -> Result<String, LoadError> {
        pick_key(self.api_key.as_deref(), || std::env::var(API_KEY_ENV).ok())
    }
}

/// An explicit key wins and is never mixed with the environment; a blank
/// key from either source counts as unset.
fn pick_key(
    explicit: Option<&str>,
    from_env: impl FnOnce() -> Option<String>,
) -> Result<String, LoadError> {
    match explicit {
        Some(key) => Some(key.to_string()),
        None => from_env(),
    }
    .filter(|k| !k.trim().is_empty())
    .ok_or_else(|| LoadError::configuration(format!("{} is not set.", API_KEY_ENV)))
}

#[async_trait]
impl Loader for FirecrawlLoader {
    fn name(&self) -> &str {
        "firecrawl"
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        parse_http_url(url)?;
        let key = self.resolve_key()?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(LoadError::unexpected)?;

        let endpoint = format!("{}/v1/scrape", self.api_base.trim_end_matches('/'));
        let body = ScrapeRequest {
            url,
            formats: ["markdown"],
            timeout: Some(self.timeout.as_millis() as u64),
        };

        let response = client
            .post(&endpoint)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_request_error(url, self.timeout, e))?;

        let status = response.status();
        let parsed: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| classify_request_error(url, self.timeout, e))?;

        if !parsed.success {
            let reason = parsed
                .error
                .unwrap_or_else(|| format!("Firecrawl returned HTTP {}", status.as_u16()));
            return Err(LoadError::content(url, reason, None));
        }

        parsed
            .data
            .and_then(|d| d.markdown)
            .ok_or_else(|| LoadError::content(url, "Firecrawl returned no markdown", None))
    }
}
