// ABOUTME: Twitter/X loader: accepts only twitter.com and x.com post URLs and renders them in the browser.
// ABOUTME: Posts are built client-side, so the page is given time to settle before the DOM is read.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::LoadError;
use crate::loader::Loader;
use crate::loaders::browser::{BrowserLoader, WaitUntil};
use crate::options::HttpOptions;
use crate::resource::parse_http_url;

pub const TWITTER_HOSTS: &[&str] = &[
    "twitter.com",
    "www.twitter.com",
    "mobile.twitter.com",
    "x.com",
    "www.x.com",
    "mobile.x.com",
];

/// Require a Twitter or X host.
pub fn check_twitter_url(url: &str) -> Result<Url, LoadError> {
    let parsed = parse_http_url(url)?;
    let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
    if !TWITTER_HOSTS.contains(&host.as_str()) {
        return Err(LoadError::not_applicable(url, "Not a Twitter/X URL"));
    }
    Ok(parsed)
}

/// Renders Twitter/X posts through a headless browser.
#[derive(Debug, Clone)]
pub struct TwitterLoader {
    browser: BrowserLoader,
}

impl Default for TwitterLoader {
    fn default() -> Self {
        Self::new(HttpOptions::default())
    }
}

impl TwitterLoader {
    pub fn new(opts: HttpOptions) -> Self {
        Self {
            browser: BrowserLoader::new(opts).wait_until(WaitUntil::NetworkIdle),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.browser = self.browser.timeout(timeout);
        self
    }

    /// Replace the browser used for rendering.
    pub fn browser(mut self, browser: BrowserLoader) -> Self {
        self.browser = browser;
        self
    }
}

#[async_trait]
impl Loader for TwitterLoader {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        check_twitter_url(url)?;
        self.browser.load(url).await
    }
}
