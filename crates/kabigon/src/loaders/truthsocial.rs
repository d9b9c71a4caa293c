// ABOUTME: Truth Social loader: accepts only truthsocial.com URLs and renders the post in the browser.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::LoadError;
use crate::loader::Loader;
use crate::loaders::browser::{BrowserLoader, WaitUntil};
use crate::options::HttpOptions;
use crate::resource::parse_http_url;

pub const TRUTHSOCIAL_HOSTS: &[&str] = &["truthsocial.com", "www.truthsocial.com"];

/// Posts load slowly; the browser gets this long unless told otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub fn check_truthsocial_url(url: &str) -> Result<Url, LoadError> {
    let parsed = parse_http_url(url)?;
    let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
    if !TRUTHSOCIAL_HOSTS.contains(&host.as_str()) {
        return Err(LoadError::not_applicable(url, "Not a Truth Social URL"));
    }
    Ok(parsed)
}

/// Renders Truth Social posts through a headless browser.
#[derive(Debug, Clone)]
pub struct TruthSocialLoader {
    browser: BrowserLoader,
}

impl Default for TruthSocialLoader {
    fn default() -> Self {
        Self::new(HttpOptions::default())
    }
}

impl TruthSocialLoader {
    pub fn new(opts: HttpOptions) -> Self {
        Self {
            browser: BrowserLoader::new(opts)
                .timeout(DEFAULT_TIMEOUT)
                .wait_until(WaitUntil::NetworkIdle),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.browser = self.browser.timeout(timeout);
        self
    }

    pub fn browser(mut self, browser: BrowserLoader) -> Self {
        self.browser = browser;
        self
    }

    pub fn timeout_value(&self) -> Duration {
        self.browser.timeout_value()
    }
}

#[async_trait]
impl Loader for TruthSocialLoader {
    fn name(&self) -> &str {
        "truthsocial"
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        check_truthsocial_url(url)?;
        self.browser.load(url).await
    }
}
