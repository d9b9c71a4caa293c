// ABOUTME: Reddit loader: rewrites reddit.com links to old.reddit.com and converts the thread to Markdown.
// ABOUTME: The old interface renders posts and comments server-side, so no browser is needed.

use async_trait::async_trait;
use url::Url;

use crate::error::LoadError;
use crate::formats::html_to_markdown;
use crate::loader::Loader;
use crate::loaders::http::fetch_page;
use crate::options::HttpOptions;
use crate::resource::parse_http_url;

pub const REDDIT_HOSTS: &[&str] = &[
    "reddit.com",
    "www.reddit.com",
    "old.reddit.com",
    "new.reddit.com",
    "np.reddit.com",
];

const OLD_REDDIT_HOST: &str = "old.reddit.com";

/// Rewrite a Reddit URL onto old.reddit.com, keeping path and query.
pub fn to_old_reddit_url(url: &str) -> Result<Url, LoadError> {
    let mut parsed = parse_http_url(url)?;
    let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
    if !REDDIT_HOSTS.contains(&host.as_str()) {
        return Err(LoadError::not_applicable(url, "URL is not a Reddit URL"));
    }
    parsed
        .set_host(Some(OLD_REDDIT_HOST))
        .map_err(|e| LoadError::not_applicable(url, format!("invalid URL: {}", e)))?;
    parsed
        .set_scheme("https")
        .map_err(|_| LoadError::not_applicable(url, "invalid URL scheme"))?;
    Ok(parsed)
}

/// Loads Reddit posts and their comments.
#[derive(Debug, Clone, Default)]
pub struct RedditLoader {
    opts: HttpOptions,
    base_override: Option<String>,
}

impl RedditLoader {
    pub fn new(opts: HttpOptions) -> Self {
        Self {
            opts,
            base_override: None,
        }
    }

    /// Serve the rewritten URL from another origin.
    #[cfg(test)]
    fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base_override = Some(base.into());
        self
    }

    fn target(&self, url: &str) -> Result<String, LoadError> {
        let old = to_old_reddit_url(url)?;
        Ok(match self.base_override {
            Some(ref base) => {
                let query = old.query().map(|q| format!("?{}", q)).unwrap_or_default();
                format!("{}{}{}", base.trim_end_matches('/'), old.path(), query)
            }
            None => old.to_string(),
        })
    }
}

#[async_trait]
impl Loader for RedditLoader {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        let target = self.target(url)?;
        let page = fetch_page(&self.opts, &target).await?;
        Ok(html_to_markdown(&page.text()))
    }
}
