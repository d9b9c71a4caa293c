// ABOUTME: PTT loader: fetches www.ptt.cc posts past the age gate and keeps the article body.
// ABOUTME: Only the #main-content element is converted to Markdown.

use async_trait::async_trait;

use crate::error::LoadError;
use crate::formats::{html_to_markdown, select_inner_html};
use crate::loader::Loader;
use crate::loaders::http::fetch_page;
use crate::options::HttpOptions;
use crate::resource::parse_http_url;

pub const PTT_HOST: &str = "www.ptt.cc";

const MAIN_CONTENT: &str = "#main-content";
const AGE_GATE_COOKIE: &str = "over18=1";

/// Loads posts from the PTT bulletin board.
#[derive(Debug, Clone)]
pub struct PttLoader {
    opts: HttpOptions,
    host: String,
}

impl Default for PttLoader {
    fn default() -> Self {
        Self::new(HttpOptions::default())
    }
}

impl PttLoader {
    pub fn new(opts: HttpOptions) -> Self {
        Self {
            opts: opts.header("Cookie", AGE_GATE_COOKIE),
            host: PTT_HOST.to_string(),
        }
    }

    /// Accept another host as PTT.
    #[cfg(test)]
    fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    fn check_url(&self, url: &str) -> Result<(), LoadError> {
        let parsed = parse_http_url(url)?;
        if parsed.host_str() != Some(self.host.as_str()) {
            return Err(LoadError::not_applicable(url, "URL is not a PTT URL"));
        }
        Ok(())
    }
}

#[async_trait]
impl Loader for PttLoader {
    fn name(&self) -> &str {
        "ptt"
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        self.check_url(url)?;
        let html = fetch_page(&self.opts, url).await?.text();
        let body = select_inner_html(&html, MAIN_CONTENT)
            .ok_or_else(|| LoadError::content(url, "post content not found", None))?;
        Ok(html_to_markdown(&body))
    }
}
