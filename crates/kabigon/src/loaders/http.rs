// ABOUTME: Plain HTTP loader: fetches a page and converts HTML to Markdown.
// ABOUTME: Text and Markdown bodies are returned as-is.

use async_trait::async_trait;
use tracing::debug;

use crate::error::LoadError;
use crate::formats::html_to_markdown;
use crate::loader::Loader;
use crate::options::HttpOptions;
use crate::resource::{build_client, fetch, FetchOptions, FetchResult};

/// Content types returned verbatim instead of converted.
const VERBATIM_TYPES: &[&str] = &["text/plain", "text/markdown", "json"];

/// Fetch `url` with a client scoped to this call.
pub(crate) async fn fetch_page(opts: &HttpOptions, url: &str) -> Result<FetchResult, LoadError> {
    let client = build_client(opts)?;
    fetch(&client, url, &FetchOptions::from(opts)).await
}

/// Convert a fetched page to text: verbatim for plain types, Markdown for HTML.
pub(crate) fn page_to_text(page: &FetchResult) -> String {
    let body = page.text();
    if page.content_type_contains(VERBATIM_TYPES) {
        body
    } else {
        html_to_markdown(&body)
    }
}

/// Fetches any http(s) URL and converts the response to Markdown.
#[derive(Debug, Clone, Default)]
pub struct HttpLoader {
    opts: HttpOptions,
}

impl HttpLoader {
    pub fn new(opts: HttpOptions) -> Self {
        Self { opts }
    }
}

#[async_trait]
impl Loader for HttpLoader {
    fn name(&self) -> &str {
        "http"
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        let page = fetch_page(&self.opts, url).await?;
        let text = page_to_text(&page);
        debug!(url, chars = text.len(), "converted page");
        Ok(text)
    }
}
