// ABOUTME: GitHub loader: raw file content for blob URLs, main-content Markdown for other pages.
// ABOUTME: Only github.com and raw.githubusercontent.com URLs are applicable.

use async_trait::async_trait;
use url::Url;

use crate::error::LoadError;
use crate::formats::{extract_main_html, html_to_markdown};
use crate::loader::Loader;
use crate::loaders::http::fetch_page;
use crate::options::HttpOptions;

pub const GITHUB_HOST: &str = "github.com";
pub const RAW_GITHUB_HOST: &str = "raw.githubusercontent.com";

const RAW_ACCEPT: &str = "text/plain, text/markdown;q=0.9, */*;q=0.1";

/// Require a github.com or raw.githubusercontent.com URL.
pub fn check_github_url(url: &str) -> Result<Url, LoadError> {
    let parsed =
        Url::parse(url).map_err(|_| LoadError::not_applicable(url, "URL is not a GitHub URL"))?;
    match parsed.host_str() {
        Some(GITHUB_HOST) | Some(RAW_GITHUB_HOST) => Ok(parsed),
        _ => Err(LoadError::not_applicable(url, "URL is not a GitHub URL")),
    }
}

/// Convert a GitHub blob URL to a raw.githubusercontent.com URL.
///
/// Supports `https://github.com/<owner>/<repo>/blob/<ref>/<path>`; raw URLs
/// are returned unchanged.
pub fn to_raw_github_url(url: &str) -> Result<String, LoadError> {
    let parsed = check_github_url(url)?;
    if parsed.host_str() == Some(RAW_GITHUB_HOST) {
        return Ok(url.to_string());
    }

    let parts: Vec<&str> = parsed.path().split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() < 5 || parts[2] != "blob" {
        return Err(LoadError::not_applicable(url, "URL is not a GitHub blob URL"));
    }

    let (owner, repo, git_ref) = (parts[0], parts[1], parts[3]);
    let path = parts[4..].join("/");
    Ok(format!(
        "https://{}/{}/{}/{}/{}",
        RAW_GITHUB_HOST, owner, repo, git_ref, path
    ))
}

/// Loads files and pages from GitHub.
#[derive(Debug, Clone, Default)]
pub struct GitHubLoader {
    opts: HttpOptions,
}

impl GitHubLoader {
    pub fn new(opts: HttpOptions) -> Self {
        Self { opts }
    }

    async fn load_raw(&self, url: &str, raw_url: &str) -> Result<String, LoadError> {
        let opts = self.opts.clone().header("Accept", RAW_ACCEPT);
        let page = fetch_page(&opts, raw_url).await?;

        if !page.content_type_contains(&["text", "json", "xml"]) {
            let got = page.content_type.clone().unwrap_or_default();
            return Err(LoadError::content(
                url,
                format!("not a text file (content-type {:?})", got),
                None,
            ));
        }
        Ok(page.text())
    }

    async fn load_page(&self, url: &str) -> Result<String, LoadError> {
        let page = fetch_page(&self.opts, url).await?;
        Ok(html_to_markdown(&extract_main_html(&page.text())))
    }
}

#[async_trait]
impl Loader for GitHubLoader {
    fn name(&self) -> &str {
        "github"
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        check_github_url(url)?;
        match to_raw_github_url(url) {
            Ok(raw_url) => self.load_raw(url, &raw_url).await,
            Err(_) => self.load_page(url).await,
        }
    }
}
