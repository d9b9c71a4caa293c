// ABOUTME: PDF loader: downloads a PDF and extracts its text with pdf-extract.
// ABOUTME: Blocking-only; chains run it through the Blocking adapter on tokio's blocking pool.

use tracing::debug;
use url::Url;

use crate::error::LoadError;
use crate::loader::BlockingLoader;
use crate::options::HttpOptions;
use crate::resource::{
    build_blocking_client, classify_request_error, guard_host_blocking, parse_http_url,
    MAX_CONTENT_LENGTH,
};

const PDF_CONTENT_TYPE: &str = "application/pdf";

fn has_pdf_extension(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

fn is_pdf_response(response: &reqwest::blocking::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains(PDF_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Extract text from PDF bytes.
pub fn extract_pdf_text(url: &str, bytes: &[u8]) -> Result<String, LoadError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| LoadError::content(url, format!("failed to extract PDF text: {}", e), None))
}

/// Loads PDF documents served over http(s).
///
/// Applies to URLs whose path ends in `.pdf`; for other URLs a HEAD request
/// decides by content type.
#[derive(Debug, Clone, Default)]
pub struct PdfLoader {
    opts: HttpOptions,
}

impl PdfLoader {
    pub fn new(opts: HttpOptions) -> Self {
        Self { opts }
    }

    fn check_url(&self, url: &str) -> Result<Url, LoadError> {
        let parsed = parse_http_url(url)?;
        self.guard(&parsed, url)?;
        Ok(parsed)
    }

    /// Redirects are only screened for literal IPs, so resolve where we landed.
    fn guard(&self, target: &Url, url: &str) -> Result<(), LoadError> {
        if self.opts.allow_private_networks {
            return Ok(());
        }
        guard_host_blocking(target, url)
    }
}

impl BlockingLoader for PdfLoader {
    fn name(&self) -> &str {
        "pdf"
    }

    fn load_blocking(&self, url: &str) -> Result<String, LoadError> {
        let parsed = self.check_url(url)?;
        let client = build_blocking_client(&self.opts)?;
        let to_err = |e: reqwest::Error| classify_request_error(url, self.opts.timeout, e);

        if !has_pdf_extension(&parsed) {
            let head = client.head(parsed.clone()).send().map_err(to_err)?;
            self.guard(head.url(), url)?;
            if !is_pdf_response(&head) {
                return Err(LoadError::not_applicable(url, "URL is not a PDF"));
            }
        }

        let mut request = client.get(parsed);
        for (key, value) in &self.opts.headers {
            request = request.header(key, value);
        }
        let response = request.send().map_err(to_err)?;
        self.guard(response.url(), url)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::content(
                url,
                format!("HTTP status {}", status.as_u16()),
                None,
            ));
        }
        if let Some(len) = response.content_length() {
            if len as usize > MAX_CONTENT_LENGTH {
                return Err(LoadError::content(url, "content too large", None));
            }
        }

        let bytes = response.bytes().map_err(to_err)?;
        debug!(url, bytes = bytes.len(), "downloaded pdf");
        extract_pdf_text(url, &bytes)
    }
}
